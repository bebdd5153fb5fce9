//! OCRモジュール - 外部Tesseractの呼び出しとPDF1件分のテキスト化

pub mod preprocess;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

#[cfg(windows)]
use crate::pdf::CommandExt;
use crate::pdf::{cleanup_temp_images, convert_pdf_to_images};

/// OCRエラー
#[derive(Debug, thiserror::Error)]
pub enum OcrError {
    #[error("Tesseractが見つかりません: {path}")]
    NotFound { path: String },
    #[error("Tesseractの実行に失敗: {stderr}")]
    Failed { stderr: String },
    #[error("OCR結果が空です: {path}")]
    Empty { path: String },
    #[error("Tesseractの起動に失敗: {0}")]
    Io(#[from] std::io::Error),
}

/// Tesseract OCRエンジン
#[derive(Debug, Clone)]
pub struct OcrEngine {
    /// tesseract実行ファイルのパス（空なら PATH 上の tesseract）
    pub tesseract_cmd: String,
    /// 認識言語
    pub lang: String,
    /// ページセグメンテーションモード
    pub psm: u32,
    /// OCRエンジンモード
    pub oem: u32,
}

impl Default for OcrEngine {
    fn default() -> Self {
        Self {
            tesseract_cmd: String::new(),
            lang: "eng".to_string(),
            psm: 6,
            oem: 3,
        }
    }
}

impl OcrEngine {
    /// 設定されたパスでエンジンを作成
    pub fn with_command(tesseract_cmd: &str) -> Self {
        Self {
            tesseract_cmd: tesseract_cmd.trim().to_string(),
            ..Default::default()
        }
    }

    fn command_path(&self) -> PathBuf {
        if self.tesseract_cmd.is_empty() {
            PathBuf::from(if cfg!(windows) { "tesseract.exe" } else { "tesseract" })
        } else {
            PathBuf::from(&self.tesseract_cmd)
        }
    }

    /// 画像1枚をOCRしてテキストを返す
    pub fn image_to_text(&self, image_path: impl AsRef<Path>) -> Result<String, OcrError> {
        let program = self.command_path();

        let mut cmd = Command::new(&program);
        cmd.arg(image_path.as_ref())
            .arg("stdout")
            .args(["-l", &self.lang])
            .args(["--psm", &self.psm.to_string()])
            .args(["--oem", &self.oem.to_string()]);

        #[cfg(windows)]
        cmd.creation_flags(0x08000000); // CREATE_NO_WINDOW

        let output = cmd.output().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                OcrError::NotFound {
                    path: program.to_string_lossy().into_owned(),
                }
            } else {
                OcrError::Io(e)
            }
        })?;

        if !output.status.success() {
            return Err(OcrError::Failed {
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        if text.trim().is_empty() {
            return Err(OcrError::Empty {
                path: image_path.as_ref().to_string_lossy().into_owned(),
            });
        }
        Ok(text)
    }
}

/// PDF1件をOCRして全ページのテキストを結合して返す
/// ページごとに on_page(テキスト, ページ番号, 総ページ数) を呼ぶ
pub fn ocr_pdf_to_text(
    pdf_path: &Path,
    engine: &OcrEngine,
    poppler_bin: Option<&str>,
    dpi: u32,
    mut on_page: impl FnMut(&str, usize, usize),
    mut log: impl FnMut(String),
) -> Result<String> {
    let file_name = pdf_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    log(format!("PDFを画像に変換中: {}", file_name));
    let pages = convert_pdf_to_images(pdf_path, dpi, poppler_bin)?;

    let total = pages.len();
    let mut parts: Vec<String> = Vec::with_capacity(total);

    for (idx, page) in pages.iter().enumerate() {
        let page_no = idx + 1;
        log(format!("前処理中 {}/{} ページ: {}", page_no, total, file_name));
        // 前処理に失敗したページは元画像のままOCRする
        let ocr_input = preprocess::preprocess_image(page).unwrap_or_else(|e| {
            tracing::warn!("前処理に失敗（元画像を使用）: {}", e);
            page.clone()
        });

        log(format!("OCR実行中 {}/{} ページ: {}", page_no, total, file_name));
        let text = engine
            .image_to_text(&ocr_input)
            .with_context(|| format!("{} の {} ページ目のOCRに失敗", file_name, page_no));
        match text {
            Ok(text) => {
                on_page(&text, page_no, total);
                parts.push(text);
            }
            Err(e) => {
                cleanup_temp_images(&pages);
                return Err(e);
            }
        }
    }

    cleanup_temp_images(&pages);
    Ok(parts.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_engine_settings() {
        let engine = OcrEngine::default();
        assert_eq!(engine.lang, "eng");
        assert_eq!(engine.psm, 6);
        assert_eq!(engine.oem, 3);
    }

    #[test]
    fn missing_binary_is_not_found() {
        let engine = OcrEngine::with_command("/nonexistent/tesseract-xyz");
        let tmp = tempfile::tempdir().unwrap();
        let img = tmp.path().join("page-1.png");
        std::fs::write(&img, b"").unwrap();

        match engine.image_to_text(&img) {
            Err(OcrError::NotFound { path }) => assert!(path.contains("tesseract-xyz")),
            other => panic!("unexpected: {:?}", other.map(|_| ())),
        }
    }

    #[cfg(unix)]
    #[test]
    fn blank_output_is_an_error() {
        use std::os::unix::fs::PermissionsExt;
        let tmp = tempfile::tempdir().unwrap();
        let fake = tmp.path().join("tesseract");
        std::fs::write(&fake, "#!/bin/sh\nexit 0\n").unwrap();
        std::fs::set_permissions(&fake, std::fs::Permissions::from_mode(0o755)).unwrap();

        let img = tmp.path().join("page-1.png");
        std::fs::write(&img, b"").unwrap();

        let engine = OcrEngine::with_command(&fake.to_string_lossy());
        match engine.image_to_text(&img) {
            Err(OcrError::Empty { path }) => assert!(path.ends_with("page-1.png")),
            other => panic!("unexpected: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn empty_command_falls_back_to_path_lookup() {
        let engine = OcrEngine::with_command("  ");
        let name = engine.command_path();
        assert!(name.to_string_lossy().starts_with("tesseract"));
    }
}
