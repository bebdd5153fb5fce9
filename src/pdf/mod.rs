//! PDF処理モジュール - フォルダ走査とPDFから画像への変換

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

/// フォルダ直下のPDFファイルを収集
/// 拡張子は大文字小文字を区別せず、ファイル名（小文字）でソートして返す
pub fn collect_pdfs_in_folder(folder: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let folder = folder.as_ref();
    let entries = std::fs::read_dir(folder)
        .with_context(|| format!("入力フォルダの読み込みに失敗: {:?}", folder))?;

    let mut pdfs: Vec<PathBuf> = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let is_pdf = path
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));
        if is_pdf {
            pdfs.push(path);
        }
    }

    // 同一ファイルの重複を除去（大文字小文字違いのパスを同一視）
    pdfs.sort_by_key(|p| p.to_string_lossy().to_lowercase());
    pdfs.dedup_by_key(|p| p.to_string_lossy().to_lowercase());

    pdfs.sort_by_key(|p| {
        p.file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    });
    Ok(pdfs)
}

/// PDFの全ページを画像に変換し、ページ順のPNGパスを返す
pub fn convert_pdf_to_images(
    pdf_path: impl AsRef<Path>,
    dpi: u32,
    poppler_bin: Option<&str>,
) -> Result<Vec<PathBuf>> {
    let pdf_path = pdf_path.as_ref();

    // 実行ごとの一時ディレクトリを作成
    let temp_dir = std::env::temp_dir().join(format!(
        "ocr_pdf_{}",
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default()
    ));
    std::fs::create_dir_all(&temp_dir)?;

    let output_base = temp_dir.join("page");
    let pdftoppm = pdftoppm_command(poppler_bin);

    let mut cmd = Command::new(&pdftoppm);
    cmd.args(["-png", "-r", &dpi.to_string()])
        .arg(pdf_path)
        .arg(&output_base);

    #[cfg(windows)]
    cmd.creation_flags(0x08000000); // CREATE_NO_WINDOW

    let output = cmd
        .output()
        .with_context(|| format!("pdftoppmの実行に失敗: {:?}", pdftoppm))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("PDF変換に失敗: {}", stderr.trim());
    }

    // 生成された page-*.png を収集（ゼロ埋め連番なので辞書順=ページ順）
    let mut pages: Vec<PathBuf> = std::fs::read_dir(&temp_dir)?
        .flatten()
        .map(|e| e.path())
        .filter(|p| {
            p.extension().is_some_and(|e| e.eq_ignore_ascii_case("png"))
                && p.file_stem()
                    .is_some_and(|s| s.to_string_lossy().starts_with("page-"))
        })
        .collect();
    pages.sort();

    if pages.is_empty() {
        anyhow::bail!("変換された画像ファイルが見つかりません");
    }

    Ok(pages)
}

/// pdftoppmの実行パスを決定（binフォルダ指定があればそこを使う）
fn pdftoppm_command(poppler_bin: Option<&str>) -> PathBuf {
    let exe = if cfg!(windows) { "pdftoppm.exe" } else { "pdftoppm" };
    match poppler_bin {
        Some(dir) if !dir.trim().is_empty() => Path::new(dir.trim()).join(exe),
        _ => PathBuf::from(exe),
    }
}

/// ページ画像の一時ディレクトリごと削除
pub fn cleanup_temp_images(pages: &[PathBuf]) {
    if let Some(parent) = pages.first().and_then(|p| p.parent()) {
        let _ = std::fs::remove_dir_all(parent);
    }
}

#[cfg(windows)]
pub(crate) trait CommandExt {
    fn creation_flags(&mut self, flags: u32) -> &mut Self;
}

#[cfg(windows)]
impl CommandExt for Command {
    fn creation_flags(&mut self, flags: u32) -> &mut Self {
        use std::os::windows::process::CommandExt as WinCommandExt;
        WinCommandExt::creation_flags(self, flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_pdfs_case_insensitive_and_sorted() {
        let tmp = tempfile::tempdir().unwrap();
        for name in ["b.PDF", "a.pdf", "notes.txt", "c.pdf"] {
            std::fs::write(tmp.path().join(name), b"%PDF-1.4").unwrap();
        }
        std::fs::create_dir(tmp.path().join("sub.pdf")).unwrap();

        let pdfs = collect_pdfs_in_folder(tmp.path()).unwrap();
        let names: Vec<String> = pdfs
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.pdf", "b.PDF", "c.pdf"]);
    }

    #[test]
    fn missing_folder_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("nope");
        assert!(collect_pdfs_in_folder(&missing).is_err());
    }

    #[test]
    fn pdftoppm_path_uses_bin_folder_when_given() {
        let cmd = pdftoppm_command(Some("/opt/poppler/bin"));
        assert!(cmd.starts_with("/opt/poppler/bin"));
        let bare = pdftoppm_command(None);
        assert_eq!(bare.parent(), Some(Path::new("")));
    }
}
