//! 設定モジュール - パス設定の推測・検証・永続化

use crate::parser::FieldPatterns;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// デフォルトの解像度 (dpi)
pub const DEFAULT_DPI: u32 = 300;

/// アプリケーション設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// 入力フォルダ (PDF)
    pub input_dir: String,
    /// 出力ファイル (.csv / .xlsx)
    pub output_file: String,
    /// Tesseract実行ファイルのパス
    pub tesseract_path: String,
    /// Poppler binフォルダのパス
    pub poppler_path: String,
    /// ラスタライズ解像度
    #[serde(default = "default_dpi")]
    pub dpi: u32,
    /// フィールド別の正規表現リスト
    #[serde(default)]
    pub patterns: FieldPatterns,
}

fn default_dpi() -> u32 {
    DEFAULT_DPI
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            input_dir: String::new(),
            output_file: String::new(),
            tesseract_path: guess_tesseract_path(),
            poppler_path: guess_poppler_bin(),
            dpi: DEFAULT_DPI,
            patterns: FieldPatterns::default(),
        }
    }
}

impl AppConfig {
    /// 設定ファイルから読み込み（無ければデフォルト）
    pub fn load() -> Self {
        let Some(path) = config_file_path() else {
            return Self::default();
        };
        match std::fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    /// 設定ファイルへ保存
    pub fn save(&self) -> Result<()> {
        let path = config_file_path().context("設定ディレクトリが取得できません")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)
            .with_context(|| format!("設定ファイルの保存に失敗: {:?}", path))?;
        Ok(())
    }

    /// 入出力パスの検証。問題があればユーザー向けメッセージを返す
    pub fn validate(&self) -> Option<String> {
        if self.input_dir.trim().is_empty() {
            return Some("入力フォルダを選択してください。".to_string());
        }
        if !Path::new(self.input_dir.trim()).exists() {
            return Some("入力フォルダが存在しません。".to_string());
        }
        let out = self.output_file.trim();
        if out.is_empty() {
            return Some("出力ファイル (CSV または XLSX) を選択してください。".to_string());
        }
        let out_path = Path::new(out);
        if let Some(parent) = out_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                return Some("出力先のフォルダが存在しません。".to_string());
            }
        }
        let lower = out.to_lowercase();
        if !(lower.ends_with(".csv") || lower.ends_with(".xlsx")) {
            return Some("出力ファイルは .csv か .xlsx にしてください。".to_string());
        }
        None
    }
}

/// 設定ファイルのパス
fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("ocr_pdf_extractor").join("config.json"))
}

/// Tesseractのパスを推測
/// TESSERACT_CMD環境変数 > Windowsの標準インストール先。見つからなければ空
pub fn guess_tesseract_path() -> String {
    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Ok(env) = std::env::var("TESSERACT_CMD") {
        if !env.is_empty() {
            candidates.push(PathBuf::from(env));
        }
    }
    candidates.push(PathBuf::from(r"C:\Program Files\Tesseract-OCR\tesseract.exe"));
    candidates.push(PathBuf::from(r"C:\Program Files (x86)\Tesseract-OCR\tesseract.exe"));
    if let Some(home) = dirs::home_dir() {
        candidates.push(
            home.join("AppData")
                .join("Local")
                .join("Programs")
                .join("Tesseract-OCR")
                .join("tesseract.exe"),
        );
    }

    for c in candidates {
        if c.is_file() {
            return c.to_string_lossy().into_owned();
        }
    }
    String::new()
}

/// Popplerのbinフォルダを推測
/// POPPLER_BIN環境変数 > C:\Tools / C:\Program Files 配下のpoppler*フォルダ
pub fn guess_poppler_bin() -> String {
    if let Ok(env) = std::env::var("POPPLER_BIN") {
        if !env.is_empty() && Path::new(&env).is_dir() {
            return env;
        }
    }

    let base_candidates = [r"C:\Tools", r"C:\Program Files"];
    for base in base_candidates {
        let Ok(entries) = std::fs::read_dir(base) else {
            continue;
        };
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().to_lowercase();
            if !name.starts_with("poppler") {
                continue;
            }
            // conda系パッケージは Library\bin、公式zipは bin
            let lib_bin = entry.path().join("Library").join("bin");
            if lib_bin.is_dir() {
                return lib_bin.to_string_lossy().into_owned();
            }
            let bin = entry.path().join("bin");
            if bin.is_dir() {
                return bin.to_string_lossy().into_owned();
            }
        }
    }
    String::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config(dir: &Path) -> AppConfig {
        AppConfig {
            input_dir: dir.to_string_lossy().into_owned(),
            output_file: dir.join("out.csv").to_string_lossy().into_owned(),
            ..Default::default()
        }
    }

    #[test]
    fn validate_requires_input_dir() {
        let config = AppConfig {
            input_dir: String::new(),
            ..Default::default()
        };
        assert!(config.validate().is_some());
    }

    #[test]
    fn validate_rejects_missing_input_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = valid_config(tmp.path());
        config.input_dir = tmp.path().join("nope").to_string_lossy().into_owned();
        assert!(config.validate().is_some());
    }

    #[test]
    fn validate_rejects_bad_extension() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = valid_config(tmp.path());
        config.output_file = tmp.path().join("out.txt").to_string_lossy().into_owned();
        assert!(config.validate().is_some());
    }

    #[test]
    fn validate_accepts_csv_and_xlsx() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = valid_config(tmp.path());
        assert_eq!(config.validate(), None);
        config.output_file = tmp.path().join("Out.XLSX").to_string_lossy().into_owned();
        assert_eq!(config.validate(), None);
    }

    #[test]
    fn config_roundtrips_as_json() {
        let config = AppConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: AppConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.dpi, DEFAULT_DPI);
        assert_eq!(back.patterns.license_id, config.patterns.license_id);
    }
}
