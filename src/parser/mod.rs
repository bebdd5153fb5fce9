//! テキスト解析モジュール - OCRテキストからのフィールド抽出

pub mod address;
pub mod date;
pub mod dynamic;
pub mod license;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

/// フィールド別の正規表現リスト
/// 各フィールドは上から順に試し、最初にマッチしたパターンを採用する
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldPatterns {
    /// ライセンスID
    pub license_id: Vec<String>,
    /// 日付
    pub date: Vec<String>,
    /// 参照ID
    pub reference_id: Vec<String>,
}

impl Default for FieldPatterns {
    fn default() -> Self {
        Self {
            license_id: vec![
                r"\bLIC[-_\s]?\d{3,}\b".to_string(),
                r"\bLicense\s*ID[:#-]*\s*([A-Z0-9]{6,20})\b".to_string(),
                r"\b[A-Z0-9]{6,20}\b".to_string(),
            ],
            date: vec![
                r"\b\d{2}[/-]\d{2}[/-]\d{4}\b".to_string(),
                r"\b\d{4}[/-]\d{2}[/-]\d{2}\b".to_string(),
            ],
            reference_id: vec![
                r"\bREF[-_\s]*([A-Z0-9]{4,10})\b".to_string(),
                r"\b(?:Reference|Ref)[\s:#-]*([A-Z0-9-]{4,10})\b".to_string(),
                r"\b[A-Z0-9]{4,10}\b".to_string(),
            ],
        }
    }
}

/// パターン文字列をコンパイル（大文字小文字は区別しない）
/// 不正なパターンは読み飛ばす
pub fn compile_patterns(patterns: &[String]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|p| {
            match RegexBuilder::new(p).case_insensitive(true).build() {
                Ok(re) => Some(re),
                Err(e) => {
                    tracing::warn!("不正なパターンを無視: {} ({})", p, e);
                    None
                }
            }
        })
        .collect()
}

/// 最初にマッチしたパターンの値を返す
/// キャプチャグループ1があればその値、なければマッチ全体
pub fn extract_first_match(text: &str, regexes: &[Regex]) -> Option<String> {
    for re in regexes {
        if let Some(caps) = re.captures(text) {
            if let Some(group) = caps.get(1) {
                return Some(group.as_str().to_string());
            }
            return Some(caps[0].to_string());
        }
    }
    None
}

/// 3フィールド（ライセンスID・日付・参照ID）を抽出
pub fn extract_fields(
    text: &str,
    patterns: &FieldPatterns,
) -> (Option<String>, Option<String>, Option<String>) {
    let license_id = extract_first_match(text, &compile_patterns(&patterns.license_id));
    let date = extract_first_match(text, &compile_patterns(&patterns.date));
    let reference_id = extract_first_match(text, &compile_patterns(&patterns.reference_id));
    (license_id, date, reference_id)
}

/// PDF1件分の抽出結果（出力の1行）
#[derive(Debug, Clone, Default)]
pub struct ExtractionResult {
    /// 元のファイル名
    pub file_name: String,
    /// ライセンスID
    pub license_id: Option<String>,
    /// 日付
    pub date: Option<String>,
    /// 参照ID
    pub reference_id: Option<String>,
    /// 住所（マーカー間抽出）
    pub address: Option<String>,
    /// 有効期間の開始日
    pub start_date: Option<String>,
    /// 有効期間の終了日
    pub end_date: Option<String>,
    /// 備考（未マッチ・エラー）
    pub notes: Option<String>,
    /// OCRの元テキスト
    pub raw_text: String,
}

impl ExtractionResult {
    /// OCRテキストから抽出結果を組み立てる
    pub fn from_text(file_name: &str, text: &str, patterns: &FieldPatterns) -> Self {
        let (license_id, date, reference_id) = extract_fields(text, patterns);
        let address = address::extract_address_between_markers(text);
        let (start_date, end_date) = date::extract_date_range(text);

        let notes = if license_id.is_none() && date.is_none() && reference_id.is_none() {
            Some("No patterns matched".to_string())
        } else {
            None
        };

        Self {
            file_name: file_name.to_string(),
            license_id,
            date,
            reference_id,
            address,
            start_date,
            end_date,
            notes,
            raw_text: text.to_string(),
        }
    }

    /// 処理失敗を表す結果
    pub fn failed(file_name: &str, error: &str) -> Self {
        Self {
            file_name: file_name.to_string(),
            notes: Some(format!("Error: {}", error)),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_pattern_wins() {
        let regexes = compile_patterns(&[
            r"\bAAA\d+\b".to_string(),
            r"\bBBB\d+\b".to_string(),
        ]);
        let got = extract_first_match("BBB222 AAA111", &regexes);
        assert_eq!(got.as_deref(), Some("AAA111"));
    }

    #[test]
    fn capture_group_preferred_over_whole_match() {
        let regexes = compile_patterns(&[r"License\s*ID:\s*([A-Z0-9]+)".to_string()]);
        let got = extract_first_match("License ID: ABC123", &regexes);
        assert_eq!(got.as_deref(), Some("ABC123"));
    }

    #[test]
    fn whole_match_when_no_group() {
        let regexes = compile_patterns(&[r"\bLIC-\d{3,}\b".to_string()]);
        let got = extract_first_match("see LIC-12345 above", &regexes);
        assert_eq!(got.as_deref(), Some("LIC-12345"));
    }

    #[test]
    fn no_match_is_none() {
        let regexes = compile_patterns(&[r"\d{10}".to_string()]);
        assert_eq!(extract_first_match("nothing here", &regexes), None);
    }

    #[test]
    fn invalid_pattern_is_skipped() {
        let regexes = compile_patterns(&[
            r"([unclosed".to_string(),
            r"\bREF-(\d+)\b".to_string(),
        ]);
        assert_eq!(regexes.len(), 1);
        let got = extract_first_match("REF-77", &regexes);
        assert_eq!(got.as_deref(), Some("77"));
    }

    #[test]
    fn matching_is_case_insensitive() {
        let regexes = compile_patterns(&[r"\blic[-_\s]?\d{3,}\b".to_string()]);
        let got = extract_first_match("LIC 4711", &regexes);
        assert_eq!(got.as_deref(), Some("LIC 4711"));
    }

    #[test]
    fn default_patterns_extract_all_three_fields() {
        let text = "License ID: ABC12345\nIssued 12/03/2024\nRef: XY-99A1";
        let (license, date, reference) = extract_fields(text, &FieldPatterns::default());
        assert_eq!(license.as_deref(), Some("ABC12345"));
        assert_eq!(date.as_deref(), Some("12/03/2024"));
        assert!(reference.is_some());
    }

    #[test]
    fn result_notes_when_nothing_matched() {
        let patterns = FieldPatterns {
            license_id: vec![r"ZZZ\d{9}".to_string()],
            date: vec![r"ZZZ\d{9}".to_string()],
            reference_id: vec![r"ZZZ\d{9}".to_string()],
        };
        let result = ExtractionResult::from_text("a.pdf", "plain text", &patterns);
        assert_eq!(result.notes.as_deref(), Some("No patterns matched"));
        assert_eq!(result.raw_text, "plain text");
    }
}
