//! 日付範囲抽出モジュール
//!
//! OCRノイズで `1 .12.2024 to 24.11.2025` のように崩れた
//! 有効期間（開始日 to 終了日）を拾って正規化する。

use chrono::NaiveDate;
use regex::Regex;
use std::sync::OnceLock;

/// 日付範囲の正規表現（ドット前後の空白・改行を許容）
fn range_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let date = r"\d{1,2}\s*\.\s*\d{1,2}\s*\.\s*\d{4}";
        Regex::new(&format!(
            r"(?is)({date}).{{0,40}}?\bto\b.{{0,40}}?({date})"
        ))
        .expect("range regex")
    })
}

/// テキストから日付範囲を抽出
/// 開始日・終了日を `d.m.yyyy` に正規化して返す。妥当な日付のみ採用
pub fn extract_date_range(text: &str) -> (Option<String>, Option<String>) {
    if text.is_empty() {
        return (None, None);
    }
    let cleaned = text.replace(['\u{200b}', '\r'], " ");

    for caps in range_regex().captures_iter(&cleaned) {
        let start = normalize_date(&caps[1]);
        let end = normalize_date(&caps[2]);
        if let (Some(start), Some(end)) = (start, end) {
            return (Some(start), Some(end));
        }
    }
    (None, None)
}

/// `1 . 12 . 2024` → `1.12.2024`。実在しない日付はNone
fn normalize_date(raw: &str) -> Option<String> {
    let mut s: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    s.retain(|c| c.is_ascii_digit() || c == '.');

    // 妥当性チェックのみchronoに任せる（表記は d.m.yyyy のまま）
    NaiveDate::parse_from_str(&s, "%d.%m.%Y").ok()?;
    Some(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_noisy_range() {
        let (start, end) = extract_date_range("valid from 1 .12.2024 to 24.11.2025 inclusive");
        assert_eq!(start.as_deref(), Some("1.12.2024"));
        assert_eq!(end.as_deref(), Some("24.11.2025"));
    }

    #[test]
    fn range_may_span_lines() {
        let (start, end) = extract_date_range("2.1.2023\nto\n1.1.2024");
        assert_eq!(start.as_deref(), Some("2.1.2023"));
        assert_eq!(end.as_deref(), Some("1.1.2024"));
    }

    #[test]
    fn invalid_calendar_dates_are_rejected() {
        let (start, end) = extract_date_range("31.02.2024 to 24.11.2025");
        assert_eq!(start, None);
        assert_eq!(end, None);
    }

    #[test]
    fn no_range_returns_none_pair() {
        assert_eq!(extract_date_range("issued 12.03.2024 only"), (None, None));
        assert_eq!(extract_date_range(""), (None, None));
    }
}
