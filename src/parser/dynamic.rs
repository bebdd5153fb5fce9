//! 動的パターン生成モジュール
//!
//! ユーザーが示したサンプル文字列から、似た値を拾える
//! 正規表現の候補を生成する（GUIのパターン提案に使用）。

use regex::{Regex, RegexBuilder};
use std::collections::HashMap;

/// サンプルと周辺テキストからパターン候補を生成
/// 先頭は常にサンプルそのもののリテラルパターン
pub fn generate_smart_patterns(sample: &str, context: Option<&str>) -> Vec<String> {
    if sample.is_empty() {
        return Vec::new();
    }

    let mut patterns: Vec<String> = vec![regex::escape(sample)];

    // サンプルの形から汎化パターンを足す
    if starts_with_match(sample, r"\d{1,2}[/-]\d{1,2}[/-]\d{4}") {
        patterns.push(r"\d{1,2}[/-]\d{1,2}[/-]\d{4}".to_string());
        patterns.push(r"\d{4}[/-]\d{1,2}[/-]\d{1,2}".to_string());
        patterns.push(r"\d{1,2}\s+\d{1,2}\s+\d{4}".to_string());
    } else if starts_with_match(sample, r"[A-Z]{2,}\d+") {
        patterns.push(r"[A-Z]{2,}\d+".to_string());
        patterns.push(r"[A-Z]{2,}[-_\s]?\d+".to_string());
        patterns.push(r"[A-Z]*\d+".to_string());
    } else if starts_with_match(sample, r"\d+") {
        patterns.push(r"\d+".to_string());
        patterns.push(r"[A-Z]*\d+".to_string());
        patterns.push(r"\d+[A-Z]*".to_string());
    }

    // 周辺語をアンカーにしたパターン
    if let Some(context) = context {
        for word in context.split_whitespace().take(3) {
            if word.chars().count() > 2 {
                patterns.push(format!(
                    r"\b{}.*?{}",
                    regex::escape(word),
                    regex::escape(sample)
                ));
            }
        }
    }

    dedup_in_order(patterns)
}

/// サンプルの文字構成からトークン形状の正規表現を推測
pub fn infer_token_shape(sample: &str) -> String {
    let s = sample.trim();
    if s.is_empty() {
        return r"\S{2,20}".to_string();
    }
    let has_alpha = s.chars().any(|c| c.is_alphabetic());
    let has_digit = s.chars().any(|c| c.is_ascii_digit());
    let len = s.chars().count();
    let min_len = 2.max(4.min(len));
    let max_len = 40.min((len + 6).max(8));

    let class = if has_alpha && has_digit {
        r"[A-Za-z0-9/()\-\s]"
    } else if has_digit {
        r"[0-9/()\-\s]"
    } else {
        r"[A-Za-z/()\-\s]"
    };
    format!("{}{{{},{}}}", class, min_len, max_len)
}

/// 前後の語をアンカーにしたウィンドウパターンを生成
/// 値の部分はトークン形状でキャプチャする
pub fn generate_window_patterns(
    sample: &str,
    before_words: &[String],
    after_words: &[String],
    max_words_window: usize,
) -> Vec<String> {
    if sample.is_empty() {
        return Vec::new();
    }
    let shape = infer_token_shape(sample);
    let escape_words = |words: &[String]| -> Vec<String> {
        words
            .iter()
            .filter(|w| w.chars().count() > 1)
            .take(max_words_window)
            .map(|w| regex::escape(w))
            .collect()
    };

    let gap = format!(r"(?:\W+\w+){{0,{}}}", max_words_window);
    let mut patterns: Vec<String> = Vec::new();

    for w in escape_words(before_words) {
        patterns.push(format!(r"\b{}\b{}\W+({})", w, gap, shape));
    }
    for w in escape_words(after_words) {
        patterns.push(format!(r"({})\W+{}\b{}\b", shape, gap, w));
    }

    dedup_in_order(patterns)
}

/// フィールド名→パターンリストの定義で一括抽出
/// 値は「グループ1優先、なければマッチ全体」、未マッチは空文字
pub fn extract_dynamic_fields(
    text: &str,
    field_to_patterns: &[(String, Vec<String>)],
) -> HashMap<String, String> {
    let mut out = HashMap::new();
    for (field, patterns) in field_to_patterns {
        let mut value = String::new();
        for raw in patterns {
            let Ok(re) = RegexBuilder::new(raw).case_insensitive(true).build() else {
                continue;
            };
            if let Some(caps) = re.captures(text) {
                let m = caps.get(1).or_else(|| caps.get(0));
                if let Some(m) = m {
                    value = m.as_str().to_string();
                    break;
                }
            }
        }
        out.insert(field.clone(), value);
    }
    out
}

fn starts_with_match(sample: &str, pattern: &str) -> bool {
    Regex::new(&format!("^(?:{})", pattern))
        .map(|re| re.is_match(sample))
        .unwrap_or(false)
}

fn dedup_in_order(patterns: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    patterns
        .into_iter()
        .filter(|p| seen.insert(p.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_pattern_comes_first() {
        let patterns = generate_smart_patterns("LIC-123", None);
        assert_eq!(patterns[0], regex::escape("LIC-123"));
    }

    #[test]
    fn date_like_sample_generalizes_to_date_patterns() {
        let patterns = generate_smart_patterns("12/03/2024", None);
        assert!(patterns.contains(&r"\d{1,2}[/-]\d{1,2}[/-]\d{4}".to_string()));
    }

    #[test]
    fn context_words_become_anchors() {
        let patterns = generate_smart_patterns("A123", Some("License No A123"));
        assert!(patterns.iter().any(|p| p.contains("License")));
        // 2文字以下の語はアンカーにしない
        assert!(!patterns.iter().any(|p| p.starts_with(r"\bNo")));
    }

    #[test]
    fn token_shape_reflects_character_classes() {
        assert_eq!(infer_token_shape("1234"), r"[0-9/()\-\s]{4,10}");
        assert!(infer_token_shape("AB12").starts_with("[A-Za-z0-9"));
        assert_eq!(infer_token_shape(""), r"\S{2,20}");
    }

    #[test]
    fn window_patterns_anchor_on_surrounding_words() {
        let patterns = generate_window_patterns(
            "A123",
            &["Licence".to_string(), "No".to_string()],
            &["issued".to_string()],
            3,
        );
        // 前2語 + 後1語の3パターン
        assert_eq!(patterns.len(), 3);
        assert!(patterns[0].starts_with(r"\bLicence\b"));
        assert!(patterns[1].starts_with(r"\bNo\b"));
        assert!(patterns[2].ends_with(r"\bissued\b"));
    }

    #[test]
    fn dynamic_extraction_uses_group_or_whole_match() {
        let fields = vec![
            ("id".to_string(), vec![r"ID:\s*(\w+)".to_string()]),
            ("code".to_string(), vec![r"C-\d+".to_string()]),
            ("missing".to_string(), vec![r"XYZ\d{5}".to_string()]),
        ];
        let out = extract_dynamic_fields("ID: abc C-42", &fields);
        assert_eq!(out["id"], "abc");
        assert_eq!(out["code"], "C-42");
        assert_eq!(out["missing"], "");
    }
}
