//! 住所抽出モジュール
//!
//! "Telecommunication Tower at" と "of Dialog ..." の
//! マーカー間に現れる設置先住所を抽出する。

use regex::Regex;
use std::sync::OnceLock;

fn marker_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // マーカー間は改行・ドット・引用符の混入を許容
        Regex::new(
            r#"(?is)Telecommunication\s+Tower\s+at\s+["“”']?(.*?)["“”']?\s+of\s+Dialog[\s\w().]*"#,
        )
        .expect("address regex")
    })
}

fn dot_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s*\.\s*").expect("dot regex"))
}

fn gap_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s{2,}").expect("gap regex"))
}

/// マーカー間の住所を抽出して整形する
pub fn extract_address_between_markers(text: &str) -> Option<String> {
    if text.is_empty() {
        return None;
    }
    let cleaned = text.replace(['\u{200b}', '\r'], " ");

    let caps = marker_regex().captures(&cleaned)?;
    let raw = caps.get(1)?.as_str();

    // OCRで潰れたドット・空白の連なりを整える
    let addr = dot_regex().replace_all(raw, ". ");
    let addr = gap_regex().replace_all(&addr, " ");

    let addr = addr.trim_matches([' ', ',', '.', ';', ':', '-']).trim();
    if addr.is_empty() {
        None
    } else {
        Some(addr.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_address_between_markers() {
        let text = "erection of a Telecommunication Tower at No. 12, Main Street, Kandy of Dialog Axiata PLC.";
        let addr = extract_address_between_markers(text).unwrap();
        assert_eq!(addr, "No. 12, Main Street, Kandy");
    }

    #[test]
    fn tolerates_newlines_and_noise_dots() {
        let text = "Telecommunication Tower at\nNo .45 ,\nLake Road , Galle\nof Dialog Axiata PLC";
        let addr = extract_address_between_markers(text).unwrap();
        assert!(addr.starts_with("No. 45"), "got {:?}", addr);
        assert!(addr.contains("Galle"));
    }

    #[test]
    fn missing_markers_yield_none() {
        assert_eq!(extract_address_between_markers("no tower mentioned here"), None);
        assert_eq!(extract_address_between_markers(""), None);
    }
}
