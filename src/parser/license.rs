//! ライセンス番号抽出モジュール
//!
//! 2種類の書式に対応する:
//! - タイプA: `CL 123 (RO05)` のような「英字+数字+括弧コード」
//! - タイプB: `123/456 R7` のような「分数+リビジョン」
//!
//! タイプAが1件でも見つかればタイプAのみを返す。

use regex::Regex;
use std::sync::OnceLock;

fn type_a_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b[A-Z]{1,5}[ \-/]*\d{1,10}[ \t]*\(\s*[A-Z0-9/\-\s]{1,24}\s*\)")
            .expect("type A regex")
    })
}

fn type_b_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b\d{1,6}/\d{1,6}\s*R\d+\b").expect("type B regex"))
}

fn space_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("space regex"))
}

fn paren_body_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\(([^)]{1,20})\)").expect("paren regex"))
}

fn paren_code_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\(([^)]+)\)").expect("paren code regex"))
}

fn digits_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+").expect("digits regex"))
}

/// ライセンス抽出用にテキストを正規化
/// 全角括弧・角括弧をASCII丸括弧へ、大文字化、空白の圧縮、
/// 括弧内の数字に挟まれた O → 0 の補正
pub fn normalize_text_for_license(text: &str) -> String {
    let mut t = text
        .replace(['（', '['], "(")
        .replace(['）', ']'], ")")
        .to_uppercase()
        .replace('\u{200b}', "");

    t = space_regex().replace_all(&t, " ").into_owned();

    paren_body_regex()
        .replace_all(&t, |caps: &regex::Captures<'_>| {
            format!("({})", fix_o_between_digits(&caps[1]))
        })
        .into_owned()
}

/// 数字に挟まれた O を 0 に直す（OCRの典型誤認識）
fn fix_o_between_digits(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len());
    for (i, &c) in chars.iter().enumerate() {
        let prev_digit = i > 0 && chars[i - 1].is_ascii_digit();
        let next_digit = chars.get(i + 1).is_some_and(|n| n.is_ascii_digit());
        if c == 'O' && prev_digit && next_digit {
            out.push('0');
        } else {
            out.push(c);
        }
    }
    out
}

/// テキスト中のライセンス番号をすべて抽出（重複除去・出現順）
pub fn extract_all_license_numbers(text: &str) -> Vec<String> {
    let normalized = normalize_text_for_license(text);

    let collect = |re: &Regex| -> Vec<String> {
        let mut seen: Vec<String> = Vec::new();
        for m in re.find_iter(&normalized) {
            let value = m.as_str().trim().to_string();
            if !seen.iter().any(|s| s.eq_ignore_ascii_case(&value)) {
                seen.push(value);
            }
        }
        seen
    };

    let type_a = collect(type_a_regex());
    if !type_a.is_empty() {
        return type_a;
    }
    collect(type_b_regex())
}

/// ライセンス文字列からサマリー列の値を作る
/// 括弧内コードの数字を取り出して "N times"。数字が無ければ
/// ライセンスと住所の組み合わせにフォールバック
pub fn license_summary(licenses: &str, address: &str) -> String {
    let licenses = licenses.trim();
    let address = address.trim();

    let code = paren_code_regex()
        .captures(licenses)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(licenses);

    if let Some(m) = digits_regex().find(code) {
        if let Ok(number) = m.as_str().parse::<u64>() {
            return format!("{} times", number);
        }
    }

    if !licenses.is_empty() && !address.is_empty() {
        format!("{} | {}", licenses, address)
    } else if !licenses.is_empty() {
        licenses.to_string()
    } else {
        address.to_string()
    }
}
