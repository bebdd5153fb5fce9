//! OCR PDF抽出ツール - スキャンPDFからのフィールド一括抽出
//!
//! # 機能
//! - フォルダ内のPDFをPoppler (pdftoppm) で画像化し、Tesseract OCRでテキスト化
//! - 正規表現リスト（ライセンスID・日付・参照ID）によるフィールド抽出
//! - 住所・日付範囲・ライセンス番号一括抽出の追加フィールド
//! - 処理中のCSV逐次追記と、最終結果のCSV/XLSXエクスポート

pub mod config;
pub mod export;
pub mod gui;
pub mod ocr;
pub mod parser;
pub mod pdf;

pub use parser::ExtractionResult;
