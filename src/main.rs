//! OCR PDF抽出ツール - メインエントリポイント

use anyhow::Result;

fn main() -> Result<()> {
    // ロギング初期化
    tracing_subscriber::fmt::init();

    // 環境変数の読み込み (TESSERACT_CMD / POPPLER_BIN)
    dotenvy::dotenv().ok();

    // GUIアプリケーション起動
    ocr_pdf_extractor::gui::run()
}
