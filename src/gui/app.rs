//! メインアプリケーションウィンドウ

use crate::config::AppConfig;
use crate::export::{
    append_result_csv, export_licenses_csv, export_results, incremental_csv_path,
};
use crate::ocr::{OcrEngine, ocr_pdf_to_text};
use crate::parser::{ExtractionResult, dynamic};
use crate::pdf::collect_pdfs_in_folder;
use anyhow::Result;
use eframe::egui;
use egui::{CentralPanel, RichText, Vec2};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, Sender, channel};
use tokio::runtime::Runtime;

use super::theme::{Colors, dark_theme};

/// ライブビューに保持するOCRテキストの上限（文字数）
const LIVE_TEXT_LIMIT: usize = 8000;

/// ワーカーからのイベント
enum WorkerEvent {
    /// バッチ開始（総ファイル数）
    Started { total: usize },
    /// ログ1行
    Log(String),
    /// ページのOCRテキスト
    Page { file_name: String, text: String },
    /// 1ファイル分の結果
    FileDone(Box<ExtractionResult>),
    /// バッチ終了
    Finished { message: String, success: bool },
}

/// パターン提案の対象フィールド
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SuggestTarget {
    License,
    Date,
    Reference,
}

impl SuggestTarget {
    fn label(self) -> &'static str {
        match self {
            Self::License => "ライセンスID",
            Self::Date => "日付",
            Self::Reference => "参照ID",
        }
    }
}

/// アプリケーション状態
pub struct ExtractorApp {
    /// 設定（パス・パターン）
    config: AppConfig,
    /// Tokioランタイム
    runtime: Runtime,
    /// 処理結果
    results: Vec<ExtractionResult>,
    /// 処理中かどうか
    is_processing: bool,
    /// バッチの総ファイル数
    total_files: usize,
    /// 現在の処理ファイル
    current_file: Option<String>,
    /// ライブOCRテキスト
    live_text: String,
    /// ログ
    log_lines: Vec<String>,
    /// ステータスメッセージ
    status: String,
    /// パターン編集エリア（1行1パターン）
    license_patterns_text: String,
    date_patterns_text: String,
    reference_patterns_text: String,
    /// パターン提案の入力
    sample_text: String,
    sample_context: String,
    suggest_target: SuggestTarget,
    /// イベントチャンネル
    event_rx: Receiver<WorkerEvent>,
    event_tx: Sender<WorkerEvent>,
}

impl Default for ExtractorApp {
    fn default() -> Self {
        let (event_tx, event_rx) = channel();
        let config = AppConfig::load();

        let join = |v: &[String]| v.join("\n");
        let license_patterns_text = join(&config.patterns.license_id);
        let date_patterns_text = join(&config.patterns.date);
        let reference_patterns_text = join(&config.patterns.reference_id);

        Self {
            config,
            runtime: Runtime::new().expect("Tokioランタイムの作成に失敗"),
            results: Vec::new(),
            is_processing: false,
            total_files: 0,
            current_file: None,
            live_text: String::new(),
            log_lines: Vec::new(),
            status: "入出力を設定して実行してください".to_string(),
            license_patterns_text,
            date_patterns_text,
            reference_patterns_text,
            sample_text: String::new(),
            sample_context: String::new(),
            suggest_target: SuggestTarget::License,
            event_rx,
            event_tx,
        }
    }
}

impl ExtractorApp {
    /// テキストエリアの内容を設定のパターンリストへ反映
    fn sync_patterns(&mut self) {
        let split = |text: &str| -> Vec<String> {
            text.lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(String::from)
                .collect()
        };
        self.config.patterns.license_id = split(&self.license_patterns_text);
        self.config.patterns.date = split(&self.date_patterns_text);
        self.config.patterns.reference_id = split(&self.reference_patterns_text);
    }

    /// バッチ処理を開始（limit=Some(1)で先頭1件のみ）
    fn start_batch(&mut self, limit: Option<usize>) {
        self.sync_patterns();

        if let Some(message) = self.config.validate() {
            self.status = message;
            return;
        }

        self.results.clear();
        self.log_lines.clear();
        self.live_text.clear();
        self.total_files = 0;
        self.current_file = None;
        self.is_processing = true;
        self.status = "処理を開始しました...".to_string();

        let config = self.config.clone();
        let event_tx = self.event_tx.clone();

        // バックグラウンドで処理
        self.runtime.spawn(async move {
            run_batch(config, limit, event_tx);
        });
    }

    /// ワーカーからのイベントを受信
    fn receive_events(&mut self) {
        while let Ok(event) = self.event_rx.try_recv() {
            match event {
                WorkerEvent::Started { total } => {
                    self.total_files = total;
                    self.status = format!("{} 個のファイルを処理中...", total);
                }
                WorkerEvent::Log(line) => {
                    self.log_lines.push(line);
                }
                WorkerEvent::Page { file_name, text } => {
                    self.current_file = Some(file_name);
                    if !self.live_text.is_empty() {
                        self.live_text.push_str("\n\n");
                    }
                    self.live_text.push_str(&text);
                    // 末尾のみ保持
                    let count = self.live_text.chars().count();
                    if count > LIVE_TEXT_LIMIT {
                        self.live_text = self
                            .live_text
                            .chars()
                            .skip(count - LIVE_TEXT_LIMIT)
                            .collect();
                    }
                }
                WorkerEvent::FileDone(result) => {
                    self.results.push(*result);
                    let done = self.results.len();
                    let failed = self
                        .results
                        .iter()
                        .filter(|r| r.notes.as_deref().is_some_and(|n| n.starts_with("Error:")))
                        .count();
                    self.status = format!(
                        "処理中 {}/{} （失敗 {} 件）",
                        done,
                        self.total_files.max(done),
                        failed
                    );
                }
                WorkerEvent::Finished { message, success } => {
                    self.is_processing = false;
                    self.current_file = None;
                    self.status = message;
                    if success {
                        if let Err(e) = self.config.save() {
                            tracing::warn!("設定の保存に失敗: {}", e);
                        }
                    }
                }
            }
        }
    }

    /// サンプルからパターン候補を生成して対象フィールドへ追記
    fn suggest_patterns(&mut self) {
        let sample = self.sample_text.trim();
        if sample.is_empty() {
            self.status = "サンプル文字列を入力してください。".to_string();
            return;
        }
        let context = self.sample_context.trim();
        let context_opt = (!context.is_empty()).then_some(context);

        let mut patterns = dynamic::generate_smart_patterns(sample, context_opt);
        patterns.truncate(6);

        // 周辺語の前後3語をアンカーにしたウィンドウパターンも足す
        if let Some(context) = context_opt {
            let words: Vec<String> = context
                .split(|c: char| !c.is_alphanumeric())
                .filter(|w| !w.is_empty())
                .map(String::from)
                .collect();
            let before: Vec<String> = words.iter().take(3).cloned().collect();
            let after: Vec<String> = words.iter().rev().take(3).rev().cloned().collect();
            patterns.extend(dynamic::generate_window_patterns(sample, &before, &after, 3));
        }

        let target = match self.suggest_target {
            SuggestTarget::License => &mut self.license_patterns_text,
            SuggestTarget::Date => &mut self.date_patterns_text,
            SuggestTarget::Reference => &mut self.reference_patterns_text,
        };
        let mut added = 0;
        for pattern in patterns {
            if !target.lines().any(|l| l.trim() == pattern) {
                if !target.is_empty() && !target.ends_with('\n') {
                    target.push('\n');
                }
                target.push_str(&pattern);
                added += 1;
            }
        }
        self.status = format!(
            "{} に {} 件のパターンを追加しました",
            self.suggest_target.label(),
            added
        );
    }

    /// ライセンス一括抽出のCSVを書き出す
    fn export_licenses(&mut self) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("CSV", &["csv"])
            .set_file_name("licenses.csv")
            .save_file()
        else {
            return;
        };
        match export_licenses_csv(&self.results, &path) {
            Ok(()) => self.status = format!("ライセンスCSVを保存しました: {:?}", path),
            Err(e) => self.status = format!("ライセンスCSVの保存に失敗: {}", e),
        }
    }

    fn config_form(&mut self, ui: &mut egui::Ui) {
        egui::Grid::new("config_grid")
            .num_columns(3)
            .spacing([8.0, 6.0])
            .show(ui, |ui| {
                ui.label("入力フォルダ (PDF):");
                ui.add(
                    egui::TextEdit::singleline(&mut self.config.input_dir)
                        .desired_width(f32::INFINITY),
                );
                if ui.button("参照...").clicked() {
                    if let Some(dir) = rfd::FileDialog::new().pick_folder() {
                        self.config.input_dir = dir.to_string_lossy().into_owned();
                    }
                }
                ui.end_row();

                ui.label("出力ファイル (CSV/XLSX):");
                ui.add(
                    egui::TextEdit::singleline(&mut self.config.output_file)
                        .desired_width(f32::INFINITY),
                );
                if ui.button("保存先...").clicked() {
                    if let Some(file) = rfd::FileDialog::new()
                        .add_filter("CSV", &["csv"])
                        .add_filter("Excel", &["xlsx"])
                        .set_file_name("results.csv")
                        .save_file()
                    {
                        self.config.output_file = file.to_string_lossy().into_owned();
                    }
                }
                ui.end_row();

                ui.label("Tesseractパス:");
                ui.add(
                    egui::TextEdit::singleline(&mut self.config.tesseract_path)
                        .desired_width(f32::INFINITY),
                );
                if ui.button("参照...").clicked() {
                    if let Some(file) = rfd::FileDialog::new().pick_file() {
                        self.config.tesseract_path = file.to_string_lossy().into_owned();
                    }
                }
                ui.end_row();

                ui.label("Poppler binフォルダ:");
                ui.add(
                    egui::TextEdit::singleline(&mut self.config.poppler_path)
                        .desired_width(f32::INFINITY),
                );
                if ui.button("参照...").clicked() {
                    if let Some(dir) = rfd::FileDialog::new().pick_folder() {
                        self.config.poppler_path = dir.to_string_lossy().into_owned();
                    }
                }
                ui.end_row();

                ui.label("解像度 (dpi):");
                ui.add(egui::DragValue::new(&mut self.config.dpi).range(72..=600));
                ui.label("");
                ui.end_row();
            });
    }

    fn pattern_editors(&mut self, ui: &mut egui::Ui) {
        egui::CollapsingHeader::new("抽出パターン（1行に1つの正規表現）")
            .default_open(false)
            .show(ui, |ui| {
                let editor = |ui: &mut egui::Ui, label: &str, text: &mut String| {
                    ui.label(RichText::new(label).color(Colors::TEXT_SECONDARY));
                    ui.add(
                        egui::TextEdit::multiline(text)
                            .desired_rows(3)
                            .desired_width(f32::INFINITY)
                            .font(egui::TextStyle::Monospace),
                    );
                };
                editor(ui, "ライセンスID:", &mut self.license_patterns_text);
                editor(ui, "日付:", &mut self.date_patterns_text);
                editor(ui, "参照ID:", &mut self.reference_patterns_text);

                ui.separator();
                ui.label(RichText::new("パターン提案").color(Colors::TEXT_SECONDARY));
                ui.horizontal(|ui| {
                    ui.label("サンプル値:");
                    ui.add(
                        egui::TextEdit::singleline(&mut self.sample_text).desired_width(160.0),
                    );
                    ui.label("周辺テキスト:");
                    ui.add(
                        egui::TextEdit::singleline(&mut self.sample_context)
                            .desired_width(220.0),
                    );
                    egui::ComboBox::from_id_salt("suggest_target")
                        .selected_text(self.suggest_target.label())
                        .show_ui(ui, |ui| {
                            for target in [
                                SuggestTarget::License,
                                SuggestTarget::Date,
                                SuggestTarget::Reference,
                            ] {
                                ui.selectable_value(
                                    &mut self.suggest_target,
                                    target,
                                    target.label(),
                                );
                            }
                        });
                    if ui.button("パターン生成").clicked() {
                        self.suggest_patterns();
                    }
                });
            });
    }

    fn results_list(&self, ui: &mut egui::Ui) {
        for result in &self.results {
            ui.add_space(4.0);
            egui::Frame::new()
                .fill(Colors::BG_CARD)
                .corner_radius(8.0)
                .inner_margin(10.0)
                .show(ui, |ui| {
                    ui.horizontal(|ui| {
                        let is_error = result
                            .notes
                            .as_deref()
                            .is_some_and(|n| n.starts_with("Error:"));
                        let (icon, color) = if is_error {
                            ("✗", Colors::ERROR)
                        } else {
                            ("✓", Colors::SUCCESS)
                        };
                        ui.label(RichText::new(icon).size(16.0).color(color));

                        ui.vertical(|ui| {
                            ui.label(
                                RichText::new(&result.file_name)
                                    .size(13.0)
                                    .color(Colors::TEXT_PRIMARY),
                            );
                            if is_error {
                                ui.label(
                                    RichText::new(result.notes.as_deref().unwrap_or(""))
                                        .size(12.0)
                                        .color(Colors::ERROR),
                                );
                            } else {
                                let cell = |v: &Option<String>| {
                                    v.clone().unwrap_or_else(|| "-".to_string())
                                };
                                ui.label(
                                    RichText::new(format!(
                                        "ライセンス: {}  日付: {}  参照: {}",
                                        cell(&result.license_id),
                                        cell(&result.date),
                                        cell(&result.reference_id),
                                    ))
                                    .size(12.0)
                                    .color(Colors::TEXT_SECONDARY),
                                );
                                if let Some(ref notes) = result.notes {
                                    ui.label(
                                        RichText::new(notes)
                                            .size(12.0)
                                            .color(Colors::TEXT_SECONDARY),
                                    );
                                }
                            }
                        });
                    });
                });
        }
    }
}

impl eframe::App for ExtractorApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.receive_events();

        // 処理中は再描画を要求
        if self.is_processing {
            ctx.request_repaint();
        }

        CentralPanel::default().show(ctx, |ui| {
            ui.spacing_mut().item_spacing = Vec2::new(8.0, 10.0);

            // ヘッダー
            ui.horizontal(|ui| {
                ui.heading(
                    RichText::new("OCR PDF抽出ツール")
                        .size(24.0)
                        .color(Colors::TEXT_PRIMARY),
                );
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    let out_dir = output_folder(&self.config.output_file);
                    if ui
                        .add_enabled(out_dir.is_some(), egui::Button::new("📁 出力先を開く"))
                        .clicked()
                    {
                        if let Some(dir) = out_dir {
                            let _ = open::that(dir);
                        }
                    }
                });
            });

            ui.label(
                RichText::new("フォルダ内のPDFをOCR → 正規表現で抽出 → CSV/XLSXへ出力")
                    .size(13.0)
                    .color(Colors::TEXT_SECONDARY),
            );

            self.config_form(ui);
            self.pattern_editors(ui);

            // 実行ボタン
            ui.horizontal(|ui| {
                let idle = !self.is_processing;
                if ui
                    .add_enabled(idle, egui::Button::new("最初の1件を処理"))
                    .clicked()
                {
                    self.start_batch(Some(1));
                }
                if ui
                    .add_enabled(
                        idle,
                        egui::Button::new(RichText::new("すべて処理").color(Colors::TEXT_PRIMARY))
                            .fill(Colors::ACCENT),
                    )
                    .clicked()
                {
                    self.start_batch(None);
                }
                if ui
                    .add_enabled(
                        idle && !self.results.is_empty(),
                        egui::Button::new("ライセンス一括抽出CSV..."),
                    )
                    .clicked()
                {
                    self.export_licenses();
                }
            });

            // 進捗
            if self.is_processing {
                ui.horizontal(|ui| {
                    ui.spinner();
                    let label = match self.current_file {
                        Some(ref f) => format!("{} - {}", self.status, f),
                        None => self.status.clone(),
                    };
                    ui.label(RichText::new(label).color(Colors::ACCENT));
                });
                let progress = if self.total_files > 0 {
                    self.results.len() as f32 / self.total_files as f32
                } else {
                    0.0
                };
                ui.add(egui::ProgressBar::new(progress).fill(Colors::ACCENT));
            } else {
                ui.label(RichText::new(&self.status).color(Colors::TEXT_SECONDARY));
            }

            // ライブOCRテキスト
            egui::CollapsingHeader::new("OCRテキスト（処理中のページ）")
                .default_open(false)
                .show(ui, |ui| {
                    egui::ScrollArea::vertical()
                        .id_salt("live_text")
                        .max_height(140.0)
                        .stick_to_bottom(true)
                        .show(ui, |ui| {
                            ui.label(
                                RichText::new(&self.live_text)
                                    .monospace()
                                    .size(11.0)
                                    .color(Colors::TEXT_SECONDARY),
                            );
                        });
                });

            // ログ
            egui::CollapsingHeader::new("ログ")
                .default_open(true)
                .show(ui, |ui| {
                    egui::ScrollArea::vertical()
                        .id_salt("log")
                        .max_height(120.0)
                        .stick_to_bottom(true)
                        .show(ui, |ui| {
                            for line in &self.log_lines {
                                ui.label(
                                    RichText::new(line)
                                        .monospace()
                                        .size(11.0)
                                        .color(Colors::TEXT_SECONDARY),
                                );
                            }
                        });
                });

            // 結果リスト
            ui.horizontal(|ui| {
                ui.label(
                    RichText::new("処理結果")
                        .size(15.0)
                        .color(Colors::TEXT_PRIMARY),
                );
                if !self.results.is_empty() {
                    let failed = self
                        .results
                        .iter()
                        .filter(|r| r.notes.as_deref().is_some_and(|n| n.starts_with("Error:")))
                        .count();
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        ui.label(
                            RichText::new(format!(
                                "{} 件中 {} 件成功",
                                self.results.len(),
                                self.results.len() - failed
                            ))
                            .size(12.0)
                            .color(Colors::TEXT_SECONDARY),
                        );
                    });
                }
            });

            egui::ScrollArea::vertical()
                .id_salt("results")
                .auto_shrink([false, false])
                .show(ui, |ui| {
                    self.results_list(ui);
                });
        });
    }
}

/// 出力ファイルの親フォルダ
fn output_folder(output_file: &str) -> Option<PathBuf> {
    let trimmed = output_file.trim();
    if trimmed.is_empty() {
        return None;
    }
    Path::new(trimmed)
        .parent()
        .filter(|p| p.exists())
        .map(Path::to_path_buf)
}

/// バッチ処理本体（ワーカースレッドで実行）
fn run_batch(config: AppConfig, limit: Option<usize>, tx: Sender<WorkerEvent>) {
    let log = |message: String| {
        tracing::info!("{}", message);
        let _ = tx.send(WorkerEvent::Log(message));
    };

    log(format!("フォルダを走査中: {}", config.input_dir.trim()));
    let mut pdfs = match collect_pdfs_in_folder(config.input_dir.trim()) {
        Ok(pdfs) => pdfs,
        Err(e) => {
            let _ = tx.send(WorkerEvent::Finished {
                message: format!("フォルダの走査に失敗: {}", e),
                success: false,
            });
            return;
        }
    };

    if pdfs.is_empty() {
        let _ = tx.send(WorkerEvent::Finished {
            message: "PDFファイルが見つかりません。".to_string(),
            success: false,
        });
        return;
    }

    if let Some(limit) = limit {
        pdfs.truncate(limit);
    }

    let total = pdfs.len();
    let _ = tx.send(WorkerEvent::Started { total });

    let engine = OcrEngine::with_command(&config.tesseract_path);
    let poppler = config.poppler_path.trim();
    let poppler = (!poppler.is_empty()).then_some(poppler);
    let csv_path = incremental_csv_path(&config.output_file);

    let mut rows: Vec<ExtractionResult> = Vec::with_capacity(total);
    for (idx, pdf_path) in pdfs.iter().enumerate() {
        let file_name = pdf_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unknown.pdf".to_string());
        log(format!("[{}/{}] 処理中 {} ...", idx + 1, total, file_name));

        let result = process_single_pdf(pdf_path, &file_name, &engine, poppler, &config, &tx);

        // 逐次CSV追記（失敗してもバッチは継続）
        match append_result_csv(&result, &csv_path) {
            Ok(()) => log(format!("CSVを更新: {:?}", csv_path)),
            Err(e) => log(format!("CSVの更新に失敗: {}", e)),
        }

        rows.push(result.clone());
        let _ = tx.send(WorkerEvent::FileDone(Box::new(result)));
        log(format!("完了: {}", file_name));
    }

    // 最終エクスポート
    let out_path = PathBuf::from(config.output_file.trim());
    let (message, success) = match export_results(&rows, &out_path) {
        Ok(()) => (format!("結果を保存しました: {:?}", out_path), true),
        Err(e) => (format!("結果の保存に失敗: {}", e), false),
    };
    log(message.clone());
    let _ = tx.send(WorkerEvent::Finished { message, success });
}

/// 単一のPDFファイルを処理
fn process_single_pdf(
    pdf_path: &Path,
    file_name: &str,
    engine: &OcrEngine,
    poppler: Option<&str>,
    config: &AppConfig,
    tx: &Sender<WorkerEvent>,
) -> ExtractionResult {
    let text = ocr_pdf_to_text(
        pdf_path,
        engine,
        poppler,
        config.dpi,
        |page_text, _page, _total| {
            let _ = tx.send(WorkerEvent::Page {
                file_name: file_name.to_string(),
                text: page_text.to_string(),
            });
        },
        |message| {
            let _ = tx.send(WorkerEvent::Log(message));
        },
    );

    match text {
        Ok(text) => ExtractionResult::from_text(file_name, &text, &config.patterns),
        Err(e) => {
            tracing::error!("OCR失敗 {}: {:#}", file_name, e);
            ExtractionResult::failed(file_name, &format!("{:#}", e))
        }
    }
}

/// アプリケーションを起動
pub fn run() -> Result<()> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([780.0, 860.0])
            .with_min_inner_size([640.0, 640.0])
            .with_title("OCR PDF抽出ツール"),
        ..Default::default()
    };

    eframe::run_native(
        "OCR PDF抽出ツール",
        options,
        Box::new(|cc| {
            // ダークテーマを設定
            cc.egui_ctx.set_style(dark_theme());

            // 日本語フォントを設定
            let mut fonts = egui::FontDefinitions::default();

            #[cfg(windows)]
            {
                if let Ok(font_data) = std::fs::read("C:\\Windows\\Fonts\\YuGothM.ttc") {
                    fonts.font_data.insert(
                        "yu_gothic".to_owned(),
                        egui::FontData::from_owned(font_data).into(),
                    );

                    fonts
                        .families
                        .entry(egui::FontFamily::Proportional)
                        .or_default()
                        .insert(0, "yu_gothic".to_owned());

                    fonts
                        .families
                        .entry(egui::FontFamily::Monospace)
                        .or_default()
                        .push("yu_gothic".to_owned());
                }
            }

            cc.egui_ctx.set_fonts(fonts);

            Ok(Box::new(ExtractorApp::default()))
        }),
    )
    .map_err(|e| anyhow::anyhow!("アプリケーションエラー: {}", e))
}
