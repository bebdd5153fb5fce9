//! エクスポートモジュール - CSV逐次追記とCSV/XLSX出力

use crate::parser::ExtractionResult;
use crate::parser::license::{extract_all_license_numbers, license_summary};
use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

/// 結果テーブルの列（順序固定）
pub const RESULT_COLUMNS: [&str; 8] = [
    "File Name",
    "License ID",
    "Date",
    "Reference ID",
    "Address",
    "Start Date",
    "End Date",
    "Notes",
];

/// ライセンス一括抽出の列
pub const LICENSE_COLUMNS: [&str; 3] = ["File Name", "Licenses", "Summary"];

fn result_to_record(result: &ExtractionResult) -> Vec<String> {
    let cell = |v: &Option<String>| v.clone().unwrap_or_default();
    vec![
        result.file_name.clone(),
        cell(&result.license_id),
        cell(&result.date),
        cell(&result.reference_id),
        cell(&result.address),
        cell(&result.start_date),
        cell(&result.end_date),
        cell(&result.notes),
    ]
}

/// CSVへ行を追記する。ファイルが無いときだけヘッダを書く
pub fn append_rows_csv(rows: &[Vec<String>], path: &Path, columns: &[&str]) -> Result<()> {
    let exists = path.exists();
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("CSVを開けません: {:?}", path))?;

    let mut writer = csv::Writer::from_writer(file);
    if !exists {
        writer.write_record(columns)?;
    }
    for row in rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// 処理中の逐次追記用に結果1件をCSVへ書く
pub fn append_result_csv(result: &ExtractionResult, path: &Path) -> Result<()> {
    append_rows_csv(&[result_to_record(result)], path, &RESULT_COLUMNS)
}

/// 逐次追記先のCSVパス
/// 最終出力が .xlsx の場合は同名の .csv に切り替える
pub fn incremental_csv_path(output_file: &str) -> PathBuf {
    let path = PathBuf::from(output_file.trim());
    if path
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"))
    {
        path
    } else {
        path.with_extension("csv")
    }
}

/// 最終結果を出力ファイルへ書き出す（拡張子で形式を決定）
pub fn export_results(results: &[ExtractionResult], path: &Path) -> Result<()> {
    let is_xlsx = path
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("xlsx"));
    if is_xlsx {
        export_xlsx(results, path)
    } else {
        export_csv(results, path)
    }
}

fn export_csv(results: &[ExtractionResult], path: &Path) -> Result<()> {
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("CSVを作成できません: {:?}", path))?;
    writer.write_record(RESULT_COLUMNS)?;
    for result in results {
        writer.write_record(result_to_record(result))?;
    }
    writer.flush()?;
    Ok(())
}

fn export_xlsx(results: &[ExtractionResult], path: &Path) -> Result<()> {
    use rust_xlsxwriter::Workbook;

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Results")?;

    for (col, header) in RESULT_COLUMNS.iter().enumerate() {
        worksheet.write_string(0, col as u16, *header)?;
    }
    for (row, result) in results.iter().enumerate() {
        for (col, value) in result_to_record(result).iter().enumerate() {
            worksheet.write_string(row as u32 + 1, col as u16, value)?;
        }
    }

    workbook
        .save(path)
        .with_context(|| format!("XLSXの保存に失敗: {:?}", path))?;
    Ok(())
}

/// ライセンス一括抽出の結果をCSVへ書き出す
/// 各ファイルの全ライセンスを "; " で連結し、サマリー列を付ける
pub fn export_licenses_csv(results: &[ExtractionResult], path: &Path) -> Result<()> {
    let rows: Vec<Vec<String>> = results
        .iter()
        .map(|r| {
            let licenses = extract_all_license_numbers(&r.raw_text).join("; ");
            let summary = license_summary(&licenses, r.address.as_deref().unwrap_or(""));
            vec![r.file_name.clone(), licenses, summary]
        })
        .collect();

    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("CSVを作成できません: {:?}", path))?;
    writer.write_record(LICENSE_COLUMNS)?;
    for row in &rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_result(name: &str) -> ExtractionResult {
        ExtractionResult {
            file_name: name.to_string(),
            license_id: Some("LIC-123".to_string()),
            date: Some("12/03/2024".to_string()),
            reference_id: None,
            address: Some("Main St".to_string()),
            start_date: None,
            end_date: None,
            notes: None,
            raw_text: "Permit CL 41 (RO05)".to_string(),
        }
    }

    #[test]
    fn append_writes_header_only_once() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("out.csv");

        append_result_csv(&sample_result("a.pdf"), &path).unwrap();
        append_result_csv(&sample_result("b.pdf"), &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("File Name,License ID"));
        assert!(lines[1].starts_with("a.pdf,LIC-123"));
        assert!(lines[2].starts_with("b.pdf,"));
    }

    #[test]
    fn export_csv_truncates_previous_content() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("out.csv");
        std::fs::write(&path, "stale,data\n1,2\n3,4\n5,6\n").unwrap();

        export_results(&[sample_result("a.pdf")], &path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.starts_with("File Name"));
    }

    #[test]
    fn empty_fields_become_empty_cells() {
        let record = result_to_record(&ExtractionResult {
            file_name: "x.pdf".to_string(),
            ..Default::default()
        });
        assert_eq!(record.len(), RESULT_COLUMNS.len());
        assert!(record[1..].iter().all(|c| c.is_empty()));
    }

    #[test]
    fn incremental_path_swaps_xlsx_for_csv() {
        assert_eq!(
            incremental_csv_path("results.xlsx"),
            PathBuf::from("results.csv")
        );
        assert_eq!(
            incremental_csv_path("results.csv"),
            PathBuf::from("results.csv")
        );
    }

    #[test]
    fn license_export_includes_summary() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("licenses.csv");
        export_licenses_csv(&[sample_result("a.pdf")], &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.lines().count() == 2);
        assert!(content.contains("CL 41 (RO05)"));
        assert!(content.contains("5 times"));
    }

    #[test]
    fn xlsx_export_writes_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("out.xlsx");
        export_results(&[sample_result("a.pdf")], &path).unwrap();
        assert!(path.metadata().unwrap().len() > 0);
    }
}
