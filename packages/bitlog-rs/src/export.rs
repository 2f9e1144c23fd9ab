/// Session export
///
/// Serializes the rectangular session table produced by
/// [`SessionStore::export`](crate::session::SessionStore::export) into
/// spreadsheet files.
///
/// Data pipeline:
/// SessionStore + SchemaRegistry → ExportTable → Exporter → .xlsx / .csv
use crate::error::{LoggerError, Result};
use chrono::{DateTime, Utc};
use rust_xlsxwriter::Workbook;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

pub const DEFAULT_SHEET_NAME: &str = "Data";

/// One cell of the export table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Text(String),
    Number(f64),
    /// Value absent from the record; written as an empty cell, never zero
    Blank,
}

impl Cell {
    /// Plain-text rendering, empty for blanks.
    pub fn to_text(&self) -> String {
        match self {
            Cell::Text(text) => text.clone(),
            Cell::Number(value) => value.to_string(),
            Cell::Blank => String::new(),
        }
    }
}

/// Header row plus one row per record, every row as wide as the header.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl ExportTable {
    /// Number of rows including the header.
    pub fn row_count(&self) -> usize {
        self.rows.len() + 1
    }

    pub fn column_count(&self) -> usize {
        self.header.len()
    }
}

/// Supported spreadsheet formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Xlsx,
    Csv,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Xlsx => "xlsx",
            ExportFormat::Csv => "csv",
        }
    }

    pub fn create_exporter(&self, sheet_name: &str) -> Box<dyn Exporter> {
        match self {
            ExportFormat::Xlsx => Box::new(XlsxExporter::new(sheet_name)),
            ExportFormat::Csv => Box::new(CsvExporter::new()),
        }
    }

    pub fn supported_formats() -> Vec<&'static str> {
        vec!["xlsx", "csv"]
    }
}

impl FromStr for ExportFormat {
    type Err = LoggerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "xlsx" | "excel" => Ok(ExportFormat::Xlsx),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(LoggerError::Export(format!(
                "Unsupported export format: {}",
                other
            ))),
        }
    }
}

/// Trait that all exporters implement
pub trait Exporter: Send + Sync {
    /// Write the table to `output_path`, replacing any existing file.
    fn write(&self, table: &ExportTable, output_path: &Path) -> Result<()>;

    /// Format name (e.g., "XLSX", "CSV")
    fn format_name(&self) -> &str;

    fn default_extension(&self) -> &str;
}

/// Excel workbook with a single sheet
pub struct XlsxExporter {
    sheet_name: String,
}

impl XlsxExporter {
    pub fn new(sheet_name: impl Into<String>) -> Self {
        Self {
            sheet_name: sheet_name.into(),
        }
    }
}

impl Default for XlsxExporter {
    fn default() -> Self {
        Self::new(DEFAULT_SHEET_NAME)
    }
}

impl Exporter for XlsxExporter {
    fn write(&self, table: &ExportTable, output_path: &Path) -> Result<()> {
        let mut workbook = Workbook::new();

        {
            let sheet = workbook.add_worksheet();
            sheet.set_name(&self.sheet_name)?;

            for (col, title) in table.header.iter().enumerate() {
                sheet.write_string(0, col as u16, title)?;
            }

            for (row_idx, row) in table.rows.iter().enumerate() {
                let row_num = row_idx as u32 + 1;
                for (col, cell) in row.iter().enumerate() {
                    match cell {
                        Cell::Text(text) => {
                            sheet.write_string(row_num, col as u16, text)?;
                        }
                        Cell::Number(value) => {
                            sheet.write_number(row_num, col as u16, *value)?;
                        }
                        Cell::Blank => {}
                    }
                }
            }
        }

        workbook.save(output_path)?;
        Ok(())
    }

    fn format_name(&self) -> &str {
        "XLSX"
    }

    fn default_extension(&self) -> &str {
        "xlsx"
    }
}

/// Comma-separated values; blanks become empty fields
pub struct CsvExporter;

impl CsvExporter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CsvExporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Exporter for CsvExporter {
    fn write(&self, table: &ExportTable, output_path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(output_path)?;
        writer.write_record(&table.header)?;
        for row in &table.rows {
            writer.write_record(row.iter().map(Cell::to_text))?;
        }
        writer.flush()?;
        Ok(())
    }

    fn format_name(&self) -> &str {
        "CSV"
    }

    fn default_extension(&self) -> &str {
        "csv"
    }
}

/// File name for an export taken at `at`.
///
/// The ISO-8601 timestamp has `:` and `.` replaced with `-` so the name is
/// valid on every common filesystem.
pub fn export_filename(prefix: &str, at: DateTime<Utc>, extension: &str) -> String {
    let stamp = at
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
        .replace([':', '.'], "-");
    format!("{}_{}.{}", prefix, stamp, extension)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn sample_table() -> ExportTable {
        ExportTable {
            header: vec!["Timestamp".to_string(), "Light".to_string(), "P0".to_string()],
            rows: vec![
                vec![
                    Cell::Text("2024-05-01 09:30:00".to_string()),
                    Cell::Number(40.0),
                    Cell::Blank,
                ],
                vec![
                    Cell::Text("2024-05-01 09:30:01".to_string()),
                    Cell::Blank,
                    Cell::Number(1.5),
                ],
            ],
        }
    }

    #[test]
    fn test_export_filename() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 34, 56).unwrap()
            + chrono::Duration::milliseconds(789);
        assert_eq!(
            export_filename("microbit_data", at, "xlsx"),
            "microbit_data_2024-05-01T12-34-56-789Z.xlsx"
        );
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("XLSX".parse::<ExportFormat>().unwrap(), ExportFormat::Xlsx);
        assert_eq!("csv".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert!("ods".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn test_csv_blanks_are_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.csv");

        CsvExporter::new().write(&sample_table(), &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "Timestamp,Light,P0");
        assert_eq!(lines[1], "2024-05-01 09:30:00,40,");
        assert_eq!(lines[2], "2024-05-01 09:30:01,,1.5");
    }

    #[test]
    fn test_xlsx_written() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.xlsx");

        let exporter = ExportFormat::Xlsx.create_exporter(DEFAULT_SHEET_NAME);
        exporter.write(&sample_table(), &path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        // XLSX is a zip container.
        assert_eq!(&bytes[..2], b"PK");
        assert_eq!(exporter.format_name(), "XLSX");
    }

    #[test]
    fn test_table_dimensions() {
        let table = sample_table();
        assert_eq!(table.row_count(), 3);
        assert_eq!(table.column_count(), 3);
    }
}
