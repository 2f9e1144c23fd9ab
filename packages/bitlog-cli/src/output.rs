use bitlog_rs::{Projection, TableRow, TableSink, VisualizationSink};
use std::io::Write;

/// Column width of the live table.
const COLUMN_WIDTH: usize = 18;

/// Write a JSON string to stdout.
pub fn write_output(json: &str) -> Result<(), String> {
    write_line(&mut std::io::stdout().lock(), json)
        .map_err(|e| format!("Failed to write to stdout: {}", e))
}

fn write_line(writer: &mut impl Write, json: &str) -> std::io::Result<()> {
    writer.write_all(json.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.flush()
}

/// Serialize a value to JSON (pretty or compact).
pub fn to_json<T: serde::Serialize>(value: &T, compact: bool) -> Result<String, String> {
    if compact {
        serde_json::to_string(value).map_err(|e| format!("JSON serialization failed: {}", e))
    } else {
        serde_json::to_string_pretty(value)
            .map_err(|e| format!("JSON serialization failed: {}", e))
    }
}

fn format_line<'a>(cells: impl Iterator<Item = &'a str>) -> String {
    cells
        .map(|c| format!("{:<width$}", c, width = COLUMN_WIDTH))
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end()
        .to_string()
}

/// Live table printed to stdout, one line per record.
#[derive(Debug, Default)]
pub struct TerminalTable;

impl TableSink for TerminalTable {
    fn rebuild_header(&mut self, header: &[String]) {
        let line = format_line(header.iter().map(String::as_str));
        println!();
        println!("{}", line);
        println!("{}", "-".repeat(line.len()));
    }

    fn append_row(&mut self, row: &TableRow) {
        let values: Vec<String> = row
            .cells
            .iter()
            .map(|c| c.map(|v| v.to_string()).unwrap_or_default())
            .collect();
        let line = format_line(
            std::iter::once(row.timestamp.as_str()).chain(values.iter().map(String::as_str)),
        );
        println!("{}", line);
    }

    fn clear(&mut self) {}
}

/// Prints every projection update as one compact JSON line.
#[derive(Debug, Default)]
pub struct JsonLines;

impl VisualizationSink for JsonLines {
    fn update(&mut self, projection: &Projection) {
        match to_json(projection, true) {
            Ok(json) => {
                if let Err(e) = write_output(&json) {
                    log::warn!("{}", e);
                }
            }
            Err(e) => log::warn!("{}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_line_pads_columns() {
        let line = format_line(["Timestamp", "Light"].into_iter());
        assert!(line.starts_with("Timestamp "));
        assert!(line.ends_with("Light"));
        assert_eq!(line.len(), COLUMN_WIDTH + 1 + "Light".len());
    }

    #[test]
    fn test_write_line_terminates_json() {
        let mut buffer = Vec::new();
        write_line(&mut buffer, r#"{"labels":[]}"#).unwrap();
        write_line(&mut buffer, r#"{"labels":["09:30:00"]}"#).unwrap();
        assert_eq!(
            String::from_utf8(buffer).unwrap(),
            "{\"labels\":[]}\n{\"labels\":[\"09:30:00\"]}\n"
        );
    }

    #[test]
    fn test_to_json_compact() {
        let json = to_json(&Projection::default(), true).unwrap();
        assert_eq!(json, r#"{"labels":[],"series":[]}"#);
    }
}
