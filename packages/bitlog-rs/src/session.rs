// Session store: append-only log of timestamped records
//
// The session is the source of truth for export. Records are never mutated
// or reordered; `clear` is the only way to drop them.

use crate::error::{LoggerError, Result};
use crate::export::{Cell, ExportTable};
use crate::parser::Fields;
use crate::schema::SchemaRegistry;
use chrono::{DateTime, Local};
use serde::Serialize;

pub const TIMESTAMP_HEADER: &str = "Timestamp";

/// One parsed observation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    timestamp: DateTime<Local>,
    values: Fields,
}

impl Record {
    pub fn new(timestamp: DateTime<Local>, values: Fields) -> Self {
        Self { timestamp, values }
    }

    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }

    pub fn values(&self) -> &Fields {
        &self.values
    }

    pub fn value(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied()
    }
}

#[derive(Debug, Default)]
pub struct SessionStore {
    records: Vec<Record>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, record: Record) {
        self.records.push(record);
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records in arrival order.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// The last `n` records (fewer if the session is shorter).
    pub fn tail(&self, n: usize) -> &[Record] {
        let start = self.records.len().saturating_sub(n);
        &self.records[start..]
    }

    /// Build the rectangular export table.
    ///
    /// Columns cover every key ever observed, enabled or not, in key order.
    /// Missing values become blank cells. An empty session is rejected.
    pub fn export(&self, registry: &SchemaRegistry, time_format: &str) -> Result<ExportTable> {
        if self.records.is_empty() {
            return Err(LoggerError::EmptySession);
        }

        let header = std::iter::once(TIMESTAMP_HEADER.to_string())
            .chain(registry.iter().map(|s| s.label().to_string()))
            .collect();

        let rows = self
            .records
            .iter()
            .map(|record| {
                std::iter::once(Cell::Text(record.timestamp.format(time_format).to_string()))
                    .chain(registry.iter().map(|s| match record.value(s.key()) {
                        Some(v) => Cell::Number(v),
                        None => Cell::Blank,
                    }))
                    .collect()
            })
            .collect();

        Ok(ExportTable { header, rows })
    }
}
