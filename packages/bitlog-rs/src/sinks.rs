// Output sinks for the live view
//
// The logger never renders anything itself. A visualization sink receives the
// whole projection on each update; a table sink receives header rebuilds and
// appended rows.

use crate::error::{LoggerError, Result};
use crate::projector::Projection;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;

/// One live table row: timestamp plus a value per enabled sensor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRow {
    pub timestamp: String,
    pub cells: Vec<Option<f64>>,
}

pub trait VisualizationSink: Send + Sync {
    /// Replace the displayed chart with `projection`.
    fn update(&mut self, projection: &Projection);
}

pub trait TableSink: Send + Sync {
    /// Columns changed (discovery, rename, enable toggle).
    fn rebuild_header(&mut self, header: &[String]);

    fn append_row(&mut self, row: &TableRow);

    /// Session cleared; drop all rows.
    fn clear(&mut self);
}

/// Keeps the host awake while logging.
pub trait KeepAwake: Send + Sync {
    fn acquire(&mut self) -> Result<()>;
    fn release(&mut self);
}

/// Sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl VisualizationSink for NullSink {
    fn update(&mut self, _projection: &Projection) {}
}

impl TableSink for NullSink {
    fn rebuild_header(&mut self, _header: &[String]) {}
    fn append_row(&mut self, _row: &TableRow) {}
    fn clear(&mut self) {}
}

/// Keep-awake for hosts without the capability; acquisition always fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoKeepAwake;

impl KeepAwake for NoKeepAwake {
    fn acquire(&mut self) -> Result<()> {
        Err(LoggerError::Unsupported("keep-awake".to_string()))
    }

    fn release(&mut self) {}
}

/// Everything a [`MemorySink`] has received.
#[derive(Debug, Default, Clone)]
pub struct MemorySinkState {
    pub projection: Projection,
    pub updates: usize,
    pub header: Vec<String>,
    pub header_rebuilds: usize,
    pub rows: Vec<TableRow>,
}

/// Sink that records what it receives. Clones share the same state.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    state: Arc<Mutex<MemorySinkState>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MemorySinkState {
        self.state.lock().clone()
    }
}

impl VisualizationSink for MemorySink {
    fn update(&mut self, projection: &Projection) {
        let mut state = self.state.lock();
        state.projection = projection.clone();
        state.updates += 1;
    }
}

impl TableSink for MemorySink {
    fn rebuild_header(&mut self, header: &[String]) {
        let mut state = self.state.lock();
        state.header = header.to_vec();
        state.header_rebuilds += 1;
    }

    fn append_row(&mut self, row: &TableRow) {
        self.state.lock().rows.push(row.clone());
    }

    fn clear(&mut self) {
        self.state.lock().rows.clear();
    }
}
