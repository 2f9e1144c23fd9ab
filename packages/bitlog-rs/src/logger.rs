// Logger state: everything one logging session needs, in one place
//
// Chunks and user actions are applied to this object one at a time. It holds
// no locks and spawns nothing; the controller decides when each operation
// runs, which keeps session order equal to chunk arrival order.

use crate::config::LoggerConfig;
use crate::error::{LoggerError, Result};
use crate::export::ExportTable;
use crate::parser::parse_line;
use crate::projector::{Projection, WindowProjector};
use crate::reassembler::LineReassembler;
use crate::schema::{CommandOutcome, SchemaCommand, SchemaRegistry};
use crate::session::{Record, SessionStore, TIMESTAMP_HEADER};
use crate::sinks::TableRow;
use crate::transport::DeviceHandle;
use chrono::{DateTime, Local};
use serde::Serialize;

/// Connection and logging state
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum ConnectionState {
    Disconnected,
    Connected {
        device: DeviceHandle,
    },
    Logging {
        device: DeviceHandle,
        started_at: DateTime<Local>,
    },
}

impl ConnectionState {
    pub fn device(&self) -> Option<&DeviceHandle> {
        match self {
            ConnectionState::Disconnected => None,
            ConnectionState::Connected { device } | ConnectionState::Logging { device, .. } => {
                Some(device)
            }
        }
    }
}

/// What one chunk produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestReport {
    /// Lines completed by the chunk, empty ones included
    pub lines: usize,
    /// Keys seen for the first time, sorted
    pub discovered: Vec<String>,
    /// Records appended to the session
    pub appended: usize,
}

pub struct Logger {
    config: LoggerConfig,
    reassembler: LineReassembler,
    registry: SchemaRegistry,
    session: SessionStore,
    projector: WindowProjector,
    state: ConnectionState,
}

impl Logger {
    pub fn new(config: LoggerConfig) -> Self {
        let projector = WindowProjector::new(config.window_size, config.window_time_format.clone());
        Self {
            registry: SchemaRegistry::with_defaults(config.schema.clone()),
            reassembler: LineReassembler::new(),
            session: SessionStore::new(),
            projector,
            state: ConnectionState::Disconnected,
            config,
        }
    }

    pub fn config(&self) -> &LoggerConfig {
        &self.config
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn is_connected(&self) -> bool {
        !matches!(self.state, ConnectionState::Disconnected)
    }

    pub fn is_logging(&self) -> bool {
        matches!(self.state, ConnectionState::Logging { .. })
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn connected(&mut self, device: DeviceHandle) {
        log::info!("Connected to {} ({})", device.name, device.address);
        self.reassembler.reset();
        self.state = ConnectionState::Connected { device };
    }

    /// Mark the peer as gone. Returns whether logging was active.
    ///
    /// Recorded data is kept; a partial line from the old connection is dropped.
    pub fn disconnected(&mut self) -> bool {
        let was_logging = self.is_logging();
        if was_logging {
            log::info!("Disconnected while logging, {} records kept", self.session.len());
        }
        self.reassembler.reset();
        self.state = ConnectionState::Disconnected;
        was_logging
    }

    /// Start appending records. Rejected while disconnected.
    pub fn start_logging(&mut self) -> Result<()> {
        match &self.state {
            ConnectionState::Disconnected => Err(LoggerError::NotConnected),
            ConnectionState::Logging { .. } => Ok(()),
            ConnectionState::Connected { device } => {
                log::info!("Logging started");
                self.state = ConnectionState::Logging {
                    device: device.clone(),
                    started_at: Local::now(),
                };
                Ok(())
            }
        }
    }

    /// Stop appending records. Returns whether logging was active.
    pub fn stop_logging(&mut self) -> bool {
        match &self.state {
            ConnectionState::Logging { device, .. } => {
                log::info!("Logging stopped, {} records", self.session.len());
                self.state = ConnectionState::Connected {
                    device: device.clone(),
                };
                true
            }
            _ => false,
        }
    }

    pub fn ingest(&mut self, chunk: &[u8]) -> IngestReport {
        self.ingest_at(chunk, Local::now())
    }

    /// Feed one chunk, stamping any completed record with `now`.
    ///
    /// Sensors are registered whether or not logging is active; records are
    /// appended only while logging.
    pub fn ingest_at(&mut self, chunk: &[u8], now: DateTime<Local>) -> IngestReport {
        let lines = self.reassembler.push(chunk);
        let mut report = IngestReport {
            lines: lines.len(),
            ..Default::default()
        };

        for line in lines {
            if line.is_empty() {
                continue;
            }
            let values = parse_line(&line);
            if values.is_empty() {
                continue;
            }
            log::trace!("Parsed {} fields from '{}'", values.len(), line);

            report.discovered.extend(self.registry.observe(values.keys()));

            if self.is_logging() {
                self.session.append(Record::new(now, values));
                report.appended += 1;
            }
        }

        report
    }

    pub fn apply(&mut self, command: SchemaCommand) -> Result<CommandOutcome> {
        self.registry.apply(command)
    }

    /// Drop all records. Discovered sensors and their settings stay.
    pub fn clear(&mut self) {
        log::info!("Clearing {} records", self.session.len());
        self.session.clear();
    }

    pub fn project(&self) -> Projection {
        self.projector.project(&self.session, &self.registry)
    }

    /// Live table columns: `Timestamp` and the enabled sensors' labels.
    pub fn live_header(&self) -> Vec<String> {
        std::iter::once(TIMESTAMP_HEADER.to_string())
            .chain(self.registry.enabled().map(|s| s.label().to_string()))
            .collect()
    }

    pub fn table_row(&self, record: &Record) -> TableRow {
        TableRow {
            timestamp: record
                .timestamp()
                .format(&self.config.window_time_format)
                .to_string(),
            cells: self
                .registry
                .enabled()
                .map(|s| record.value(s.key()))
                .collect(),
        }
    }

    pub fn export_table(&self) -> Result<ExportTable> {
        self.session
            .export(&self.registry, &self.config.export_time_format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn device() -> DeviceHandle {
        DeviceHandle {
            name: "BBC micro:bit [zogeg]".to_string(),
            address: "test".to_string(),
        }
    }

    fn logging(window_size: usize) -> Logger {
        let mut logger = Logger::new(LoggerConfig {
            window_size,
            ..Default::default()
        });
        logger.connected(device());
        logger.start_logging().unwrap();
        logger
    }

    fn at(second: i64) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap() + Duration::seconds(second)
    }

    #[test]
    fn test_start_requires_connection() {
        let mut logger = Logger::new(LoggerConfig::default());
        assert!(matches!(logger.start_logging(), Err(LoggerError::NotConnected)));
        assert_eq!(logger.state(), &ConnectionState::Disconnected);
    }

    #[test]
    fn test_discovers_without_logging() {
        let mut logger = Logger::new(LoggerConfig::default());
        logger.connected(device());

        let report = logger.ingest(b"TEMP=20;P0=1\n");
        assert_eq!(report.discovered, vec!["P0", "TEMP"]);
        assert_eq!(report.appended, 0);
        assert!(logger.session().is_empty());
    }

    #[test]
    fn test_noise_lines_produce_nothing() {
        let mut logger = logging(10);
        let report = logger.ingest(b"\n\nbooting...\n=;x=y\n");
        assert_eq!(report.lines, 4);
        assert_eq!(report.appended, 0);
        assert!(logger.registry().is_empty());
    }

    #[test]
    fn test_chunked_records() {
        let mut logger = logging(10);
        logger.ingest_at(b"TEMP=2", at(0));
        let report = logger.ingest_at(b"1;LIGHT=40\nTEMP=22\nP1", at(1));
        assert_eq!(report.appended, 2);
        assert_eq!(logger.session().len(), 2);
        assert_eq!(logger.session().records()[0].value("TEMP"), Some(21.0));
        assert_eq!(logger.session().records()[1].timestamp(), at(1));
    }

    #[test]
    fn test_disable_then_export_keeps_history() {
        let mut logger = logging(10);
        logger.ingest_at(b"A=1;B=2\nA=3\n", at(0));

        logger
            .apply(SchemaCommand::SetEnabled {
                key: "B".to_string(),
                enabled: false,
            })
            .unwrap();

        let projection = logger.project();
        assert!(projection.series("B").is_none());
        assert_eq!(logger.live_header(), vec!["Timestamp", "A"]);

        let table = logger.export_table().unwrap();
        assert_eq!(table.header, vec!["Timestamp", "A", "B"]);
        assert_eq!(table.rows[1][2], crate::export::Cell::Blank);
    }

    #[test]
    fn test_clear_then_append() {
        let mut logger = logging(10);
        logger.ingest_at(b"A=1\nA=2\n", at(0));
        logger.clear();

        let projection = logger.project();
        assert!(projection.labels.is_empty());
        assert!(projection.series.iter().all(|s| s.values.is_empty()));
        assert_eq!(logger.registry().len(), 1);

        logger.ingest_at(b"A=3\n", at(1));
        assert_eq!(logger.project().len(), 1);
    }

    #[test]
    fn test_window_is_exactly_capacity() {
        let mut logger = logging(5);
        for i in 0..12 {
            logger.ingest_at(format!("N={}\n", i).as_bytes(), at(i));
            let expected = (i as usize + 1).min(5);
            assert_eq!(logger.project().len(), expected);
        }
        let project = logger.project();
        let values = &project.series("N").unwrap().values;
        assert_eq!(values[0], Some(7.0));
        assert_eq!(values[4], Some(11.0));
    }

    #[test]
    fn test_disconnect_stops_logging_and_keeps_records() {
        let mut logger = logging(10);
        logger.ingest(b"A=1\nA=");
        assert!(logger.disconnected());
        assert!(!logger.is_logging());
        assert!(logger.export_table().is_ok());

        // The stale partial line does not leak into the next connection.
        logger.connected(device());
        logger.start_logging().unwrap();
        logger.ingest(b"2\n");
        assert_eq!(logger.session().len(), 1);
    }

    #[test]
    fn test_stop_logging() {
        let mut logger = logging(10);
        assert!(logger.stop_logging());
        assert!(!logger.stop_logging());
        logger.ingest(b"A=1\n");
        assert!(logger.session().is_empty());
        assert!(logger.is_connected());
    }

    #[test]
    fn test_table_row_follows_enabled_columns() {
        let mut logger = logging(10);
        logger.ingest_at(b"A=1;C=3\n", at(0));
        logger.ingest_at(b"B=2\n", at(1));
        logger.registry.set_enabled("A", false).unwrap();

        let record = logger.session().records()[0].clone();
        let row = logger.table_row(&record);
        assert_eq!(row.timestamp, "09:00:00");
        assert_eq!(row.cells, vec![None, Some(3.0)]);
    }
}
