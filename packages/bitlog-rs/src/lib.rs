pub mod command;
pub mod config;
pub mod controller;
pub mod error;
pub mod export;
pub mod logger;
pub mod parser;
pub mod projector;
pub mod reassembler;
pub mod schema;
pub mod session;
pub mod sinks;
pub mod transport;

pub use command::{LoggerCommand, LoggerHandle, StartOutcome};
pub use config::LoggerConfig;
pub use controller::{LoggerController, LoggerEvent};
pub use error::{LoggerError, Result};
pub use export::{Cell, ExportFormat, ExportTable, Exporter};
pub use logger::{ConnectionState, IngestReport, Logger};
pub use parser::{parse_line, Fields};
pub use projector::{Projection, Series, WindowProjector};
pub use reassembler::LineReassembler;
pub use schema::{
    CommandOutcome, SchemaCommand, SchemaDefaults, SchemaRegistry, SensorCategory,
    SensorDescriptor,
};
pub use session::{Record, SessionStore};
pub use sinks::{KeepAwake, MemorySink, NullSink, TableRow, TableSink, VisualizationSink};
pub use transport::{create_transport, DeviceFilter, DeviceHandle, Transport, TransportConfig};
