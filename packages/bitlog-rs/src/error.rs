use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoggerError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Not connected to a device")]
    NotConnected,

    #[error("No data to export")]
    EmptySession,

    #[error("Unknown sensor: {0}")]
    UnknownSensor(String),

    #[error("Export failed: {0}")]
    Export(String),

    #[error("Not supported on this host: {0}")]
    Unsupported(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Logger channel closed")]
    ChannelClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("XLSX error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LoggerError>;
