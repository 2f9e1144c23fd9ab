use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "bitlog",
    version,
    about = "micro:bit UART sensor data logger",
    long_about = "Record `key=value;...` telemetry from a BBC micro:bit, show it live and export \
                  the session to a spreadsheet.\n\
                  Reads from the device over Bluetooth LE (UART service), its USB serial console, \
                  a TCP bridge or a captured file."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Command {
    /// Record a session until the device disconnects or Ctrl-C, then export it
    Record(RecordArgs),
    /// Scan a captured stream and list the sensors it contains
    Schema(SchemaArgs),
    /// Show protocol constants and defaults
    Info(InfoArgs),
}

/// Where the byte stream comes from. Exactly one is required.
#[derive(Args)]
#[group(required = true, multiple = false)]
pub struct SourceArgs {
    /// Connect over Bluetooth LE to the first device whose name starts with
    /// NAME_PREFIX (default "BBC micro:bit")
    #[arg(
        long,
        value_name = "NAME_PREFIX",
        num_args = 0..=1,
        default_missing_value = bitlog_rs::transport::DEFAULT_NAME_PREFIX
    )]
    pub ble: Option<String>,

    /// Serial port of the device (e.g. /dev/ttyACM0)
    #[arg(long)]
    pub serial: Option<String>,

    /// TCP bridge address as host:port
    #[arg(long)]
    pub tcp: Option<String>,

    /// Replay a captured stream from a file
    #[arg(long)]
    pub file: Option<PathBuf>,
}

#[derive(Args)]
pub struct RecordArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// How long to scan for a BLE device, in milliseconds
    #[arg(long, default_value_t = bitlog_rs::transport::DEFAULT_SCAN_TIMEOUT_MS)]
    pub scan_timeout_ms: u64,

    /// Serial baud rate
    #[arg(long, default_value_t = 115200)]
    pub baud: u32,

    /// Replay chunk size in bytes
    #[arg(long, default_value_t = 20)]
    pub chunk_size: usize,

    /// Delay between replayed chunks in milliseconds
    #[arg(long)]
    pub rate_ms: Option<u64>,

    /// JSON configuration file
    #[arg(long, env = "BITLOG_CONFIG")]
    pub config: Option<PathBuf>,

    /// Number of records in the live view
    #[arg(long)]
    pub window: Option<usize>,

    /// Display label for a sensor, as KEY=LABEL (repeatable)
    #[arg(long, value_name = "KEY=LABEL")]
    pub rename: Vec<String>,

    /// Hide a sensor from the live view (repeatable)
    #[arg(long, value_name = "KEY")]
    pub disable: Vec<String>,

    /// Directory for the exported file
    #[arg(long, env = "BITLOG_OUTPUT_DIR", default_value = ".")]
    pub output_dir: PathBuf,

    /// Export format (xlsx, csv)
    #[arg(long, default_value = "xlsx")]
    pub format: String,

    /// Do not export when recording ends
    #[arg(long, default_value_t = false)]
    pub no_export: bool,

    /// Ask the host to keep the display awake while logging
    #[arg(long, default_value_t = false)]
    pub keep_awake: bool,

    /// Print the live view as JSON lines instead of a table
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Suppress the live view and progress messages
    #[arg(long, default_value_t = false)]
    pub quiet: bool,
}

#[derive(Args)]
pub struct SchemaArgs {
    /// Captured stream file
    #[arg(long)]
    pub file: PathBuf,

    /// JSON configuration file
    #[arg(long, env = "BITLOG_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args)]
pub struct InfoArgs {
    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

/// Parse a `KEY=LABEL` rename into its parts.
pub fn parse_rename(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, label)) if !key.trim().is_empty() && !label.trim().is_empty() => {
            Ok((key.trim().to_string(), label.trim().to_string()))
        }
        _ => Err(format!(
            "Invalid rename '{}': expected KEY=LABEL with both parts non-empty",
            s
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rename_valid() {
        assert_eq!(
            parse_rename("P0=Soil moisture").unwrap(),
            ("P0".to_string(), "Soil moisture".to_string())
        );
        assert_eq!(
            parse_rename(" TEMP = Temp = C ").unwrap(),
            ("TEMP".to_string(), "Temp = C".to_string())
        );
    }

    #[test]
    fn test_parse_rename_invalid() {
        assert!(parse_rename("P0").is_err());
        assert!(parse_rename("=Soil").is_err());
        assert!(parse_rename("P0=  ").is_err());
    }

    #[test]
    fn test_source_is_exclusive() {
        let result = Cli::try_parse_from(["bitlog", "record", "--tcp", "a:1", "--file", "x"]);
        assert!(result.is_err());
        let result = Cli::try_parse_from(["bitlog", "record"]);
        assert!(result.is_err());
        let result = Cli::try_parse_from(["bitlog", "record", "--file", "capture.txt"]);
        assert!(result.is_ok());
        let result = Cli::try_parse_from(["bitlog", "record", "--ble", "--tcp", "a:1"]);
        assert!(result.is_err());
    }

    fn record_args(argv: &[&str]) -> RecordArgs {
        match Cli::try_parse_from(argv).unwrap().command {
            Command::Record(args) => args,
            _ => panic!("expected record"),
        }
    }

    #[test]
    fn test_ble_name_prefix() {
        let args = record_args(&["bitlog", "record", "--ble"]);
        assert_eq!(args.source.ble.as_deref(), Some("BBC micro:bit"));
        assert_eq!(args.scan_timeout_ms, 10_000);

        let args = record_args(&["bitlog", "record", "--ble", "BBC micro:bit [tavep]"]);
        assert_eq!(args.source.ble.as_deref(), Some("BBC micro:bit [tavep]"));
    }
}
