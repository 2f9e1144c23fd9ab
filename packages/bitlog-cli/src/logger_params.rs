use crate::cli::{self, SourceArgs};
use bitlog_rs::{DeviceFilter, ExportFormat, LoggerConfig, TransportConfig};
use std::path::Path;

/// Load the configuration file (or defaults) and apply `BITLOG_*` overrides.
pub fn load_config(path: Option<&Path>) -> Result<LoggerConfig, String> {
    let config = match path {
        Some(path) => LoggerConfig::from_file(path)
            .map_err(|e| format!("Failed to load config '{}': {}", path.display(), e))?,
        None => LoggerConfig::default(),
    };
    config.with_env_overrides().map_err(|e| e.to_string())
}

/// Apply command-line schema and window options on top of `config`.
pub fn apply_overrides(
    mut config: LoggerConfig,
    window: Option<usize>,
    renames: &[String],
    disabled: &[String],
) -> Result<LoggerConfig, String> {
    if let Some(window) = window {
        config.window_size = window;
    }
    for rename in renames {
        let (key, label) = cli::parse_rename(rename)?;
        config.schema.labels.insert(key, label);
    }
    for key in disabled {
        config.schema.disabled.insert(key.trim().to_string());
    }
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

pub fn build_transport_config(
    source: &SourceArgs,
    scan_timeout_ms: u64,
    baud: u32,
    chunk_size: usize,
    rate_ms: Option<u64>,
) -> Result<TransportConfig, String> {
    if source.ble.is_some() {
        if scan_timeout_ms == 0 {
            return Err("--scan-timeout-ms must be at least 1".to_string());
        }
        return Ok(TransportConfig::Ble { scan_timeout_ms });
    }
    if let Some(port) = &source.serial {
        return Ok(TransportConfig::Serial {
            port: port.clone(),
            baud_rate: baud,
        });
    }
    if let Some(address) = &source.tcp {
        return Ok(TransportConfig::Tcp {
            address: address.clone(),
        });
    }
    if let Some(path) = &source.file {
        if !path.exists() {
            return Err(format!("Capture file not found: {}", path.display()));
        }
        if chunk_size == 0 {
            return Err("--chunk-size must be at least 1".to_string());
        }
        return Ok(TransportConfig::File {
            path: path.clone(),
            chunk_size,
            rate_limit_ms: rate_ms,
        });
    }
    Err("One of --ble, --serial, --tcp or --file is required".to_string())
}

/// Device filter for the selected source. Only BLE narrows the name prefix.
pub fn build_device_filter(source: &SourceArgs) -> DeviceFilter {
    match &source.ble {
        Some(prefix) if !prefix.trim().is_empty() => DeviceFilter {
            name_prefix: prefix.clone(),
            ..DeviceFilter::default()
        },
        _ => DeviceFilter::default(),
    }
}

pub fn parse_format(format: &str) -> Result<ExportFormat, String> {
    format.parse().map_err(|_| {
        format!(
            "Unknown export format '{}'. Supported: {}",
            format,
            ExportFormat::supported_formats().join(", ")
        )
    })
}
