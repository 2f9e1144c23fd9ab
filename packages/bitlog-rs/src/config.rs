use crate::error::{LoggerError, Result};
use crate::export::DEFAULT_SHEET_NAME;
use crate::projector::DEFAULT_WINDOW_SIZE;
use crate::schema::SchemaDefaults;
use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

/// Logger configuration
///
/// Every field has a default, so a JSON config file only needs the keys it
/// wants to change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Number of most recent records in the live view
    pub window_size: usize,
    /// strftime format of live view timestamps
    pub window_time_format: String,
    /// strftime format of exported timestamps
    pub export_time_format: String,
    /// File name prefix of exported sessions
    pub export_prefix: String,
    /// Worksheet name in XLSX exports
    pub sheet_name: String,
    /// Label and enabled overrides applied when a sensor is first seen
    pub schema: SchemaDefaults,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            window_time_format: "%H:%M:%S".to_string(),
            export_time_format: "%Y-%m-%d %H:%M:%S".to_string(),
            export_prefix: "microbit_data".to_string(),
            sheet_name: DEFAULT_SHEET_NAME.to_string(),
            schema: SchemaDefaults::default(),
        }
    }
}

impl LoggerConfig {
    /// Load configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `BITLOG_*` environment variables on top of this configuration
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(value) = env::var("BITLOG_WINDOW_SIZE") {
            self.window_size = value.parse().map_err(|_| {
                LoggerError::InvalidConfig(format!("BITLOG_WINDOW_SIZE is not a number: {}", value))
            })?;
        }
        if let Ok(value) = env::var("BITLOG_EXPORT_PREFIX") {
            self.export_prefix = value;
        }
        if let Ok(value) = env::var("BITLOG_SHEET_NAME") {
            self.sheet_name = value;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.window_size == 0 {
            return Err(LoggerError::InvalidConfig(
                "window_size must be at least 1".to_string(),
            ));
        }
        if self.export_prefix.trim().is_empty() {
            return Err(LoggerError::InvalidConfig(
                "export_prefix must not be empty".to_string(),
            ));
        }
        check_time_format("window_time_format", &self.window_time_format)?;
        check_time_format("export_time_format", &self.export_time_format)?;
        // Excel rejects empty names and names longer than 31 characters.
        if self.sheet_name.is_empty() || self.sheet_name.chars().count() > 31 {
            return Err(LoggerError::InvalidConfig(format!(
                "sheet_name must be 1-31 characters: '{}'",
                self.sheet_name
            )));
        }
        Ok(())
    }
}

/// chrono panics while formatting an invalid strftime string, so reject it up front.
fn check_time_format(name: &str, format: &str) -> Result<()> {
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(LoggerError::InvalidConfig(format!(
            "{} is not a valid strftime format: '{}'",
            name, format
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = LoggerConfig::default();
        assert_eq!(config.window_size, 200);
        assert_eq!(config.export_prefix, "microbit_data");
        assert_eq!(config.sheet_name, "Data");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"window_size": 50, "schema": {{"labels": {{"P0": "Soil"}}, "disabled": ["LIGHT"]}}}}"#
        )
        .unwrap();

        let config = LoggerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.window_size, 50);
        assert_eq!(config.window_time_format, "%H:%M:%S");
        assert_eq!(config.schema.labels["P0"], "Soil");
        assert!(config.schema.disabled.contains("LIGHT"));
    }

    #[test]
    fn test_invalid_window() {
        let config = LoggerConfig {
            window_size: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(LoggerError::InvalidConfig(_))));
    }

    #[test]
    fn test_invalid_time_format() {
        let config = LoggerConfig {
            window_time_format: "%Q".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(LoggerError::InvalidConfig(_))));

        let config = LoggerConfig {
            export_time_format: "%Y-%m-%d %".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(LoggerError::InvalidConfig(_))));
    }

    #[test]
    fn test_invalid_time_format_in_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"window_time_format": "%Q"}}"#).unwrap();
        assert!(matches!(
            LoggerConfig::from_file(file.path()),
            Err(LoggerError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            LoggerConfig::from_file(file.path()),
            Err(LoggerError::Json(_))
        ));
    }
}
