// Schema registry for runtime-discovered sensor channels
//
// The peripheral never announces its channels. Every key seen in a record
// gets a descriptor on first sight; descriptors are never removed. Only the
// display label and the enabled flag change after creation.

use crate::error::{LoggerError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Human-friendly labels for channel names used by the stock logger firmware.
const LABEL_ALIASES: &[(&str, &str)] = &[
    ("TEMP", "Temperature (°C)"),
    ("Temperature", "Temperature (°C)"),
    ("LIGHT", "Light"),
    ("ACCX", "Accel X"),
    ("ACCY", "Accel Y"),
    ("ACCZ", "Accel Z"),
    ("SOUND", "Sound Level"),
    ("HEAD", "Compass"),
];

/// Prefix of edge connector pin channels (`P0`, `P1`, ... `P20`).
///
/// Matched as a plain prefix, so any key starting with `P` is a pin.
const PIN_PREFIX: &str = "P";

/// Channel category, fixed when the descriptor is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorCategory {
    /// Edge connector pin reading
    Pin,
    /// On-board sensor or any other channel
    Basic,
}

impl SensorCategory {
    /// Classify a channel key: any key starting with `P` is a pin.
    pub fn classify(key: &str) -> Self {
        if key.starts_with(PIN_PREFIX) {
            SensorCategory::Pin
        } else {
            SensorCategory::Basic
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SensorCategory::Pin => "pin",
            SensorCategory::Basic => "basic",
        }
    }
}

/// Default label for a key: its alias if one is known, otherwise the key.
pub fn default_label(key: &str) -> String {
    LABEL_ALIASES
        .iter()
        .find(|(alias_key, _)| *alias_key == key)
        .map(|(_, label)| label.to_string())
        .unwrap_or_else(|| key.to_string())
}

/// Display metadata for one discovered channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorDescriptor {
    key: String,
    category: SensorCategory,
    label: String,
    enabled: bool,
}

impl SensorDescriptor {
    fn new(key: &str, defaults: &SchemaDefaults) -> Self {
        Self {
            key: key.to_string(),
            category: SensorCategory::classify(key),
            label: defaults
                .labels
                .get(key)
                .cloned()
                .unwrap_or_else(|| default_label(key)),
            enabled: !defaults.disabled.contains(key),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn category(&self) -> SensorCategory {
        self.category
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

/// Creation-time overrides for labels and enabled state, keyed by channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaDefaults {
    pub labels: BTreeMap<String, String>,
    pub disabled: BTreeSet<String>,
}

/// A user action on the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SchemaCommand {
    Rename { key: String, label: String },
    SetEnabled { key: String, enabled: bool },
}

/// Result of a command that was accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandOutcome {
    Applied,
    /// Accepted but nothing changed (blank label, same enabled state)
    Unchanged,
}

/// Registry of every channel key observed since startup.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    sensors: BTreeMap<String, SensorDescriptor>,
    defaults: SchemaDefaults,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults(defaults: SchemaDefaults) -> Self {
        Self {
            sensors: BTreeMap::new(),
            defaults,
        }
    }

    /// Create descriptors for keys seen for the first time.
    ///
    /// Returns the newly created keys in lexicographic order.
    pub fn observe<I, K>(&mut self, keys: I) -> Vec<String>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let mut discovered = Vec::new();
        for key in keys {
            let key = key.as_ref();
            if self.sensors.contains_key(key) {
                continue;
            }
            let descriptor = SensorDescriptor::new(key, &self.defaults);
            log::debug!(
                "Discovered {} sensor '{}' (label '{}')",
                descriptor.category.as_str(),
                key,
                descriptor.label
            );
            self.sensors.insert(key.to_string(), descriptor);
            discovered.push(key.to_string());
        }
        discovered.sort();
        discovered
    }

    pub fn apply(&mut self, command: SchemaCommand) -> Result<CommandOutcome> {
        match command {
            SchemaCommand::Rename { key, label } => self.rename(&key, &label),
            SchemaCommand::SetEnabled { key, enabled } => self.set_enabled(&key, enabled),
        }
    }

    /// Replace a sensor's label. A label that trims to nothing keeps the old one.
    pub fn rename(&mut self, key: &str, new_label: &str) -> Result<CommandOutcome> {
        let sensor = self.get_mut(key)?;
        let trimmed = new_label.trim();
        if trimmed.is_empty() || trimmed == sensor.label {
            return Ok(CommandOutcome::Unchanged);
        }
        sensor.label = trimmed.to_string();
        Ok(CommandOutcome::Applied)
    }

    /// Include or exclude a sensor from the live view. History is untouched.
    pub fn set_enabled(&mut self, key: &str, enabled: bool) -> Result<CommandOutcome> {
        let sensor = self.get_mut(key)?;
        if sensor.enabled == enabled {
            return Ok(CommandOutcome::Unchanged);
        }
        sensor.enabled = enabled;
        Ok(CommandOutcome::Applied)
    }

    pub fn get(&self, key: &str) -> Option<&SensorDescriptor> {
        self.sensors.get(key)
    }

    fn get_mut(&mut self, key: &str) -> Result<&mut SensorDescriptor> {
        self.sensors
            .get_mut(key)
            .ok_or_else(|| LoggerError::UnknownSensor(key.to_string()))
    }

    /// All descriptors, ordered by key.
    pub fn iter(&self) -> impl Iterator<Item = &SensorDescriptor> {
        self.sensors.values()
    }

    /// Enabled descriptors, ordered by key.
    pub fn enabled(&self) -> impl Iterator<Item = &SensorDescriptor> {
        self.sensors.values().filter(|s| s.enabled)
    }

    pub fn by_category(&self, category: SensorCategory) -> impl Iterator<Item = &SensorDescriptor> {
        self.sensors.values().filter(move |s| s.category == category)
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }
}
