use serde::de::{self, Deserializer, Unexpected};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::circuit::CircuitEntry;
use crate::edge::FilterConfig;
use crate::error::{Error, Result};

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format (default).
    #[default]
    Text,
    /// Structured JSON format.
    Json,
}

/// Common logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format: "text" or "json".
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Circuit mapping and event filtering shared by both bridge directions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MappingConfig {
    /// Explicit circuit records.
    #[serde(default)]
    pub circuits: Vec<CircuitEntry>,

    /// Generated layout: group sizes expanded into `<group>_<position>` circuits.
    #[serde(default, deserialize_with = "whole_numbers")]
    pub circuit_groups: Vec<u16>,

    /// Edge filter settings.
    #[serde(default)]
    pub filter: FilterConfig,
}

/// Deserialize a non-negative integer field without lossy casts.
///
/// JSON5 reads every number as a float, so `-1` or `1.7` would otherwise be
/// truncated into a valid-looking value. Those are rejected instead, as is
/// anything that does not fit `T`.
pub fn whole_number<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<u64>,
{
    to_whole(f64::deserialize(deserializer)?)
}

/// Sequence form of [`whole_number`].
pub fn whole_numbers<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<u64>,
{
    Vec::<f64>::deserialize(deserializer)?
        .into_iter()
        .map(to_whole)
        .collect()
}

fn to_whole<T, E>(value: f64) -> std::result::Result<T, E>
where
    T: TryFrom<u64>,
    E: de::Error,
{
    if !value.is_finite() || value < 0.0 || value.fract() != 0.0 || value > u64::MAX as f64 {
        return Err(E::invalid_value(
            Unexpected::Float(value),
            &"a non-negative integer",
        ));
    }

    T::try_from(value as u64)
        .map_err(|_| E::invalid_value(Unexpected::Float(value), &"an integer in range"))
}

/// Load a configuration file in JSON5 format.
pub fn load_config<T: for<'de> Deserialize<'de>>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!(
            "Failed to read config file '{}': {}",
            path.display(),
            e
        ))
    })?;

    json5::from_str(&content).map_err(|e| {
        Error::Config(format!(
            "Failed to parse config file '{}': {}",
            path.display(),
            e
        ))
    })
}

/// Load a configuration from a JSON5 string.
pub fn parse_config<T: for<'de> Deserialize<'de>>(content: &str) -> Result<T> {
    json5::from_str(content).map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
}
