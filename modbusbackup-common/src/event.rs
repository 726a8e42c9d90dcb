//! Digital I/O events and decoding of primary event bus payloads.
//!
//! The primary event bus sends JSON arrays whose first element describes the
//! change:
//!
//! ```text
//! [{"dev": "di", "circuit": "2_16", "value": 1}]
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use thiserror::Error;

/// Kind of device that emitted an event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DeviceKind {
    /// Digital input ("di" or "input").
    DigitalInput,
    /// Digital output ("do" or "output").
    DigitalOutput,
    /// Relay output ("relay").
    Relay,
    /// Analog input ("ai").
    AnalogInput,
    /// Analog output ("ao").
    AnalogOutput,
    /// Coil written on the backup bus.
    Coil,
    /// Any other device marker.
    Other(String),
}

impl DeviceKind {
    /// Return the wire marker for this device kind.
    pub fn as_str(&self) -> &str {
        match self {
            DeviceKind::DigitalInput => "di",
            DeviceKind::DigitalOutput => "do",
            DeviceKind::Relay => "relay",
            DeviceKind::AnalogInput => "ai",
            DeviceKind::AnalogOutput => "ao",
            DeviceKind::Coil => "coil",
            DeviceKind::Other(s) => s,
        }
    }
}

impl From<&str> for DeviceKind {
    fn from(s: &str) -> Self {
        match s {
            "di" | "input" => DeviceKind::DigitalInput,
            "do" | "output" => DeviceKind::DigitalOutput,
            "relay" => DeviceKind::Relay,
            "ai" => DeviceKind::AnalogInput,
            "ao" => DeviceKind::AnalogOutput,
            "coil" => DeviceKind::Coil,
            other => DeviceKind::Other(other.to_string()),
        }
    }
}

impl From<String> for DeviceKind {
    fn from(s: String) -> Self {
        DeviceKind::from(s.as_str())
    }
}

impl From<DeviceKind> for String {
    fn from(kind: DeviceKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single signal change on one circuit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigitalEvent {
    #[serde(rename = "dev")]
    pub device_kind: DeviceKind,
    pub circuit: String,
    /// Signal level; any non-zero number counts as high.
    #[serde(deserialize_with = "deserialize_level")]
    pub value: bool,
}

impl DigitalEvent {
    pub fn new(device_kind: DeviceKind, circuit: impl Into<String>, value: bool) -> Self {
        Self {
            device_kind,
            circuit: circuit.into(),
            value,
        }
    }

    /// Event for a write observed on the backup bus register store.
    pub fn coil(address: u16, value: bool) -> Self {
        Self::new(DeviceKind::Coil, address.to_string(), value)
    }
}

fn deserialize_level<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Level {
        Bool(bool),
        Int(i64),
        Float(f64),
    }

    Ok(match Level::deserialize(deserializer)? {
        Level::Bool(b) => b,
        Level::Int(i) => i != 0,
        Level::Float(f) => f != 0.0,
    })
}

/// Errors decoding a primary event bus payload.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Payload is not a JSON array: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Payload array is empty")]
    Empty,

    #[error("Invalid event object: {0}")]
    Event(serde_json::Error),
}

/// Decode the first event of a primary event bus payload.
///
/// Elements after the first are ignored.
pub fn decode_event(payload: &str) -> Result<DigitalEvent, DecodeError> {
    let items: Vec<serde_json::Value> = serde_json::from_str(payload)?;
    let first = items.into_iter().next().ok_or(DecodeError::Empty)?;
    serde_json::from_value(first).map_err(DecodeError::Event)
}
