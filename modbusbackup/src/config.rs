//! Configuration for the modbus backup bridge.

use modbusbackup_bridge_framework::{BridgeConfig, BridgeError, LoggingConfig, Result};
use modbusbackup_common::{CircuitDirectory, EdgeFilter, MappingConfig, whole_number};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Complete bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupBridgeConfig {
    /// Backup bus (Modbus RTU) settings
    #[serde(default)]
    pub serial: SerialConfig,

    /// Primary plane endpoints
    #[serde(default)]
    pub primary: PrimaryConfig,

    /// Circuit mapping and edge filter
    pub mapping: MappingConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Serial line settings for the backup bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Serial port path (e.g., "/dev/ttyNS0" or "COM1")
    #[serde(default = "default_port")]
    pub port: String,
    /// Baud rate (default: 19200)
    #[serde(default = "default_baud_rate", deserialize_with = "whole_number")]
    pub baud_rate: u32,
    /// Data bits (default: 8)
    #[serde(default = "default_data_bits", deserialize_with = "whole_number")]
    pub data_bits: u8,
    /// Parity: "none", "even", or "odd" (default: "none")
    #[serde(default = "default_parity")]
    pub parity: String,
    /// Stop bits: 1 or 2 (default: 1)
    #[serde(default = "default_stop_bits", deserialize_with = "whole_number")]
    pub stop_bits: u8,
    /// Modbus unit/slave ID addressed by the client (1-247)
    #[serde(default = "default_unit_id", deserialize_with = "whole_number")]
    pub unit_id: u8,
    /// Serial timeout in milliseconds, accepted for command line compatibility.
    ///
    /// Not applied to the port: the tokio-modbus RTU codec delimits frames by
    /// length and CRC, and tokio-serial does not honor read timeouts.
    #[serde(default = "default_timeout_ms", deserialize_with = "whole_number")]
    pub timeout_ms: u64,
    /// Upper bound for a single coil write issued by the client
    #[serde(default = "default_response_timeout_ms", deserialize_with = "whole_number")]
    pub response_timeout_ms: u64,
}

fn default_port() -> String {
    "/dev/ttyNS0".to_string()
}

fn default_baud_rate() -> u32 {
    19200
}

fn default_data_bits() -> u8 {
    8
}

fn default_parity() -> String {
    "none".to_string()
}

fn default_stop_bits() -> u8 {
    1
}

fn default_unit_id() -> u8 {
    1
}

fn default_timeout_ms() -> u64 {
    5
}

fn default_response_timeout_ms() -> u64 {
    1000
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            baud_rate: default_baud_rate(),
            data_bits: default_data_bits(),
            parity: default_parity(),
            stop_bits: default_stop_bits(),
            unit_id: default_unit_id(),
            timeout_ms: default_timeout_ms(),
            response_timeout_ms: default_response_timeout_ms(),
        }
    }
}

impl SerialConfig {
    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }
}

/// Primary plane endpoints: event WebSocket and relay HTTP API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrimaryConfig {
    /// Event bus WebSocket URI
    #[serde(default = "default_websocket_uri")]
    pub websocket_uri: String,
    /// Relay API base URL; relays live under `{relay_api}/relay/{name}`
    #[serde(default = "default_relay_api")]
    pub relay_api: String,
    /// HTTP request timeout in milliseconds
    #[serde(default = "default_request_timeout_ms", deserialize_with = "whole_number")]
    pub request_timeout_ms: u64,
    /// Delay before reconnecting a dropped event stream
    #[serde(default = "default_reconnect_delay_secs", deserialize_with = "whole_number")]
    pub reconnect_delay_secs: u64,
}

fn default_websocket_uri() -> String {
    "ws://localhost/ws".to_string()
}

fn default_relay_api() -> String {
    "http://localhost/json".to_string()
}

fn default_request_timeout_ms() -> u64 {
    2000
}

fn default_reconnect_delay_secs() -> u64 {
    5
}

impl Default for PrimaryConfig {
    fn default() -> Self {
        Self {
            websocket_uri: default_websocket_uri(),
            relay_api: default_relay_api(),
            request_timeout_ms: default_request_timeout_ms(),
            reconnect_delay_secs: default_reconnect_delay_secs(),
        }
    }
}

impl PrimaryConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }
}

impl BackupBridgeConfig {
    /// Build the circuit directory from the mapping section.
    pub fn directory(&self) -> Result<CircuitDirectory> {
        Ok(CircuitDirectory::from_config(&self.mapping)?)
    }

    /// Build the edge filter from the mapping section.
    pub fn edge_filter(&self) -> EdgeFilter {
        EdgeFilter::new(&self.mapping.filter)
    }
}

impl BridgeConfig for BackupBridgeConfig {
    fn logging(&self) -> &LoggingConfig {
        &self.logging
    }

    fn validate(&self) -> Result<()> {
        if self.mapping.circuits.is_empty() && self.mapping.circuit_groups.is_empty() {
            return Err(BridgeError::validation(
                "mapping needs at least one of circuits or circuit_groups",
            ));
        }

        let serial = &self.serial;

        if serial.port.is_empty() {
            return Err(BridgeError::validation("serial port cannot be empty"));
        }

        if serial.baud_rate == 0 {
            return Err(BridgeError::validation("baud_rate must be positive"));
        }

        if !(1..=247).contains(&serial.unit_id) {
            return Err(BridgeError::validation(format!(
                "unit_id must be 1-247, got {}",
                serial.unit_id
            )));
        }

        match serial.parity.to_lowercase().as_str() {
            "none" | "even" | "odd" => {}
            other => {
                return Err(BridgeError::validation(format!(
                    "invalid parity '{}' (use none, even, or odd)",
                    other
                )));
            }
        }

        if !(5..=8).contains(&serial.data_bits) {
            return Err(BridgeError::validation(format!(
                "data_bits must be 5-8, got {}",
                serial.data_bits
            )));
        }

        if !matches!(serial.stop_bits, 1 | 2) {
            return Err(BridgeError::validation(format!(
                "stop_bits must be 1 or 2, got {}",
                serial.stop_bits
            )));
        }

        if serial.timeout_ms == 0 || serial.response_timeout_ms == 0 {
            return Err(BridgeError::validation("serial timeouts must be positive"));
        }

        let ws = Url::parse(&self.primary.websocket_uri).map_err(|e| {
            BridgeError::validation(format!(
                "invalid websocket_uri '{}': {}",
                self.primary.websocket_uri, e
            ))
        })?;
        if !matches!(ws.scheme(), "ws" | "wss") {
            return Err(BridgeError::validation(format!(
                "websocket_uri must use ws or wss, got '{}'",
                ws.scheme()
            )));
        }

        let api = Url::parse(&self.primary.relay_api).map_err(|e| {
            BridgeError::validation(format!(
                "invalid relay_api '{}': {}",
                self.primary.relay_api, e
            ))
        })?;
        if !matches!(api.scheme(), "http" | "https") {
            return Err(BridgeError::validation(format!(
                "relay_api must use http or https, got '{}'",
                api.scheme()
            )));
        }

        if self.primary.request_timeout_ms == 0 {
            return Err(BridgeError::validation("request_timeout_ms must be positive"));
        }

        self.directory()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let json = r#"{
            serial: { port: "/dev/ttyUSB0", baud_rate: 9600, parity: "even" },
            primary: { websocket_uri: "ws://unipi.local/ws", relay_api: "http://unipi.local/json" },
            mapping: {
                circuits: [ { input: "2_16", index: 16, output: "2_16" } ],
            },
            logging: { level: "debug" },
        }"#;

        let config = BackupBridgeConfig::parse(json).unwrap();

        assert_eq!(config.serial.port, "/dev/ttyUSB0");
        assert_eq!(config.serial.baud_rate, 9600);
        assert_eq!(config.serial.unit_id, 1);
        assert_eq!(config.primary.relay_api, "http://unipi.local/json");
        assert_eq!(config.logging.level, "debug");

        let directory = config.directory().unwrap();
        assert_eq!(directory.relay_for_coil(16), Some("2_16"));
    }

    #[test]
    fn test_defaults() {
        let config = BackupBridgeConfig::parse("{ mapping: { circuit_groups: [4, 30, 30] } }")
            .unwrap();

        assert_eq!(config.serial.port, "/dev/ttyNS0");
        assert_eq!(config.serial.baud_rate, 19200);
        assert_eq!(config.serial.timeout_ms, 5);
        assert_eq!(config.primary.websocket_uri, "ws://localhost/ws");
        assert_eq!(config.primary.relay_api, "http://localhost/json");
        assert_eq!(config.primary.reconnect_delay(), Duration::from_secs(5));
        assert_eq!(config.directory().unwrap().outbound_len(), 64);
    }

    #[test]
    fn test_validate_empty_mapping() {
        let result = BackupBridgeConfig::parse("{ mapping: {} }");
        assert!(matches!(result, Err(BridgeError::ConfigValidation(_))));
    }

    #[test]
    fn test_validate_invalid_parity() {
        let result = BackupBridgeConfig::parse(
            r#"{ serial: { parity: "mark" }, mapping: { circuit_groups: [4] } }"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_unit_id() {
        let result = BackupBridgeConfig::parse(
            r#"{ serial: { unit_id: 0 }, mapping: { circuit_groups: [4] } }"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_urls() {
        let result = BackupBridgeConfig::parse(
            r#"{ primary: { websocket_uri: "http://localhost/ws" }, mapping: { circuit_groups: [4] } }"#,
        );
        assert!(result.is_err());

        let result = BackupBridgeConfig::parse(
            r#"{ primary: { relay_api: "not a url" }, mapping: { circuit_groups: [4] } }"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_integer_fields_reject_lossy_numbers() {
        for serial in [
            "{ unit_id: -1 }",
            "{ unit_id: 300 }",
            "{ baud_rate: 9600.5 }",
            "{ data_bits: 8.2 }",
            "{ stop_bits: -2 }",
            "{ timeout_ms: -5 }",
            "{ response_timeout_ms: 0.5 }",
        ] {
            let content = format!("{{ serial: {}, mapping: {{ circuit_groups: [4] }} }}", serial);
            assert!(
                matches!(
                    BackupBridgeConfig::parse(&content),
                    Err(BridgeError::ConfigParse(_))
                ),
                "{} should be rejected",
                serial
            );
        }

        let result = BackupBridgeConfig::parse(
            "{ primary: { reconnect_delay_secs: -1 }, mapping: { circuit_groups: [4] } }",
        );
        assert!(matches!(result, Err(BridgeError::ConfigParse(_))));
    }

    #[test]
    fn test_read_skips_validation() {
        let config = BackupBridgeConfig::parse_unvalidated(
            r#"{ primary: { websocket_uri: "http://wrong" }, mapping: { circuit_groups: [4] } }"#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_directory_errors() {
        let result = BackupBridgeConfig::parse(
            r#"{ mapping: { circuits: [ { input: "1_1", index: 80 } ] } }"#,
        );
        assert!(matches!(result, Err(BridgeError::ConfigValidation(_))));
    }
}
