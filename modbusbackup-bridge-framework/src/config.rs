//! Configuration traits and utilities.

use std::path::Path;

use serde::de::DeserializeOwned;

use crate::LoggingConfig;
use crate::error::{BridgeError, Result};

/// Trait for bridge configuration types.
///
/// Implement this trait for the bridge configuration struct to get
/// loading, validation, and access to the logging section.
///
/// # Example
///
/// ```ignore
/// use serde::Deserialize;
/// use modbusbackup_bridge_framework::{BridgeConfig, BridgeError, LoggingConfig};
///
/// #[derive(Debug, Deserialize)]
/// pub struct MyBridgeConfig {
///     pub logging: LoggingConfig,
///     pub circuits: Vec<CircuitEntry>,
/// }
///
/// impl BridgeConfig for MyBridgeConfig {
///     fn logging(&self) -> &LoggingConfig {
///         &self.logging
///     }
///
///     fn validate(&self) -> Result<()> {
///         if self.circuits.is_empty() {
///             return Err(BridgeError::validation("At least one circuit required"));
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait BridgeConfig: Sized + DeserializeOwned {
    /// Get the logging configuration.
    fn logging(&self) -> &LoggingConfig;

    /// Validate the configuration.
    ///
    /// Called automatically after loading. Override to add custom validation.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Load and validate configuration from a file path.
    ///
    /// Supports JSON5 format. Calls [`validate`](Self::validate) after loading.
    fn load(path: impl AsRef<Path>) -> Result<Self> {
        let config = Self::read(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Read configuration from a file path without validating it.
    ///
    /// Use this when values are overridden after loading (e.g. from the
    /// command line); call [`validate`](Self::validate) once they are applied.
    fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(BridgeError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path)?;
        Self::parse_unvalidated(&content)
    }

    /// Parse and validate configuration from a JSON5 string.
    fn parse(content: &str) -> Result<Self> {
        let config = Self::parse_unvalidated(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a JSON5 string without validating it.
    fn parse_unvalidated(content: &str) -> Result<Self> {
        Ok(json5::from_str(content)?)
    }
}
