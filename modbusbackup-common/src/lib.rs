//! modbusbackup common library
//!
//! Shared building blocks for both directions of the modbus backup bridge:
//!
//! - [`circuit`] - Circuit directory (`CircuitDirectory`, `CircuitEntry`)
//! - [`event`] - Primary event bus payloads (`DigitalEvent`, `DeviceKind`)
//! - [`edge`] - Rising edge filter and event counters
//! - [`config`] - Configuration loading (JSON5 format)
//! - [`error`] - Error types

pub mod circuit;
pub mod config;
pub mod edge;
pub mod error;
pub mod event;

// Re-export commonly used types at the crate root
pub use circuit::{
    CircuitDirectory, CircuitEntry, REGISTER_COUNT, generate_layout, index_for_store_address,
};
pub use config::{
    LogFormat, LoggingConfig, MappingConfig, load_config, parse_config, whole_number, whole_numbers,
};
pub use edge::{EdgeFilter, FilterConfig, FilterStats, FilterStatsSnapshot, Verdict};
pub use error::{Error, Result};
pub use event::{DecodeError, DeviceKind, DigitalEvent, decode_event};

/// Initialize tracing with the given configuration.
///
/// Supports two output formats:
/// - `LogFormat::Text` (default): Human-readable text format
/// - `LogFormat::Json`: Structured JSON format for log aggregation systems
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format {
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_thread_names(true))
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(fmt::layer().json())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
    }

    Ok(())
}
