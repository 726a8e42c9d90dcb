//! modbusbackup bridge framework
//!
//! Common lifecycle handling for the bridge run modes.
//!
//! # Overview
//!
//! This framework provides:
//! - [`BridgeConfig`] trait for configuration loading and validation
//! - [`BridgeRunner`] for managing bridge lifecycle (startup, shutdown, signal handling)
//! - [`BridgeArgs`] for common CLI argument parsing
//!
//! # Example
//!
//! ```ignore
//! use modbusbackup_bridge_framework::{BridgeArgs, BridgeConfig, BridgeRunner};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = MyBridgeConfig::load(&args.config)?;
//!
//!     let mut runner = BridgeRunner::new_with_args("server", config, Some(&args))?;
//!     runner.spawn(my_worker());
//!
//!     // Run until Ctrl+C or SIGTERM
//!     runner.run().await
//! }
//! ```

mod args;
mod config;
mod error;
mod runner;

pub use args::BridgeArgs;
pub use config::BridgeConfig;
pub use error::{BridgeError, Result};
pub use runner::BridgeRunner;

// Re-export commonly used types from modbusbackup-common
pub use modbusbackup_common::{FilterStats, FilterStatsSnapshot, LogFormat, LoggingConfig};
