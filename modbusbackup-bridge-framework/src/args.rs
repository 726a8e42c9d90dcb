//! CLI argument parsing for bridges.

use std::path::PathBuf;

use clap::Args;

/// Common CLI arguments for all bridge modes.
#[derive(Args, Debug, Clone)]
pub struct BridgeArgs {
    /// Path to configuration file (JSON5 format).
    #[arg(short, long, global = true, default_value = "modbusbackup.json5")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,
}
