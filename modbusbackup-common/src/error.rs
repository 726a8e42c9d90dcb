use thiserror::Error;

/// Common error type for modbusbackup components.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid circuit directory: {0}")]
    Directory(String),
}

/// Result type alias using modbusbackup's Error.
pub type Result<T> = std::result::Result<T, Error>;
