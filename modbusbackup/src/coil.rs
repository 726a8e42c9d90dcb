//! Coil writes on the backup bus (Modbus RTU master side).

use crate::config::SerialConfig;
use crate::serial;
use std::future::Future;
use thiserror::Error;
use tokio_modbus::client::{Context, Writer};
use tokio_modbus::prelude::*;
use tokio_serial::SerialStream;
use tracing::{debug, info};

/// Error type for coil writes.
#[derive(Debug, Error)]
pub enum CoilWriteError {
    #[error("Connection failed: {0}")]
    Connection(String),
    #[error("Write failed: {0}")]
    Transport(String),
    #[error("Device answered with exception: {0}")]
    Exception(String),
    #[error("No response within {0} ms")]
    Timeout(u64),
}

/// Something that can set a single coil on the backup bus.
pub trait CoilWriter: Send {
    fn write_coil(
        &mut self,
        address: u16,
        value: bool,
    ) -> impl Future<Output = Result<(), CoilWriteError>> + Send;
}

type Opener = Box<dyn FnMut() -> tokio_serial::Result<SerialStream> + Send>;

/// RTU master over the configured serial port.
///
/// The port is opened lazily and kept open across writes. A transport
/// failure or timeout drops the connection; the next write reopens it.
pub struct RtuCoilWriter {
    config: SerialConfig,
    open: Opener,
    ctx: Option<Context>,
}

impl RtuCoilWriter {
    pub fn new(config: SerialConfig) -> Self {
        let port = config.clone();
        Self::with_opener(config, move || serial::open(&port))
    }

    /// Use `open` instead of the configured port whenever a connection is needed.
    pub fn with_opener<F>(config: SerialConfig, open: F) -> Self
    where
        F: FnMut() -> tokio_serial::Result<SerialStream> + Send + 'static,
    {
        Self {
            config,
            open: Box::new(open),
            ctx: None,
        }
    }

    fn connect(&mut self) -> Result<Context, CoilWriteError> {
        let stream = (self.open)()
            .map_err(|e| CoilWriteError::Connection(format!("Serial open failed: {}", e)))?;

        info!(
            port = %self.config.port,
            baud_rate = self.config.baud_rate,
            unit_id = self.config.unit_id,
            "Opened backup bus"
        );

        Ok(rtu::attach_slave(stream, Slave(self.config.unit_id)))
    }
}

impl CoilWriter for RtuCoilWriter {
    async fn write_coil(&mut self, address: u16, value: bool) -> Result<(), CoilWriteError> {
        let mut ctx = match self.ctx.take() {
            Some(ctx) => ctx,
            None => self.connect()?,
        };

        let result = tokio::time::timeout(
            self.config.response_timeout(),
            ctx.write_single_coil(address, value),
        )
        .await;

        match result {
            Err(_) => {
                debug!(port = %self.config.port, "Dropping backup bus connection after timeout");
                Err(CoilWriteError::Timeout(self.config.response_timeout_ms))
            }
            Ok(Err(e)) => {
                debug!(port = %self.config.port, "Dropping backup bus connection after error");
                Err(CoilWriteError::Transport(e.to_string()))
            }
            Ok(Ok(Err(exception))) => {
                self.ctx = Some(ctx);
                Err(CoilWriteError::Exception(format!("{:?}", exception)))
            }
            Ok(Ok(Ok(()))) => {
                self.ctx = Some(ctx);
                Ok(())
            }
        }
    }
}
