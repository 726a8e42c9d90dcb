//! Backup bus register block served as a Modbus RTU slave.
//!
//! A single 64-entry block backs coils, discrete inputs, holding registers
//! and input registers. Writes are committed first and then handed to a
//! [`WriteObserver`]; the Modbus response is sent once the observer returns,
//! whatever it did.
//!
//! Notifications use one-based store addresses: a write to wire address `a`
//! is reported at address `a + 1`.

use modbusbackup_common::REGISTER_COUNT;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio_modbus::server::Service;
use tokio_modbus::server::rtu::Server;
use tokio_modbus::{ExceptionCode, Request, Response, SlaveRequest};
use tokio_serial::SerialStream;
use tracing::{debug, info};

/// Access outside the register block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Range {address}+{count} is outside the register block")]
pub struct OutOfRange {
    pub address: u16,
    pub count: usize,
}

/// A committed write, reported to the observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteNotification {
    /// One-based store address of the first written entry.
    pub address: u16,
    /// Written values; coils are stored as 0/1.
    pub values: Vec<u16>,
}

impl WriteNotification {
    /// Level of the first written value.
    pub fn trigger(&self) -> bool {
        self.values.first().is_some_and(|v| *v != 0)
    }
}

/// Observer invoked after each committed write.
pub trait WriteObserver: Send + Sync + 'static {
    fn on_write(&self, notification: WriteNotification) -> impl Future<Output = ()> + Send;
}

/// In-memory register block.
#[derive(Debug)]
pub struct RegisterStore {
    words: Mutex<Vec<u16>>,
}

impl Default for RegisterStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterStore {
    /// Create the block with each entry initialised to its own index.
    pub fn new() -> Self {
        Self {
            words: Mutex::new((0..REGISTER_COUNT).collect()),
        }
    }

    fn range(address: u16, count: usize) -> Result<std::ops::Range<usize>, OutOfRange> {
        let start = address as usize;
        let end = start + count;
        if count == 0 || end > REGISTER_COUNT as usize {
            return Err(OutOfRange { address, count });
        }
        Ok(start..end)
    }

    pub fn read_words(&self, address: u16, count: u16) -> Result<Vec<u16>, OutOfRange> {
        let range = Self::range(address, count as usize)?;
        let words = self.words.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(words[range].to_vec())
    }

    pub fn read_bits(&self, address: u16, count: u16) -> Result<Vec<bool>, OutOfRange> {
        Ok(self
            .read_words(address, count)?
            .into_iter()
            .map(|w| w != 0)
            .collect())
    }

    pub fn write_words(
        &self,
        address: u16,
        values: &[u16],
    ) -> Result<WriteNotification, OutOfRange> {
        let range = Self::range(address, values.len())?;
        let mut words = self.words.lock().unwrap_or_else(PoisonError::into_inner);
        words[range].copy_from_slice(values);

        Ok(WriteNotification {
            address: address + 1,
            values: values.to_vec(),
        })
    }

    pub fn write_bits(
        &self,
        address: u16,
        values: &[bool],
    ) -> Result<WriteNotification, OutOfRange> {
        let words: Vec<u16> = values.iter().map(|b| u16::from(*b)).collect();
        self.write_words(address, &words)
    }
}

/// Modbus service answering from a [`RegisterStore`].
#[derive(Debug)]
pub struct RegisterService<O> {
    store: Arc<RegisterStore>,
    observer: Arc<O>,
}

impl<O> Clone for RegisterService<O> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            observer: Arc::clone(&self.observer),
        }
    }
}

impl<O: WriteObserver> RegisterService<O> {
    pub fn new(store: Arc<RegisterStore>, observer: Arc<O>) -> Self {
        Self { store, observer }
    }

    /// Commit a write, then let the observer act on it.
    async fn notify(
        &self,
        committed: Result<WriteNotification, OutOfRange>,
    ) -> Result<(), ExceptionCode> {
        let notification = committed.map_err(|e| {
            debug!(error = %e, "Rejected write");
            ExceptionCode::IllegalDataAddress
        })?;

        info!(
            address = notification.address,
            values = ?notification.values,
            "Register write"
        );
        self.observer.on_write(notification).await;
        Ok(())
    }

    /// Handle one request against the register block.
    pub async fn handle(&self, request: Request<'static>) -> Result<Response, ExceptionCode> {
        let illegal = |e: OutOfRange| {
            debug!(error = %e, "Rejected read");
            ExceptionCode::IllegalDataAddress
        };

        match request {
            Request::ReadCoils(address, count) => self
                .store
                .read_bits(address, count)
                .map(Response::ReadCoils)
                .map_err(illegal),
            Request::ReadDiscreteInputs(address, count) => self
                .store
                .read_bits(address, count)
                .map(Response::ReadDiscreteInputs)
                .map_err(illegal),
            Request::ReadHoldingRegisters(address, count) => self
                .store
                .read_words(address, count)
                .map(Response::ReadHoldingRegisters)
                .map_err(illegal),
            Request::ReadInputRegisters(address, count) => self
                .store
                .read_words(address, count)
                .map(Response::ReadInputRegisters)
                .map_err(illegal),
            Request::WriteSingleCoil(address, coil) => {
                self.notify(self.store.write_bits(address, &[coil])).await?;
                Ok(Response::WriteSingleCoil(address, coil))
            }
            Request::WriteMultipleCoils(address, coils) => {
                self.notify(self.store.write_bits(address, &coils)).await?;
                Ok(Response::WriteMultipleCoils(address, coils.len() as u16))
            }
            Request::WriteSingleRegister(address, word) => {
                self.notify(self.store.write_words(address, &[word])).await?;
                Ok(Response::WriteSingleRegister(address, word))
            }
            Request::WriteMultipleRegisters(address, words) => {
                self.notify(self.store.write_words(address, &words)).await?;
                Ok(Response::WriteMultipleRegisters(address, words.len() as u16))
            }
            other => {
                debug!(request = ?other, "Unsupported function");
                Err(ExceptionCode::IllegalFunction)
            }
        }
    }
}

impl<O: WriteObserver> Service for RegisterService<O> {
    type Request = SlaveRequest<'static>;
    type Response = Response;
    type Exception = ExceptionCode;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Exception>> + Send>>;

    fn call(&self, req: Self::Request) -> Self::Future {
        let service = self.clone();
        Box::pin(async move { service.handle(req.request).await })
    }
}

/// Serve the register block on an open serial stream until the stream fails.
pub async fn serve<O: WriteObserver>(
    stream: SerialStream,
    service: RegisterService<O>,
) -> std::io::Result<()> {
    Server::new(stream).serve_forever(service).await
}
