//! Primary plane events to backup bus coil writes.

use crate::coil::CoilWriter;
use futures_util::{Stream, StreamExt};
use modbusbackup_common::{CircuitDirectory, EdgeFilter, FilterStats, Verdict, decode_event};
use std::sync::Arc;
use std::time::Duration;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, info, trace, warn};

/// Subscriber that mirrors rising edges from the primary event bus onto coils.
///
/// Messages are processed one at a time, in arrival order; the next message
/// is not received before the current coil write has completed.
pub struct InboundAdapter<W> {
    directory: Arc<CircuitDirectory>,
    filter: EdgeFilter,
    writer: W,
    stats: Arc<FilterStats>,
}

impl<W: CoilWriter> InboundAdapter<W> {
    pub fn new(
        directory: Arc<CircuitDirectory>,
        filter: EdgeFilter,
        writer: W,
        stats: Arc<FilterStats>,
    ) -> Self {
        Self {
            directory,
            filter,
            writer,
            stats,
        }
    }

    /// Process one event bus payload.
    ///
    /// Returns the coil address written, or `None` when nothing was written.
    pub async fn handle_message(&mut self, payload: &str) -> Option<u16> {
        let event = match decode_event(payload) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, payload = %payload, "Dropping undecodable message");
                return None;
            }
        };

        let verdict = self.filter.classify(&event);
        if verdict != Verdict::Accept {
            self.stats.record_filtered();
            trace!(circuit = %event.circuit, dev = %event.device_kind, ?verdict, "Event filtered");
            return None;
        }
        self.stats.record_passed();

        info!(circuit = %event.circuit, dev = %event.device_kind, "Incoming rising edge");

        let Some(address) = self.directory.coil_for_circuit(&event.circuit) else {
            debug!(circuit = %event.circuit, "Could not find mapping address");
            return None;
        };

        info!(
            circuit = %event.circuit,
            address,
            value = event.value,
            "Writing coil"
        );

        match self.writer.write_coil(address, event.value).await {
            Ok(()) => Some(address),
            Err(e) => {
                warn!(circuit = %event.circuit, address, error = %e, "Coil write failed");
                None
            }
        }
    }

    /// Consume messages from an event stream until it closes.
    pub async fn process_stream<S>(&mut self, mut stream: S) -> Result<(), WsError>
    where
        S: Stream<Item = Result<Message, WsError>> + Unpin,
    {
        while let Some(message) = stream.next().await {
            match message? {
                Message::Text(text) => {
                    self.handle_message(text.as_str()).await;
                }
                Message::Binary(data) => match std::str::from_utf8(&data) {
                    Ok(text) => {
                        self.handle_message(text).await;
                    }
                    Err(e) => warn!(error = %e, "Dropping non UTF-8 binary message"),
                },
                Message::Close(frame) => {
                    debug!(?frame, "Event stream closed by peer");
                    break;
                }
                _ => {}
            }
        }

        Ok(())
    }

    /// Run the subscriber loop, reconnecting after the stream ends or fails.
    pub async fn run(mut self, uri: String, reconnect_delay: Duration) {
        loop {
            info!(uri = %uri, "Connecting to event bus");

            match connect_async(uri.as_str()).await {
                Ok((stream, _response)) => {
                    info!(uri = %uri, "Connected to event bus");
                    if let Err(e) = self.process_stream(stream).await {
                        warn!(uri = %uri, error = %e, "Event stream failed");
                    } else {
                        info!(uri = %uri, "Event stream ended");
                    }
                }
                Err(e) => {
                    warn!(uri = %uri, error = %e, "Failed to connect to event bus");
                }
            }

            tokio::time::sleep(reconnect_delay).await;
        }
    }
}
