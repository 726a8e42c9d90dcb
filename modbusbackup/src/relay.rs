//! Relay toggling against the primary plane HTTP API.
//!
//! A toggle reads the current relay state, flips it and writes it back:
//!
//! ```text
//! GET  {base}/relay/{name}   -> {"data": {"value": 0}}
//! POST {base}/relay/{name}   <- {"value": "1"}
//! ```
//!
//! State is re-read on every toggle and never cached. There is no retry:
//! a failed read aborts before any write, a failed write is not rolled back.

use crate::config::PrimaryConfig;
use reqwest::StatusCode;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors talking to the relay API.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Relay API returned {status} for {url}")]
    Status { url: String, status: StatusCode },
    #[error("Malformed relay API response: {0}")]
    Body(String),
    #[error("Relay API response has no data.value field")]
    MissingField,
    #[error("Unsupported relay state value: {0}")]
    InvalidState(String),
}

/// Thin client for the relay endpoints.
///
/// Wraps one pooled `reqwest::Client`; clones share the pool.
#[derive(Debug, Clone)]
pub struct RelayClient {
    http: reqwest::Client,
    base: String,
}

impl RelayClient {
    /// Create a client from an existing HTTP client and base URL.
    pub fn new(http: reqwest::Client, base: impl Into<String>) -> Self {
        let base = base.into().trim_end_matches('/').to_string();
        Self { http, base }
    }

    /// Build a pooled client with the configured request timeout.
    pub fn from_config(config: &PrimaryConfig) -> Result<Self, RelayError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!("modbusbackup/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(RelayError::Client)?;

        Ok(Self::new(http, config.relay_api.clone()))
    }

    pub fn relay_url(&self, relay: &str) -> String {
        format!("{}/relay/{}", self.base, relay)
    }

    /// Fetch the current state of a relay.
    pub async fn read_state(&self, relay: &str) -> Result<bool, RelayError> {
        let url = self.relay_url(relay);

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|source| RelayError::Transport {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RelayError::Status { url, status });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| RelayError::Body(e.to_string()))?;

        parse_state(&body)
    }

    /// Set the state of a relay.
    pub async fn write_state(&self, relay: &str, state: bool) -> Result<(), RelayError> {
        let url = self.relay_url(relay);
        let body = json!({ "value": if state { "1" } else { "0" } });

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|source| RelayError::Transport {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RelayError::Status { url, status });
        }

        Ok(())
    }
}

/// Extract `data.value` from a relay state response.
fn parse_state(body: &Value) -> Result<bool, RelayError> {
    match body.pointer("/data/value") {
        None | Some(Value::Null) => Err(RelayError::MissingField),
        Some(Value::Bool(b)) => Ok(*b),
        Some(Value::Number(n)) => match n.as_i64() {
            Some(i) => Ok(i != 0),
            None => Err(RelayError::InvalidState(n.to_string())),
        },
        Some(other) => Err(RelayError::InvalidState(other.to_string())),
    }
}

/// Result of a toggle attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// Relay state was read and the flipped state written.
    Toggled { from: bool, to: bool },
    /// Reading the current state failed; nothing was written.
    ReadFailed,
    /// Reading succeeded but writing the new state failed.
    WriteFailed,
}

/// Read-flip-write sequencer for primary plane relays.
///
/// Toggles of the same relay are serialized so two concurrent triggers cannot
/// both read the same state and lose a toggle. Different relays proceed
/// independently.
#[derive(Debug)]
pub struct ToggleCoordinator {
    client: RelayClient,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ToggleCoordinator {
    pub fn new(client: RelayClient) -> Self {
        Self {
            client,
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn lock_for(&self, relay: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(relay.to_string()).or_default())
    }

    /// Flip a relay once. Failures are logged, never returned as errors.
    pub async fn toggle(&self, relay: &str) -> ToggleOutcome {
        let lock = self.lock_for(relay);
        let _guard = lock.lock().await;

        let current = match self.client.read_state(relay).await {
            Ok(state) => state,
            Err(e) => {
                warn!(relay = %relay, error = %e, "Failed to read relay state, toggle aborted");
                return ToggleOutcome::ReadFailed;
            }
        };

        // Flip the bit from current by XOR
        let toggled = current ^ true;
        debug!(relay = %relay, current, toggled, "Writing toggled relay state");

        if let Err(e) = self.client.write_state(relay, toggled).await {
            warn!(relay = %relay, error = %e, "Failed to write relay state");
            return ToggleOutcome::WriteFailed;
        }

        info!(relay = %relay, from = current, to = toggled, "Relay toggled");
        ToggleOutcome::Toggled {
            from: current,
            to: toggled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_state_numeric() {
        assert!(!parse_state(&json!({"data": {"value": 0}})).unwrap());
        assert!(parse_state(&json!({"data": {"value": 1}})).unwrap());
    }

    #[test]
    fn test_parse_state_bool() {
        assert!(parse_state(&json!({"data": {"value": true}})).unwrap());
    }

    #[test]
    fn test_parse_state_errors() {
        assert!(matches!(
            parse_state(&json!({"data": {}})),
            Err(RelayError::MissingField)
        ));
        assert!(matches!(
            parse_state(&json!({"value": 1})),
            Err(RelayError::MissingField)
        ));
        assert!(matches!(
            parse_state(&json!({"data": {"value": "on"}})),
            Err(RelayError::InvalidState(_))
        ));
        assert!(matches!(
            parse_state(&json!({"data": {"value": 0.5}})),
            Err(RelayError::InvalidState(_))
        ));
    }

    #[test]
    fn test_relay_url_trims_trailing_slash() {
        let client = RelayClient::new(reqwest::Client::new(), "http://localhost/json/");
        assert_eq!(client.relay_url("2_16"), "http://localhost/json/relay/2_16");
    }

    #[test]
    fn test_lock_reused_per_relay() {
        let coordinator =
            ToggleCoordinator::new(RelayClient::new(reqwest::Client::new(), "http://localhost"));

        let a = coordinator.lock_for("2_16");
        let b = coordinator.lock_for("2_16");
        let c = coordinator.lock_for("2_17");

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }
}
