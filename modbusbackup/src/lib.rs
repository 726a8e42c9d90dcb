//! Modbus RTU backup bridge for relay circuits.
//!
//! Keeps a primary home-automation plane (WebSocket events + HTTP relay API)
//! and a backup Modbus RTU bus in step:
//!
//! - `client` mode: rising edges from the primary event bus become coil
//!   writes on the backup bus ([`inbound`]).
//! - `server` mode: coil writes received on the backup bus toggle the mapped
//!   relay through the primary relay API ([`outbound`], [`store`]).
//!
//! # Relay API
//!
//! ```text
//! GET  {relay_api}/relay/<name>
//! POST {relay_api}/relay/<name>   {"value": "0" | "1"}
//! ```

pub mod coil;
pub mod config;
pub mod inbound;
pub mod outbound;
pub mod relay;
pub mod serial;
pub mod store;
