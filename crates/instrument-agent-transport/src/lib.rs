//! Transport layer for instrument agents.
//!
//! Provides:
//! - Wire protocol (JSON)
//! - `OpService` seam between a connection and the runtime
//! - WebSocket transport (feature: websocket)

pub mod error;
pub mod protocol;
pub mod service;

#[cfg(feature = "websocket")]
pub mod websocket;

pub use error::TransportError;
pub use protocol::{ClientMessage, ServerMessage};
pub use service::{OpService, respond};
