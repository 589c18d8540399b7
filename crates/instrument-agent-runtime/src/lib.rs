//! Control loop and session orchestration for instrument agents.
//!
//! Provides:
//! - `AgentRuntime` / `AgentHandle` - register operations, then dispatch
//!   start/stop/wait/status against them
//! - `SessionStore` - one live session per operation, plus an archive
//! - `ConnectionTracker` - lifecycle hooks and idle shutdown
//! - `AgentConfig` - defaults, JSON and environment overlay

mod bridge;
pub mod config;
mod control;
mod dispatcher;
pub mod error;
pub mod lifecycle;
pub mod runtime;
pub mod store;

pub use bridge::LauncherFailure;
pub use config::{AgentConfig, ConfigError};
pub use error::DispatchError;
pub use lifecycle::ConnectionTracker;
pub use runtime::{AgentHandle, AgentRuntime};
pub use store::{LiveSession, SessionStore};
