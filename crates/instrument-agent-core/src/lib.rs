//! Core abstractions for instrument-control agents.
//!
//! This crate provides the fundamental building blocks:
//! - `OpSession` - Per-invocation state machine with an ordered message log
//! - `Snapshot` - Wire encoding of a session
//! - `OperationRegistry` - Task and process descriptors keyed by name
//! - `SessionHandle` - Worker-side marshal for status and message posts
//! - `Feed` - Broadcast + history status publisher
//! - `JobLock` - Opt-in mutual exclusion across operations
//! - Publisher, launcher and lifecycle traits

pub mod endpoints;
pub mod feed;
pub mod handle;
pub mod job_lock;
pub mod params;
pub mod registry;
pub mod request;
pub mod session;
pub mod snapshot;
pub mod traits;

pub use endpoints::Endpoints;
pub use feed::{Feed, FeedEvent};
pub use handle::{SessionHandle, SessionUpdate, Update};
pub use job_lock::{JobConflict, JobGuard, JobLock};
pub use params::OpParams;
pub use registry::{OperationDescriptor, OperationKind, OperationRegistry};
pub use request::{
    Action, ManagementQuery, ManagementReply, OpReply, OpRequest, ResultCode, WaitTimeout,
};
pub use session::{OpSession, SessionError, SessionId, Status};
pub use snapshot::{OpSummary, Snapshot};
pub use traits::{Launcher, Lifecycle, Outcome, StatusPublisher, Stopper, UpdateSink};
