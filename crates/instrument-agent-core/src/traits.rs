//! Core traits for publishing, operation bodies and transport lifecycle.

use serde::{Deserialize, Serialize};

use crate::{OpParams, SessionHandle, SessionUpdate, Snapshot};

/// Result of a launcher or stopper: a success flag plus human-readable text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub ok: bool,
    pub message: String,
}

impl Outcome {
    #[must_use]
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
        }
    }
}

impl<S: Into<String>> From<(bool, S)> for Outcome {
    fn from((ok, message): (bool, S)) -> Self {
        Self {
            ok,
            message: message.into(),
        }
    }
}

/// Receives a full session snapshot on every status change or message append.
pub trait StatusPublisher: Send + Sync {
    fn publish_status(&self, snapshot: Snapshot);
}

/// Destination for updates posted from worker threads.
///
/// Implementations must be non-blocking and preserve the order of posts made
/// by a single thread.
pub trait UpdateSink: Send + Sync {
    fn post(&self, update: SessionUpdate);
}

impl UpdateSink for tokio::sync::mpsc::UnboundedSender<SessionUpdate> {
    fn post(&self, update: SessionUpdate) {
        let _ = self.send(update);
    }
}

/// Body of a task or process.
///
/// Runs on a worker thread and may block freely. Progress goes through the
/// [`SessionHandle`]; the returned outcome becomes the session's final message.
pub trait Launcher: Send + Sync + 'static {
    fn launch(&self, session: SessionHandle, params: OpParams) -> Outcome;
}

impl<F> Launcher for F
where
    F: Fn(SessionHandle, OpParams) -> Outcome + Send + Sync + 'static,
{
    fn launch(&self, session: SessionHandle, params: OpParams) -> Outcome {
        self(session, params)
    }
}

/// Stop request for a running process.
///
/// Advisory: it should make the launcher exit on its own (e.g. by setting a
/// flag the launcher polls). Runs on a worker thread.
pub trait Stopper: Send + Sync + 'static {
    fn stop(&self, params: OpParams) -> Outcome;
}

impl<F> Stopper for F
where
    F: Fn(OpParams) -> Outcome + Send + Sync + 'static,
{
    fn stop(&self, params: OpParams) -> Outcome {
        self(params)
    }
}

/// Hooks driven by the external messaging transport.
///
/// The runtime never depends on a concrete transport; whoever owns the
/// connection calls these.
pub trait Lifecycle: Send + Sync {
    /// Transport connected.
    fn on_connect(&self);

    /// Messaging session joined under `identity`.
    fn on_join(&self, identity: &str);

    /// Messaging session left.
    fn on_leave(&self, reason: &str);

    /// Transport disconnected.
    fn on_disconnect(&self);
}
