//! Worker-side session handle.

use std::{fmt, sync::Arc};

use crate::{
    session::{SessionError, SessionId, Status},
    traits::UpdateSink,
};

/// Mutation requested by a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Update {
    Status(Status),
    Message(String),
}

/// An [`Update`] addressed to one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUpdate {
    pub session_id: SessionId,
    pub op_name: String,
    pub update: Update,
}

/// Handle given to a launcher for reporting progress.
///
/// Posts never touch the session directly: they are queued to the control
/// loop and return immediately. Posts from one thread are applied in the
/// order they were made.
#[derive(Clone)]
pub struct SessionHandle {
    session_id: SessionId,
    op_name: Arc<str>,
    sink: Arc<dyn UpdateSink>,
}

impl SessionHandle {
    #[must_use]
    pub fn new(session_id: SessionId, op_name: &str, sink: Arc<dyn UpdateSink>) -> Self {
        Self {
            session_id,
            op_name: Arc::from(op_name),
            sink,
        }
    }

    #[must_use]
    pub const fn session_id(&self) -> SessionId {
        self.session_id
    }

    #[must_use]
    pub fn op_name(&self) -> &str {
        &self.op_name
    }

    /// Queue a status change.
    pub fn post_status(&self, status: Status) {
        self.post(Update::Status(status));
    }

    /// Queue a status change given by its wire name.
    ///
    /// # Errors
    /// Returns error (and queues nothing) if the name is not recognized.
    pub fn post_status_str(&self, status: &str) -> Result<(), SessionError> {
        self.post_status(status.parse()?);
        Ok(())
    }

    /// Queue a log message.
    pub fn post_message(&self, text: impl Into<String>) {
        self.post(Update::Message(text.into()));
    }

    fn post(&self, update: Update) {
        self.sink.post(SessionUpdate {
            session_id: self.session_id,
            op_name: self.op_name.to_string(),
            update,
        });
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("session_id", &self.session_id)
            .field("op_name", &self.op_name)
            .finish_non_exhaustive()
    }
}
