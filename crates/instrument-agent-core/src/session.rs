//! Operation session state machine.

use std::{
    fmt,
    str::FromStr,
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{snapshot::Snapshot, traits::StatusPublisher};

/// Session identifier.
///
/// Unique and strictly increasing across a runtime's lifetime, regardless of
/// operation name.
pub type SessionId = u64;

/// One timestamped log line: `(epoch seconds, text)`.
pub type LogEntry = (f64, String);

/// Current wall clock as epoch seconds.
#[must_use]
pub fn now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Session status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Session created, launcher not yet reporting.
    Starting,
    /// Launcher is doing its work.
    Running,
    /// Launcher is winding down.
    Stopping,
    /// Launcher returned (or faulted). Sets `end_time`.
    Done,
}

impl Status {
    /// Every recognized status, in the intended progression order.
    pub const ALL: [Self; 4] = [Self::Starting, Self::Running, Self::Stopping, Self::Done];

    /// Wire name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Done => "done",
        }
    }

    #[must_use]
    pub const fn is_done(self) -> bool {
        matches!(self, Self::Done)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| SessionError::InvalidStatus(s.to_string()))
    }
}

/// Session error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Invalid session status: {0:?}")]
    InvalidStatus(String),
}

/// One invocation of one operation.
///
/// Mutated only through [`OpSession::set_status`] and
/// [`OpSession::add_message`]; every mutation publishes a full snapshot.
pub struct OpSession {
    session_id: SessionId,
    op_name: String,
    status: Status,
    start_time: f64,
    end_time: Option<f64>,
    messages: Vec<LogEntry>,
    publisher: Arc<dyn StatusPublisher>,
}

impl OpSession {
    /// Create a session in `starting`, logging and publishing that status.
    #[must_use]
    pub fn new(
        session_id: SessionId,
        op_name: impl Into<String>,
        publisher: Arc<dyn StatusPublisher>,
    ) -> Self {
        Self::with_status(session_id, op_name, Status::Starting, true, publisher)
    }

    /// Create a session with an explicit initial status.
    ///
    /// The initial status is applied with the session's `start_time` as its
    /// timestamp.
    #[must_use]
    pub fn with_status(
        session_id: SessionId,
        op_name: impl Into<String>,
        status: Status,
        log_status: bool,
        publisher: Arc<dyn StatusPublisher>,
    ) -> Self {
        let start_time = now();
        let mut session = Self {
            session_id,
            op_name: op_name.into(),
            status,
            start_time,
            end_time: None,
            messages: Vec::new(),
            publisher,
        };
        session.set_status(status, Some(start_time), log_status);
        session
    }

    #[must_use]
    pub const fn session_id(&self) -> SessionId {
        self.session_id
    }

    #[must_use]
    pub fn op_name(&self) -> &str {
        &self.op_name
    }

    #[must_use]
    pub const fn status(&self) -> Status {
        self.status
    }

    #[must_use]
    pub const fn start_time(&self) -> f64 {
        self.start_time
    }

    #[must_use]
    pub const fn end_time(&self) -> Option<f64> {
        self.end_time
    }

    #[must_use]
    pub fn messages(&self) -> &[LogEntry] {
        &self.messages
    }

    /// Apply a status.
    ///
    /// Transition order is not enforced. `done` stamps `end_time`, which is
    /// never cleared afterwards. With `log_status` a
    /// `Status is now "<status>".` line is appended; either way the change
    /// is published exactly once.
    pub fn set_status(&mut self, status: Status, timestamp: Option<f64>, log_status: bool) {
        let timestamp = timestamp.unwrap_or_else(now);
        self.status = status;
        if status.is_done() {
            self.end_time = Some(timestamp);
        }
        tracing::debug!(
            op_name = %self.op_name,
            session_id = self.session_id,
            %status,
            "Session status changed"
        );
        if log_status {
            self.add_message(format!("Status is now \"{status}\"."), Some(timestamp));
        } else {
            self.publish();
        }
    }

    /// Apply a status given by its wire name.
    ///
    /// # Errors
    /// Returns error if `status` is not one of the four recognized names.
    pub fn set_status_str(
        &mut self,
        status: &str,
        timestamp: Option<f64>,
    ) -> Result<(), SessionError> {
        let status = status.parse()?;
        self.set_status(status, timestamp, true);
        Ok(())
    }

    /// Append a message to the log and publish the session.
    pub fn add_message(&mut self, text: impl Into<String>, timestamp: Option<f64>) {
        let timestamp = timestamp.unwrap_or_else(now);
        self.messages.push((timestamp, text.into()));
        self.publish();
    }

    /// Encode the session.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            session_id: self.session_id,
            op_name: self.op_name.clone(),
            status: self.status,
            start_time: self.start_time,
            end_time: self.end_time,
            messages: self.messages.clone(),
        }
    }

    fn publish(&self) {
        self.publisher.publish_status(self.snapshot());
    }
}

impl fmt::Debug for OpSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpSession")
            .field("session_id", &self.session_id)
            .field("op_name", &self.op_name)
            .field("status", &self.status)
            .field("start_time", &self.start_time)
            .field("end_time", &self.end_time)
            .field("messages", &self.messages.len())
            .finish_non_exhaustive()
    }
}
