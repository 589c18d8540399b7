//! Dispatch errors.
//!
//! Every variant is recovered inside the runtime and folded into an
//! [`OpReply`]; none crosses the RPC boundary as a fault.

use instrument_agent_core::{Action, OpReply, ResultCode, Snapshot};
use thiserror::Error;

/// Why an action did not succeed.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// Action targets an unregistered name.
    #[error("{}", unknown_text(.action))]
    UnknownOperation { action: Action, op_name: String },

    /// `start` on a name whose live session is not done.
    #[error("already in progress")]
    AlreadyRunning { op_name: String },

    /// `stop` on a task.
    #[error("not stoppable")]
    NotStoppable { op_name: String },

    /// `wait` timer fired before the launcher finished.
    #[error("Operation \"{op_name}\" still running; wait timed out.")]
    Timeout { op_name: String },

    /// Launcher panicked instead of returning an outcome.
    #[error("Launcher failed: {0}")]
    LauncherFailure(String),

    /// Control loop is gone.
    #[error("agent runtime is not running")]
    RuntimeClosed,
}

const fn unknown_text(action: &Action) -> &'static str {
    match action {
        Action::Start | Action::Status => "no such operation",
        Action::Stop => "no such process",
        Action::Wait => "unknown operation",
    }
}

impl DispatchError {
    /// Returns a short stable label (snake_case) for use in logs.
    #[must_use]
    pub const fn as_label(&self) -> &'static str {
        match self {
            Self::UnknownOperation { .. } => "unknown_operation",
            Self::AlreadyRunning { .. } => "already_running",
            Self::NotStoppable { .. } => "not_stoppable",
            Self::Timeout { .. } => "timeout",
            Self::LauncherFailure(_) => "launcher_failure",
            Self::RuntimeClosed => "runtime_closed",
        }
    }

    /// Result code reported to the caller.
    #[must_use]
    pub const fn code(&self) -> ResultCode {
        match self {
            Self::Timeout { .. } => ResultCode::Timeout,
            _ => ResultCode::Error,
        }
    }

    /// Fold into a reply triple.
    #[must_use]
    pub fn into_reply(self, session: Option<Snapshot>) -> OpReply {
        OpReply::new(self.code(), self.to_string(), session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unknown(action: Action) -> DispatchError {
        DispatchError::UnknownOperation {
            action,
            op_name: "missing".into(),
        }
    }

    #[test]
    fn test_messages() {
        assert_eq!(unknown(Action::Start).to_string(), "no such operation");
        assert_eq!(unknown(Action::Status).to_string(), "no such operation");
        assert_eq!(unknown(Action::Stop).to_string(), "no such process");
        assert_eq!(unknown(Action::Wait).to_string(), "unknown operation");
        assert_eq!(
            DispatchError::Timeout { op_name: "slow".into() }.to_string(),
            "Operation \"slow\" still running; wait timed out."
        );
    }

    #[test]
    fn test_codes() {
        let reply = DispatchError::NotStoppable { op_name: "init".into() }.into_reply(None);
        assert_eq!(reply.code, ResultCode::Error);
        assert_eq!(reply.message, "not stoppable");
        assert!(reply.session.is_none());

        let reply = DispatchError::Timeout { op_name: "slow".into() }.into_reply(None);
        assert_eq!(reply.code, ResultCode::Timeout);
        assert_eq!(DispatchError::RuntimeClosed.as_label(), "runtime_closed");
    }
}
