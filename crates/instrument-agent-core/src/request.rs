//! Typed requests and replies of the RPC surface.

use std::{fmt, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{OpParams, OpSummary, Snapshot, snapshot};

/// Operation action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Start,
    Stop,
    Wait,
    Status,
}

impl Action {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Wait => "wait",
            Self::Status => "status",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(Self::Start),
            "stop" => Ok(Self::Stop),
            "wait" => Ok(Self::Wait),
            "status" => Ok(Self::Status),
            other => Err(format!("Unknown action: {other}")),
        }
    }
}

/// How long `wait` may suspend the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitTimeout {
    /// Answer immediately.
    Poll,
    /// Suspend until the launcher finishes.
    #[default]
    Unbounded,
    /// Race completion against a timer.
    For(Duration),
}

impl WaitTimeout {
    /// Interpret a wire timeout in seconds (`None` = unbounded).
    ///
    /// Zero, negative and non-finite values poll. A limit too large for
    /// [`Duration`] waits without bound.
    #[must_use]
    pub fn from_secs(secs: Option<f64>) -> Self {
        match secs {
            None => Self::Unbounded,
            Some(s) if s.is_finite() && s > 0.0 => {
                Duration::try_from_secs_f64(s).map_or(Self::Unbounded, Self::For)
            }
            Some(_) => Self::Poll,
        }
    }
}

/// One action against one operation.
#[derive(Debug, Clone, PartialEq)]
pub enum OpRequest {
    Start { params: OpParams },
    Stop { params: OpParams },
    Wait { timeout: WaitTimeout },
    Status,
}

impl OpRequest {
    /// Build a request from loose wire fields. Params are ignored by
    /// `wait`/`status`, the timeout by everything but `wait`.
    #[must_use]
    pub fn from_parts(action: Action, params: Option<OpParams>, timeout: Option<f64>) -> Self {
        match action {
            Action::Start => Self::Start {
                params: params.unwrap_or_default(),
            },
            Action::Stop => Self::Stop {
                params: params.unwrap_or_default(),
            },
            Action::Wait => Self::Wait {
                timeout: WaitTimeout::from_secs(timeout),
            },
            Action::Status => Self::Status,
        }
    }

    #[must_use]
    pub const fn action(&self) -> Action {
        match self {
            Self::Start { .. } => Action::Start,
            Self::Stop { .. } => Action::Stop,
            Self::Wait { .. } => Action::Wait,
            Self::Status => Action::Status,
        }
    }
}

/// Result code of an operation reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResultCode {
    Ok,
    Error,
    Timeout,
}

/// `(code, message, snapshot)` triple returned by every action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpReply {
    pub code: ResultCode,
    pub message: String,
    /// Encoded as `{}` when absent.
    #[serde(with = "snapshot::or_empty")]
    pub session: Option<Snapshot>,
}

impl OpReply {
    #[must_use]
    pub fn new(code: ResultCode, message: impl Into<String>, session: Option<Snapshot>) -> Self {
        Self {
            code,
            message: message.into(),
            session,
        }
    }

    #[must_use]
    pub fn ok(message: impl Into<String>, session: Option<Snapshot>) -> Self {
        Self::new(ResultCode::Ok, message, session)
    }

    #[must_use]
    pub fn error(message: impl Into<String>, session: Option<Snapshot>) -> Self {
        Self::new(ResultCode::Error, message, session)
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.code == ResultCode::Ok
    }
}

/// Management query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManagementQuery {
    GetTasks,
    GetProcesses,
    GetHistory { op_name: String },
}

/// Management reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManagementReply {
    /// `(op_name, snapshot or placeholder)`, sorted by name.
    Listing(Vec<(String, OpSummary)>),
    /// Archived sessions, oldest first.
    History(Vec<Snapshot>),
}
