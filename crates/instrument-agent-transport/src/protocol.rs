//! Wire protocol for client-server communication.

use instrument_agent_core::{
    Action, FeedEvent, ManagementQuery, ManagementReply, OpParams, OpReply,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

fn new_request_id() -> String {
    Uuid::new_v4().to_string()
}

/// Message from client to server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Run an action against one operation.
    Op {
        #[serde(default = "new_request_id")]
        id: String,
        action: String,
        op_name: String,
        #[serde(default)]
        params: Option<OpParams>,
        /// Seconds; absent waits without bound, zero or negative polls.
        #[serde(default)]
        timeout: Option<f64>,
    },
    /// Task/process listing or history.
    Management {
        #[serde(default = "new_request_id")]
        id: String,
        query: String,
        #[serde(default)]
        op_name: Option<String>,
    },
    /// Stream feed events, history first.
    Subscribe {
        #[serde(default)]
        op_name: Option<String>,
    },
    /// Ping for keepalive.
    Ping,
}

impl ClientMessage {
    /// Create an op request with a fresh id.
    #[must_use]
    pub fn op(action: Action, op_name: impl Into<String>) -> Self {
        Self::Op {
            id: new_request_id(),
            action: action.to_string(),
            op_name: op_name.into(),
            params: None,
            timeout: None,
        }
    }
}

/// Resolve a management query from its wire name.
///
/// # Errors
/// Returns error if the name is unknown or `get_history` lacks an operation.
pub fn parse_query(query: &str, op_name: Option<String>) -> Result<ManagementQuery, String> {
    match (query, op_name) {
        ("get_tasks", _) => Ok(ManagementQuery::GetTasks),
        ("get_processes", _) => Ok(ManagementQuery::GetProcesses),
        ("get_history", Some(op_name)) => Ok(ManagementQuery::GetHistory { op_name }),
        ("get_history", None) => Err("get_history requires op_name".to_string()),
        (other, _) => Err(format!("Unknown query: {other}")),
    }
}

/// Message from server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Answer to an op request.
    OpReply {
        id: String,
        op_name: String,
        action: Action,
        reply: OpReply,
    },
    /// Answer to a management request.
    ManagementReply { id: String, reply: ManagementReply },
    /// Session snapshot published on the feed.
    Feed { event: FeedEvent },
    /// Error message.
    Error {
        #[serde(default)]
        id: Option<String>,
        message: String,
    },
    /// Pong response.
    Pong,
}

impl ServerMessage {
    #[must_use]
    pub fn error(id: Option<String>, message: impl Into<String>) -> Self {
        Self::Error {
            id,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use instrument_agent_core::ResultCode;
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    use super::*;

    #[test]
    fn test_op_request_parsing() {
        let msg: ClientMessage = serde_json::from_value(json!({
            "type": "op",
            "id": "r1",
            "action": "wait",
            "op_name": "acq",
            "timeout": 2.5
        }))
        .unwrap();

        match msg {
            ClientMessage::Op {
                id,
                action,
                op_name,
                params,
                timeout,
            } => {
                assert_eq!(id, "r1");
                assert_eq!(action, "wait");
                assert_eq!(op_name, "acq");
                assert!(params.is_none());
                assert_eq!(timeout, Some(2.5));
            }
            other => panic!("Wrong message type: {other:?}"),
        }
    }

    #[test]
    fn test_missing_id_is_generated() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type": "management", "query": "get_tasks"}"#).unwrap();
        let ClientMessage::Management { id, .. } = msg else {
            panic!("Wrong message type");
        };
        assert_ok!(Uuid::parse_str(&id));
    }

    #[test]
    fn test_parse_query() {
        assert_eq!(parse_query("get_tasks", None), Ok(ManagementQuery::GetTasks));
        assert_eq!(
            parse_query("get_history", Some("acq".into())),
            Ok(ManagementQuery::GetHistory { op_name: "acq".into() })
        );
        assert_err!(parse_query("get_history", None));
        assert_eq!(
            assert_err!(parse_query("get_everything", None)),
            "Unknown query: get_everything"
        );
    }

    #[test]
    fn test_server_message_shape() {
        let msg = ServerMessage::OpReply {
            id: "r1".into(),
            op_name: "missing".into(),
            action: Action::Start,
            reply: OpReply::error("no such operation", None),
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "op_reply",
                "id": "r1",
                "op_name": "missing",
                "action": "start",
                "reply": {"code": "ERROR", "message": "no such operation", "session": {}}
            })
        );

        let parsed: ServerMessage = serde_json::from_value(value).unwrap();
        let ServerMessage::OpReply { reply, .. } = parsed else {
            panic!("Wrong message type");
        };
        assert_eq!(reply.code, ResultCode::Error);
    }

    #[test]
    fn test_op_constructor() {
        let ClientMessage::Op { id, action, .. } = ClientMessage::op(Action::Status, "acq") else {
            panic!("Wrong message type");
        };
        assert_eq!(action, "status");
        assert_ok!(Uuid::parse_str(&id));
    }

    #[test]
    fn test_ping_pong() {
        let ping: ClientMessage = serde_json::from_str(r#"{"type": "ping"}"#).unwrap();
        assert_eq!(ping, ClientMessage::Ping);
        assert_eq!(serde_json::to_string(&ServerMessage::Pong).unwrap(), r#"{"type":"pong"}"#);
    }
}
