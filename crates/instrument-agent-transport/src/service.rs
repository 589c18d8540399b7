//! Transport-agnostic service seam between a connection and the runtime.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use instrument_agent_core::{
    Action, FeedEvent, Lifecycle, ManagementQuery, ManagementReply, OpReply, OpRequest,
};
use instrument_agent_runtime::{AgentHandle, DispatchError};

use crate::protocol::{ClientMessage, ServerMessage, parse_query};

/// What a transport needs from an agent.
#[async_trait]
pub trait OpService: Send + Sync + 'static {
    /// Run one action against one operation.
    async fn op(&self, op_name: &str, request: OpRequest) -> OpReply;

    /// Answer a management query.
    async fn management(&self, query: ManagementQuery) -> Result<ManagementReply, DispatchError>;

    /// Feed events, history first, optionally for one operation only.
    fn feed(&self, op_name: Option<&str>) -> BoxStream<'static, FeedEvent>;

    /// Hooks driven by connection open/close.
    fn lifecycle(&self) -> Arc<dyn Lifecycle>;

    /// Identity the agent is bound to.
    fn identity(&self) -> String;
}

#[async_trait]
impl OpService for AgentHandle {
    async fn op(&self, op_name: &str, request: OpRequest) -> OpReply {
        Self::op(self, op_name, request).await
    }

    async fn management(&self, query: ManagementQuery) -> Result<ManagementReply, DispatchError> {
        Self::management(self, query).await
    }

    fn feed(&self, op_name: Option<&str>) -> BoxStream<'static, FeedEvent> {
        match op_name {
            Some(op_name) => Self::feed(self).operation_stream(op_name),
            None => Self::feed(self).history_plus_stream(),
        }
    }

    fn lifecycle(&self) -> Arc<dyn Lifecycle> {
        Self::lifecycle(self)
    }

    fn identity(&self) -> String {
        self.endpoints().address().to_string()
    }
}

/// Answer a request-style client message.
///
/// Returns `None` for messages that open a stream rather than produce a
/// reply (`subscribe`).
pub async fn respond<S>(service: &S, msg: ClientMessage) -> Option<ServerMessage>
where
    S: OpService + ?Sized,
{
    match msg {
        ClientMessage::Op {
            id,
            action,
            op_name,
            params,
            timeout,
        } => {
            let action: Action = match action.parse() {
                Ok(action) => action,
                Err(message) => return Some(ServerMessage::error(Some(id), message)),
            };
            let reply = service
                .op(&op_name, OpRequest::from_parts(action, params, timeout))
                .await;
            Some(ServerMessage::OpReply {
                id,
                op_name,
                action,
                reply,
            })
        }
        ClientMessage::Management { id, query, op_name } => {
            let query = match parse_query(&query, op_name) {
                Ok(query) => query,
                Err(message) => return Some(ServerMessage::error(Some(id), message)),
            };
            Some(match service.management(query).await {
                Ok(reply) => ServerMessage::ManagementReply { id, reply },
                Err(e) => ServerMessage::error(Some(id), e.to_string()),
            })
        }
        ClientMessage::Ping => Some(ServerMessage::Pong),
        ClientMessage::Subscribe { .. } => None,
    }
}
