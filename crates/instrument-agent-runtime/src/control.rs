//! Control loop: the single writer of all session state.

use instrument_agent_core::{
    OpReply, OpRequest, OpSummary, OperationKind, Outcome, SessionId, SessionUpdate, Snapshot,
};
use tokio::sync::{mpsc, oneshot};

use crate::{bridge::LauncherFailure, dispatcher::Dispatcher};

/// Everything the control loop reacts to.
pub(crate) enum ControlMsg {
    /// RPC action from a caller.
    Op {
        op_name: String,
        request: OpRequest,
        reply: oneshot::Sender<OpReply>,
    },
    /// Task or process listing.
    Listing {
        kind: OperationKind,
        reply: oneshot::Sender<Vec<(String, OpSummary)>>,
    },
    /// Archived sessions of one operation.
    History {
        op_name: String,
        reply: oneshot::Sender<Vec<Snapshot>>,
    },
    /// Worker post.
    Update(SessionUpdate),
    /// Launcher returned or faulted.
    Completed {
        op_name: String,
        session_id: SessionId,
        result: Result<Outcome, LauncherFailure>,
    },
    /// Wait racer finished.
    WaitSettled {
        op_name: String,
        session_id: SessionId,
        timed_out: bool,
        reply: oneshot::Sender<OpReply>,
    },
    Shutdown,
}

/// Drain the control queue until asked to shut down.
pub(crate) async fn run(mut dispatcher: Dispatcher, mut rx: mpsc::UnboundedReceiver<ControlMsg>) {
    tracing::info!(topic = dispatcher.topic(), "Control loop started");

    while let Some(msg) = rx.recv().await {
        match msg {
            ControlMsg::Op {
                op_name,
                request,
                reply,
            } => dispatcher.handle_op(&op_name, request, reply),
            ControlMsg::Listing { kind, reply } => {
                let _ = reply.send(dispatcher.listing(kind));
            }
            ControlMsg::History { op_name, reply } => {
                let _ = reply.send(dispatcher.history(&op_name));
            }
            ControlMsg::Update(update) => dispatcher.apply_update(update),
            ControlMsg::Completed {
                op_name,
                session_id,
                result,
            } => dispatcher.complete(&op_name, session_id, result),
            ControlMsg::WaitSettled {
                op_name,
                session_id,
                timed_out,
                reply,
            } => dispatcher.settle_wait(&op_name, session_id, timed_out, reply),
            ControlMsg::Shutdown => break,
        }
    }

    tracing::info!("Control loop stopped");
}
