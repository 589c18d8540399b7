//! Operation dispatcher: start, stop, wait and status on the control loop.

use std::sync::Arc;

use instrument_agent_core::{
    Feed, OpParams, OpReply, OpRequest, OpSummary, OperationDescriptor, OperationKind,
    OperationRegistry, Outcome, SessionId, SessionUpdate, Snapshot, Status, StatusPublisher,
    Update, WaitTimeout,
};
use tokio::sync::oneshot;

use crate::{
    bridge::{Bridge, LauncherFailure},
    error::DispatchError,
    store::SessionStore,
};

/// Control-loop resident dispatch logic.
///
/// Owns the session store outright; nothing here is shared with workers.
pub(crate) struct Dispatcher {
    registry: OperationRegistry,
    store: SessionStore,
    bridge: Bridge,
    feed: Arc<Feed>,
}

impl Dispatcher {
    pub(crate) const fn new(
        registry: OperationRegistry,
        store: SessionStore,
        bridge: Bridge,
        feed: Arc<Feed>,
    ) -> Self {
        Self {
            registry,
            store,
            bridge,
            feed,
        }
    }

    pub(crate) fn topic(&self) -> &str {
        self.feed.topic()
    }

    /// Route one action. `wait` may answer `reply` later, from a racer.
    pub(crate) fn handle_op(
        &mut self,
        op_name: &str,
        request: OpRequest,
        reply: oneshot::Sender<OpReply>,
    ) {
        let action = request.action();
        let Some(descriptor) = self.registry.lookup(op_name).cloned() else {
            let err = DispatchError::UnknownOperation {
                action,
                op_name: op_name.to_string(),
            };
            tracing::debug!(op_name, %action, error = err.as_label(), "Request rejected");
            let _ = reply.send(err.into_reply(None));
            return;
        };

        let answer = match request {
            OpRequest::Start { params } => self.start(op_name, &descriptor, params),
            OpRequest::Stop { params } => self.stop(op_name, &descriptor, params),
            OpRequest::Status => self.status(op_name),
            OpRequest::Wait { timeout } => {
                self.wait(op_name, timeout, reply);
                return;
            }
        };
        let _ = reply.send(answer);
    }

    fn start(
        &mut self,
        op_name: &str,
        descriptor: &OperationDescriptor,
        params: OpParams,
    ) -> OpReply {
        if let Some(live) = self.store.get(op_name) {
            if !live.session().status().is_done() {
                let err = DispatchError::AlreadyRunning {
                    op_name: op_name.to_string(),
                };
                tracing::debug!(op_name, error = err.as_label(), "Start rejected");
                return err.into_reply(Some(live.session().snapshot()));
            }
            self.store.retire(op_name);
        }

        let publisher: Arc<dyn StatusPublisher> = self.feed.clone();
        let live = self.store.create(op_name, publisher);
        let session_id = live.session().session_id();
        let snapshot = live.session().snapshot();

        let work = self.bridge.run(
            descriptor.launcher(),
            self.bridge.handle(session_id, op_name),
            params,
        );
        self.bridge.on_completion(op_name.to_string(), session_id, work);

        let kind = descriptor.kind();
        tracing::info!(op_name, session_id, %kind, "Operation started");
        OpReply::ok(format!("Started {kind} \"{op_name}\"."), Some(snapshot))
    }

    fn stop(
        &self,
        op_name: &str,
        descriptor: &OperationDescriptor,
        params: OpParams,
    ) -> OpReply {
        let Some(stopper) = descriptor.stopper() else {
            let err = DispatchError::NotStoppable {
                op_name: op_name.to_string(),
            };
            tracing::debug!(op_name, error = err.as_label(), "Stop rejected");
            return err.into_reply(None);
        };

        let snapshot = self.store.get(op_name).map(|live| live.session().snapshot());
        self.bridge.run_stopper(op_name.to_string(), stopper, params);
        tracing::info!(op_name, "Stop requested");
        OpReply::ok(format!("Requested stop on process \"{op_name}\"."), snapshot)
    }

    fn status(&self, op_name: &str) -> OpReply {
        match self.store.get(op_name) {
            Some(live) => OpReply::ok("Session active.", Some(live.session().snapshot())),
            None => OpReply::ok("no session active", None),
        }
    }

    fn wait(&self, op_name: &str, timeout: WaitTimeout, reply: oneshot::Sender<OpReply>) {
        let Some(live) = self.store.get(op_name) else {
            let _ = reply.send(OpReply::ok("idle", None));
            return;
        };

        if live.is_resolved() {
            let _ = reply.send(exited(op_name, Some(live.session().snapshot())));
            return;
        }

        let limit = match timeout {
            WaitTimeout::Poll => {
                let err = DispatchError::Timeout {
                    op_name: op_name.to_string(),
                };
                let _ = reply.send(err.into_reply(Some(live.session().snapshot())));
                return;
            }
            WaitTimeout::Unbounded => None,
            WaitTimeout::For(limit) => Some(limit),
        };

        let session_id = live.session().session_id();
        tracing::debug!(op_name, session_id, ?limit, "Waiting for completion");
        self.bridge
            .race_wait(op_name.to_string(), session_id, live.subscribe(), limit, reply);
    }

    /// Answer a wait whose racer finished, from the state seen right now.
    pub(crate) fn settle_wait(
        &self,
        op_name: &str,
        session_id: SessionId,
        timed_out: bool,
        reply: oneshot::Sender<OpReply>,
    ) {
        let answer = match self.store.find(op_name, session_id) {
            Some((snapshot, true)) => exited(op_name, Some(snapshot)),
            Some((snapshot, false)) => DispatchError::Timeout {
                op_name: op_name.to_string(),
            }
            .into_reply(Some(snapshot)),
            // Retired and since displaced, which implies it finished.
            None => exited(op_name, None),
        };
        tracing::debug!(op_name, session_id, timed_out, code = ?answer.code, "Wait settled");
        let _ = reply.send(answer);
    }

    /// Completion handler: record the outcome and force `done`.
    pub(crate) fn complete(
        &mut self,
        op_name: &str,
        session_id: SessionId,
        result: Result<Outcome, LauncherFailure>,
    ) {
        let Some(live) = self.store.get_session_mut(op_name, session_id) else {
            tracing::debug!(op_name, session_id, "Completion for retired session dropped");
            return;
        };

        let message = match result {
            Ok(outcome) => {
                if outcome.ok {
                    tracing::info!(op_name, session_id, message = %outcome.message, "Operation finished");
                } else {
                    tracing::warn!(op_name, session_id, message = %outcome.message, "Operation reported failure");
                }
                outcome.message
            }
            Err(fault) => {
                let err = DispatchError::LauncherFailure(fault);
                tracing::error!(op_name, session_id, error = %err, label = err.as_label(), "Launcher faulted");
                err.to_string()
            }
        };

        let session = live.session_mut();
        session.add_message(message, None);
        session.set_status(Status::Done, None, true);
        live.resolve();
    }

    /// Apply a worker post if its session is still live.
    pub(crate) fn apply_update(&mut self, update: SessionUpdate) {
        let SessionUpdate {
            session_id,
            op_name,
            update,
        } = update;
        let Some(live) = self.store.get_session_mut(&op_name, session_id) else {
            tracing::debug!(op_name = %op_name, session_id, "Post for retired session dropped");
            return;
        };
        match update {
            Update::Status(status) => live.session_mut().set_status(status, None, true),
            Update::Message(text) => live.session_mut().add_message(text, None),
        }
    }

    /// Every registered name of `kind` with its live, last archived, or
    /// placeholder state.
    pub(crate) fn listing(&self, kind: OperationKind) -> Vec<(String, OpSummary)> {
        self.registry
            .names(kind)
            .map(|name| {
                let summary = self
                    .store
                    .get(name)
                    .map(|live| live.session().snapshot())
                    .or_else(|| self.store.latest_archived(name).cloned())
                    .map_or_else(|| OpSummary::no_history(name), OpSummary::Session);
                (name.to_string(), summary)
            })
            .collect()
    }

    pub(crate) fn history(&self, op_name: &str) -> Vec<Snapshot> {
        self.store.history(op_name)
    }
}

fn exited(op_name: &str, snapshot: Option<Snapshot>) -> OpReply {
    OpReply::ok(format!("Operation \"{op_name}\" just exited."), snapshot)
}
