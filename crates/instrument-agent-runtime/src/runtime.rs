//! Agent runtime builder and the cloneable handle callers talk to.

use std::sync::Arc;

use instrument_agent_core::{
    Endpoints, Feed, Launcher, ManagementQuery, ManagementReply, OpParams, OpReply, OpRequest,
    OpSummary, OperationKind, OperationRegistry, Snapshot, Stopper, WaitTimeout,
};
use tokio::sync::{mpsc, oneshot};

use crate::{
    bridge::Bridge,
    config::AgentConfig,
    control::{self, ControlMsg},
    dispatcher::Dispatcher,
    error::DispatchError,
    lifecycle::ConnectionTracker,
    store::SessionStore,
};

/// Collects operations, then starts the control loop.
///
/// Registration happens here, before [`AgentRuntime::start`]; the registry
/// is read-only once the loop runs.
#[derive(Debug)]
pub struct AgentRuntime {
    config: AgentConfig,
    registry: OperationRegistry,
}

impl AgentRuntime {
    #[must_use]
    pub fn new(config: AgentConfig) -> Self {
        Self {
            config,
            registry: OperationRegistry::new(),
        }
    }

    /// Register a run-to-completion operation. Re-registering overwrites.
    pub fn register_task(&mut self, name: impl Into<String>, launcher: impl Launcher) -> &mut Self {
        self.registry.register_task(name, launcher);
        self
    }

    /// Register a stoppable operation. Re-registering overwrites.
    pub fn register_process(
        &mut self,
        name: impl Into<String>,
        launcher: impl Launcher,
        stopper: impl Stopper,
    ) -> &mut Self {
        self.registry.register_process(name, launcher, stopper);
        self
    }

    /// Spawn the control loop. Must be called inside a tokio runtime.
    #[must_use]
    pub fn start(self) -> AgentHandle {
        let Self { config, registry } = self;
        let endpoints = Endpoints::new(config.address.clone());
        let feed = Arc::new(Feed::new(
            endpoints.feed(),
            config.feed_capacity,
            config.feed_history,
        ));
        let tracker = Arc::new(ConnectionTracker::new(config.exit_when_idle));

        let (control, rx) = mpsc::unbounded_channel();
        let dispatcher = Dispatcher::new(
            registry,
            SessionStore::new(config.archive_depth),
            Bridge::new(control.clone(), config.max_workers),
            Arc::clone(&feed),
        );
        tokio::spawn(control::run(dispatcher, rx));

        {
            let tracker = Arc::clone(&tracker);
            let control = control.clone();
            tokio::spawn(async move {
                tracker.shutdown().await;
                let _ = control.send(ControlMsg::Shutdown);
            });
        }

        tracing::info!(address = %endpoints.address(), max_workers = ?config.max_workers, "Agent runtime started");
        AgentHandle {
            control,
            feed,
            endpoints: Arc::new(endpoints),
            tracker,
        }
    }
}

/// Cloneable RPC facade over a running control loop.
///
/// Every call is answered with a well-formed reply; a stopped loop yields
/// [`DispatchError::RuntimeClosed`].
#[derive(Clone)]
pub struct AgentHandle {
    control: mpsc::UnboundedSender<ControlMsg>,
    feed: Arc<Feed>,
    endpoints: Arc<Endpoints>,
    tracker: Arc<ConnectionTracker>,
}

impl AgentHandle {
    /// Run one action against `op_name`.
    pub async fn op(&self, op_name: &str, request: OpRequest) -> OpReply {
        let op_name = op_name.to_string();
        self.ask(|reply| ControlMsg::Op {
            op_name,
            request,
            reply,
        })
        .await
        .unwrap_or_else(|err| err.into_reply(None))
    }

    pub async fn start(&self, op_name: &str, params: OpParams) -> OpReply {
        self.op(op_name, OpRequest::Start { params }).await
    }

    pub async fn stop(&self, op_name: &str, params: OpParams) -> OpReply {
        self.op(op_name, OpRequest::Stop { params }).await
    }

    pub async fn wait(&self, op_name: &str, timeout: WaitTimeout) -> OpReply {
        self.op(op_name, OpRequest::Wait { timeout }).await
    }

    pub async fn status(&self, op_name: &str) -> OpReply {
        self.op(op_name, OpRequest::Status).await
    }

    /// Answer a management query.
    ///
    /// # Errors
    /// Returns error if the control loop is gone.
    pub async fn management(&self, query: ManagementQuery) -> Result<ManagementReply, DispatchError> {
        Ok(match query {
            ManagementQuery::GetTasks => ManagementReply::Listing(self.list_tasks().await?),
            ManagementQuery::GetProcesses => ManagementReply::Listing(self.list_processes().await?),
            ManagementQuery::GetHistory { op_name } => {
                ManagementReply::History(self.history(&op_name).await?)
            }
        })
    }

    /// Registered tasks, sorted by name.
    ///
    /// # Errors
    /// Returns error if the control loop is gone.
    pub async fn list_tasks(&self) -> Result<Vec<(String, OpSummary)>, DispatchError> {
        self.listing(OperationKind::Task).await
    }

    /// Registered processes, sorted by name.
    ///
    /// # Errors
    /// Returns error if the control loop is gone.
    pub async fn list_processes(&self) -> Result<Vec<(String, OpSummary)>, DispatchError> {
        self.listing(OperationKind::Process).await
    }

    async fn listing(&self, kind: OperationKind) -> Result<Vec<(String, OpSummary)>, DispatchError> {
        self.ask(|reply| ControlMsg::Listing { kind, reply }).await
    }

    /// Archived sessions of `op_name`, oldest first.
    ///
    /// # Errors
    /// Returns error if the control loop is gone.
    pub async fn history(&self, op_name: &str) -> Result<Vec<Snapshot>, DispatchError> {
        let op_name = op_name.to_string();
        self.ask(|reply| ControlMsg::History { op_name, reply }).await
    }

    async fn ask<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> ControlMsg,
    ) -> Result<T, DispatchError> {
        let (reply, rx) = oneshot::channel();
        self.control
            .send(build(reply))
            .map_err(|_| DispatchError::RuntimeClosed)?;
        rx.await.map_err(|_| DispatchError::RuntimeClosed)
    }

    #[must_use]
    pub const fn feed(&self) -> &Arc<Feed> {
        &self.feed
    }

    #[must_use]
    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Lifecycle hooks for the transport.
    #[must_use]
    pub fn lifecycle(&self) -> Arc<ConnectionTracker> {
        Arc::clone(&self.tracker)
    }

    /// Stop the control loop. Running workers are left to finish alone.
    pub fn shutdown(&self) {
        self.tracker.trigger_shutdown();
        let _ = self.control.send(ControlMsg::Shutdown);
    }

    /// Resolves once shutdown has been triggered.
    pub async fn closed(&self) {
        self.tracker.shutdown().await;
    }
}
