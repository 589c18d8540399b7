//! Connection lifecycle tracking.

use std::sync::{
    PoisonError, RwLock,
    atomic::{AtomicUsize, Ordering},
};

use instrument_agent_core::Lifecycle;
use tokio::sync::watch;

/// Counts transport connections and owns the agent's shutdown signal.
#[derive(Debug)]
pub struct ConnectionTracker {
    active: AtomicUsize,
    identity: RwLock<Option<String>>,
    exit_when_idle: bool,
    shutdown: watch::Sender<bool>,
}

impl ConnectionTracker {
    /// With `exit_when_idle`, the last disconnect triggers shutdown.
    #[must_use]
    pub fn new(exit_when_idle: bool) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            active: AtomicUsize::new(0),
            identity: RwLock::new(None),
            exit_when_idle,
            shutdown,
        }
    }

    /// Number of open connections.
    #[must_use]
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Identity the agent joined under, if any.
    #[must_use]
    pub fn identity(&self) -> Option<String> {
        self.identity
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Fire the shutdown signal. Idempotent.
    pub fn trigger_shutdown(&self) {
        if !self.shutdown.send_replace(true) {
            tracing::info!("Shutdown triggered");
        }
    }

    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Resolves once shutdown has been triggered.
    pub async fn shutdown(&self) {
        let mut rx = self.shutdown.subscribe();
        let _ = rx.wait_for(|down| *down).await;
    }
}

impl Lifecycle for ConnectionTracker {
    fn on_connect(&self) {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!(active, "Connection opened");
    }

    fn on_join(&self, identity: &str) {
        *self.identity.write().unwrap_or_else(PoisonError::into_inner) = Some(identity.to_string());
        tracing::info!(identity, "Joined");
    }

    fn on_leave(&self, reason: &str) {
        tracing::info!(reason, "Left");
    }

    fn on_disconnect(&self) {
        let previous = self
            .active
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .unwrap_or(0);
        let active = previous.saturating_sub(1);
        tracing::info!(active, "Connection closed");

        if active == 0 && self.exit_when_idle {
            self.trigger_shutdown();
        }
    }
}
