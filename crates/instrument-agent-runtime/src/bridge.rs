//! Worker bridge between the control loop and blocking operation bodies.
//!
//! ```text
//! control loop ──run()──► tokio task ──spawn_blocking──► launcher(session, params)
//!      ▲                                                    │
//!      │ ControlMsg::Update        (post_status/post_message)
//!      ├────────────────────────────────────────────────────┘
//!      │ ControlMsg::Completed     (on_completion)
//!      └──────────────── tokio task ◄── worker future resolves
//! ```
//!
//! ## Rules
//! - Workers never touch session state; they only enqueue messages.
//! - One unbounded queue carries both posts and completions, so a worker's
//!   posts are always applied before its completion.
//! - Stoppers bypass the worker bound so a saturated pool can still be asked
//!   to stop.

use std::{any::Any, sync::Arc, time::Duration};

use futures::{FutureExt, future::BoxFuture};
use instrument_agent_core::{
    Launcher, OpParams, OpReply, Outcome, SessionHandle, SessionId, SessionUpdate, Stopper,
    UpdateSink,
};
use tokio::{
    sync::{Semaphore, mpsc, oneshot, watch},
    task::JoinError,
};

use crate::control::ControlMsg;

/// Launcher panicked or its worker was torn down.
pub type LauncherFailure = String;

/// Forwards worker posts onto the control loop queue.
pub(crate) struct ControlSink {
    control: mpsc::UnboundedSender<ControlMsg>,
}

impl UpdateSink for ControlSink {
    fn post(&self, update: SessionUpdate) {
        if self.control.send(ControlMsg::Update(update)).is_err() {
            tracing::debug!("Dropped session update: control loop is gone");
        }
    }
}

/// Dispatches operation bodies onto the blocking pool.
pub(crate) struct Bridge {
    control: mpsc::UnboundedSender<ControlMsg>,
    sink: Arc<dyn UpdateSink>,
    permits: Option<Arc<Semaphore>>,
}

impl Bridge {
    pub(crate) fn new(control: mpsc::UnboundedSender<ControlMsg>, max_workers: Option<usize>) -> Self {
        Self {
            sink: Arc::new(ControlSink {
                control: control.clone(),
            }),
            control,
            permits: max_workers.map(|n| Arc::new(Semaphore::new(n.max(1)))),
        }
    }

    /// Handle a launcher uses to report on session `session_id`.
    pub(crate) fn handle(&self, session_id: SessionId, op_name: &str) -> SessionHandle {
        SessionHandle::new(session_id, op_name, Arc::clone(&self.sink))
    }

    /// Run `launcher` on a worker.
    ///
    /// The work starts immediately; the returned future resolves with the
    /// launcher's outcome, or its panic text.
    pub(crate) fn run(
        &self,
        launcher: Arc<dyn Launcher>,
        session: SessionHandle,
        params: OpParams,
    ) -> BoxFuture<'static, Result<Outcome, LauncherFailure>> {
        let permits = self.permits.clone();
        let worker = tokio::spawn(async move {
            let _permit = match permits {
                Some(sem) => sem.acquire_owned().await.ok(),
                None => None,
            };
            tokio::task::spawn_blocking(move || launcher.launch(session, params)).await
        });

        async move {
            match worker.await {
                Ok(Ok(outcome)) => Ok(outcome),
                Ok(Err(join)) | Err(join) => Err(describe_join_error(join)),
            }
        }
        .boxed()
    }

    /// Deliver the result of `work` to the control loop once it resolves.
    pub(crate) fn on_completion(
        &self,
        op_name: String,
        session_id: SessionId,
        work: BoxFuture<'static, Result<Outcome, LauncherFailure>>,
    ) {
        let control = self.control.clone();
        tokio::spawn(async move {
            let result = work.await;
            if control
                .send(ControlMsg::Completed {
                    op_name,
                    session_id,
                    result,
                })
                .is_err()
            {
                tracing::warn!(session_id, "Launcher finished after control loop shut down");
            }
        });
    }

    /// Fire a stop request on a worker. The outcome is only logged.
    pub(crate) fn run_stopper(&self, op_name: String, stopper: Arc<dyn Stopper>, params: OpParams) {
        tokio::spawn(async move {
            match tokio::task::spawn_blocking(move || stopper.stop(params)).await {
                Ok(outcome) if outcome.ok => {
                    tracing::info!(op_name = %op_name, message = %outcome.message, "Stop request handled");
                }
                Ok(outcome) => {
                    tracing::warn!(op_name = %op_name, message = %outcome.message, "Stop request declined");
                }
                Err(join) => {
                    tracing::error!(op_name = %op_name, error = %describe_join_error(join), "Stopper failed");
                }
            }
        });
    }

    /// Race a session's completion against an optional timer.
    ///
    /// The verdict goes back through the control loop, which answers
    /// `reply` with a snapshot taken there. The launcher is never touched.
    pub(crate) fn race_wait(
        &self,
        op_name: String,
        session_id: SessionId,
        completion: watch::Receiver<bool>,
        limit: Option<Duration>,
        reply: oneshot::Sender<OpReply>,
    ) {
        let control = self.control.clone();
        tokio::spawn(async move {
            let timed_out = match limit {
                Some(limit) => {
                    tokio::select! {
                        () = resolved(completion) => false,
                        () = tokio::time::sleep(limit) => true,
                    }
                }
                None => {
                    resolved(completion).await;
                    false
                }
            };
            let _ = control.send(ControlMsg::WaitSettled {
                op_name,
                session_id,
                timed_out,
                reply,
            });
        });
    }
}

async fn resolved(mut completion: watch::Receiver<bool>) {
    // A closed channel means the slot was torn down, which only follows completion.
    let _ = completion.wait_for(|done| *done).await;
}

fn describe_join_error(err: JoinError) -> LauncherFailure {
    if err.is_panic() {
        panic_text(err.into_panic())
    } else {
        "worker cancelled".to_string()
    }
}

fn panic_text(payload: Box<dyn Any + Send>) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "launcher panicked".to_string())
}

#[cfg(test)]
mod tests {
    use instrument_agent_core::Update;

    use super::*;

    fn bridge(max_workers: Option<usize>) -> (Bridge, mpsc::UnboundedReceiver<ControlMsg>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Bridge::new(tx, max_workers), rx)
    }

    #[tokio::test]
    async fn test_run_resolves_with_outcome() {
        let (bridge, _rx) = bridge(None);
        let launcher: Arc<dyn Launcher> = Arc::new(|_: SessionHandle, params: OpParams| {
            Outcome::ok(params.get_str("echo").unwrap_or_default())
        });

        let work = bridge.run(
            launcher,
            bridge.handle(0, "echo"),
            OpParams::new().with("echo", "hi"),
        );
        assert_eq!(work.await, Ok(Outcome::ok("hi")));
    }

    #[tokio::test]
    async fn test_panic_becomes_failure() {
        let (bridge, _rx) = bridge(None);
        let launcher: Arc<dyn Launcher> =
            Arc::new(|_: SessionHandle, _: OpParams| -> Outcome { panic!("serial port vanished") });

        let err = bridge.run(launcher, bridge.handle(0, "init"), OpParams::new()).await;
        assert_eq!(err, Err("serial port vanished".to_string()));
    }

    #[tokio::test]
    async fn test_posts_precede_completion() {
        let (bridge, mut rx) = bridge(Some(1));
        let launcher: Arc<dyn Launcher> = Arc::new(|session: SessionHandle, _: OpParams| {
            session.post_message("first");
            session.post_message("second");
            Outcome::ok("last")
        });

        let work = bridge.run(launcher, bridge.handle(5, "init"), OpParams::new());
        bridge.on_completion("init".into(), 5, work);

        let mut seen = Vec::new();
        while let Some(msg) = rx.recv().await {
            match msg {
                ControlMsg::Update(SessionUpdate {
                    update: Update::Message(text),
                    ..
                }) => seen.push(text),
                ControlMsg::Completed { session_id, result, .. } => {
                    assert_eq!(session_id, 5);
                    seen.push(result.unwrap().message);
                    break;
                }
                _ => {}
            }
        }
        assert_eq!(seen, ["first", "second", "last"]);
    }

    #[tokio::test]
    async fn test_race_wait_times_out() {
        let (bridge, mut rx) = bridge(None);
        let (_completion_tx, completion_rx) = watch::channel(false);
        let (reply_tx, _reply_rx) = oneshot::channel();

        bridge.race_wait("slow".into(), 2, completion_rx, Some(Duration::from_millis(20)), reply_tx);

        match rx.recv().await {
            Some(ControlMsg::WaitSettled { timed_out, session_id, .. }) => {
                assert!(timed_out);
                assert_eq!(session_id, 2);
            }
            _ => panic!("expected a settled wait"),
        }
    }

    #[tokio::test]
    async fn test_race_wait_sees_completion() {
        let (bridge, mut rx) = bridge(None);
        let (completion_tx, completion_rx) = watch::channel(false);
        let (reply_tx, _reply_rx) = oneshot::channel();

        bridge.race_wait("init".into(), 0, completion_rx, Some(Duration::from_secs(10)), reply_tx);
        completion_tx.send_replace(true);

        match rx.recv().await {
            Some(ControlMsg::WaitSettled { timed_out, .. }) => assert!(!timed_out),
            _ => panic!("expected a settled wait"),
        }
    }
}
