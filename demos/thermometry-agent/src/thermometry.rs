//! Lakeshore 240 thermometry operations, faking the hardware.

use std::{
    collections::BTreeMap,
    sync::{Arc, PoisonError, RwLock},
    thread,
    time::Duration,
};

use instrument_agent_core::{JobLock, OpParams, Outcome, SessionHandle, Status, session::now};
use instrument_agent_runtime::AgentRuntime;
use rand::Rng;

/// Shared state of the `init_lakeshore` task and the `acq` process.
///
/// Both hold the same [`JobLock`], so the module is never initialized while
/// it is being read out.
#[derive(Debug)]
pub struct Thermometry {
    jobs: JobLock,
    thermometers: RwLock<Vec<String>>,
    interval: Duration,
}

impl Thermometry {
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            jobs: JobLock::new(),
            thermometers: RwLock::new(Vec::new()),
            interval,
        }
    }

    /// Register `init_lakeshore` and `acq` on `runtime`.
    pub fn register(self: Arc<Self>, runtime: &mut AgentRuntime) {
        let init = Arc::clone(&self);
        let acq = Arc::clone(&self);
        let stop = self;
        runtime
            .register_task(
                "init_lakeshore",
                move |session: SessionHandle, params: OpParams| init.init_lakeshore(&session, &params),
            )
            .register_process(
                "acq",
                move |session: SessionHandle, params: OpParams| acq.acq(&session, &params),
                move |params: OpParams| stop.stop_acq(&params),
            );
    }

    #[must_use]
    pub fn thermometers(&self) -> Vec<String> {
        self.thermometers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn init_lakeshore(&self, session: &SessionHandle, params: &OpParams) -> Outcome {
        let _guard = match self.jobs.try_set_job("init") {
            Ok(guard) => guard,
            Err(conflict) => return Outcome::failed(conflict.to_string()),
        };
        session.post_status(Status::Starting);
        session.post_message("No initialization since faking data");

        let channels = params
            .get("channels")
            .and_then(serde_json::Value::as_u64)
            .and_then(|n| usize::try_from(n.clamp(1, 8)).ok())
            .unwrap_or(2);
        let names: Vec<String> = ('A'..='H')
            .take(channels)
            .map(|c| format!("therm{c}"))
            .collect();
        tracing::info!(thermometers = ?names, "Lakeshore initialized");
        *self
            .thermometers
            .write()
            .unwrap_or_else(PoisonError::into_inner) = names;

        Outcome::ok("Lakeshore module initialized.")
    }

    pub fn acq(&self, session: &SessionHandle, params: &OpParams) -> Outcome {
        let guard = match self.jobs.try_set_job("acq") {
            Ok(guard) => guard,
            Err(conflict) => return Outcome::failed(conflict.to_string()),
        };
        session.post_status(Status::Running);

        let interval = params
            .get_f64("interval")
            .filter(|s| s.is_finite() && *s > 0.0)
            .map_or(self.interval, Duration::from_secs_f64);
        let thermometers = self.thermometers();
        let mut rng = rand::thread_rng();

        while !guard.stop_requested() {
            let data: BTreeMap<&str, (f64, u32)> = thermometers
                .iter()
                .map(|therm| (therm.as_str(), (now(), rng.gen_range(250..350))))
                .collect();
            match serde_json::to_string(&data) {
                Ok(data) => session.post_message(data),
                Err(e) => tracing::warn!("Failed to encode readings: {e}"),
            }
            thread::sleep(interval);
        }

        session.post_status(Status::Stopping);
        Outcome::ok("Acquisition exited cleanly.")
    }

    pub fn stop_acq(&self, _params: &OpParams) -> Outcome {
        if self.jobs.request_stop("acq") {
            Outcome::ok("Requested process stop.")
        } else {
            Outcome::failed("Failed to request process stop.")
        }
    }
}

#[cfg(test)]
mod tests {
    use instrument_agent_core::{ResultCode, WaitTimeout};
    use instrument_agent_runtime::AgentConfig;

    use super::*;

    fn agent() -> (Arc<Thermometry>, instrument_agent_runtime::AgentHandle) {
        let thermometry = Arc::new(Thermometry::new(Duration::from_millis(5)));
        let mut runtime = AgentRuntime::new(AgentConfig::new("observatory.thermometry"));
        Arc::clone(&thermometry).register(&mut runtime);
        (thermometry, runtime.start())
    }

    #[test]
    fn test_stop_without_acquisition_fails() {
        let thermometry = Thermometry::new(Duration::from_millis(5));
        let outcome = thermometry.stop_acq(&OpParams::new());
        assert!(!outcome.ok);
    }

    #[tokio::test]
    async fn test_init_then_acquire_then_stop() {
        let (thermometry, agent) = agent();

        agent
            .start("init_lakeshore", OpParams::new().with("channels", 3))
            .await;
        let init = agent.wait("init_lakeshore", WaitTimeout::Unbounded).await;
        assert!(init.session.unwrap().has_message("Lakeshore module initialized."));
        assert_eq!(thermometry.thermometers(), ["thermA", "thermB", "thermC"]);

        assert!(agent.start("acq", OpParams::new()).await.is_ok());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(agent.stop("acq", OpParams::new()).await.code, ResultCode::Ok);

        let done = agent.wait("acq", WaitTimeout::Unbounded).await;
        let snapshot = done.session.unwrap();
        assert!(snapshot.has_message("Acquisition exited cleanly."));
        assert!(snapshot.messages.iter().any(|(_, text)| text.contains("thermC")));
    }

    #[tokio::test]
    async fn test_init_conflicts_with_running_acquisition() {
        let (_thermometry, agent) = agent();

        agent.start("acq", OpParams::new()).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        agent.start("init_lakeshore", OpParams::new()).await;
        let init = agent.wait("init_lakeshore", WaitTimeout::Unbounded).await;
        assert!(init
            .session
            .unwrap()
            .has_message("Conflict: \"acq\" is already running."));

        agent.stop("acq", OpParams::new()).await;
        agent.wait("acq", WaitTimeout::Unbounded).await;
    }
}
