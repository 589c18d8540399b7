//! Named mutual exclusion across operations.
//!
//! Agents whose operations share one piece of hardware can hand the same
//! [`JobLock`] to each launcher. At most one job holds the lock; a stopper
//! flags the holder, and the holder polls that flag and exits on its own.
//! The dispatcher never consults the lock.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;

/// Lock is held by another job.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Conflict: \"{held}\" is already running.")]
pub struct JobConflict {
    pub held: String,
}

#[derive(Debug, Default)]
struct JobState {
    job: Option<String>,
    stop_requested: bool,
}

/// Shared exclusive-job slot.
#[derive(Debug, Clone, Default)]
pub struct JobLock {
    state: Arc<Mutex<JobState>>,
}

impl JobLock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, JobState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim the lock for `job`.
    ///
    /// # Errors
    /// Returns the current holder if the lock is taken.
    pub fn try_set_job(&self, job: &str) -> Result<JobGuard, JobConflict> {
        let mut state = self.state();
        if let Some(held) = &state.job {
            return Err(JobConflict { held: held.clone() });
        }
        state.job = Some(job.to_string());
        state.stop_requested = false;
        drop(state);
        tracing::debug!(job, "Job lock acquired");
        Ok(JobGuard {
            lock: self.clone(),
            job: job.to_string(),
        })
    }

    /// Name of the job holding the lock.
    #[must_use]
    pub fn current(&self) -> Option<String> {
        self.state().job.clone()
    }

    /// Ask `job` to stop. Returns `false` unless `job` holds the lock.
    pub fn request_stop(&self, job: &str) -> bool {
        let mut state = self.state();
        if state.job.as_deref() == Some(job) {
            state.stop_requested = true;
            true
        } else {
            false
        }
    }

    /// Whether `job` holds the lock and has been asked to stop.
    #[must_use]
    pub fn stop_requested(&self, job: &str) -> bool {
        let state = self.state();
        state.job.as_deref() == Some(job) && state.stop_requested
    }

    fn release(&self, job: &str) {
        let mut state = self.state();
        if state.job.as_deref() == Some(job) {
            state.job = None;
            state.stop_requested = false;
            drop(state);
            tracing::debug!(job, "Job lock released");
        }
    }
}

/// Holds the lock until dropped.
#[derive(Debug)]
pub struct JobGuard {
    lock: JobLock,
    job: String,
}

impl JobGuard {
    #[must_use]
    pub fn job(&self) -> &str {
        &self.job
    }

    /// Whether a stopper has flagged this job.
    #[must_use]
    pub fn stop_requested(&self) -> bool {
        self.lock.stop_requested(&self.job)
    }
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        self.lock.release(&self.job);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exclusive_until_dropped() {
        let lock = JobLock::new();
        let guard = lock.try_set_job("init").unwrap();

        let err = lock.try_set_job("acq").unwrap_err();
        assert_eq!(err.to_string(), "Conflict: \"init\" is already running.");
        assert_eq!(lock.current().as_deref(), Some("init"));

        drop(guard);
        assert!(lock.current().is_none());
        assert!(lock.try_set_job("acq").is_ok());
    }

    #[test]
    fn test_stop_only_targets_holder() {
        let lock = JobLock::new();
        assert!(!lock.request_stop("acq"));

        let guard = lock.try_set_job("acq").unwrap();
        assert!(!guard.stop_requested());
        assert!(!lock.request_stop("init"));
        assert!(lock.request_stop("acq"));
        assert!(guard.stop_requested());

        drop(guard);
        let again = lock.try_set_job("acq").unwrap();
        assert!(!again.stop_requested());
    }

    #[test]
    fn test_shared_across_threads() {
        let lock = JobLock::new();
        let guard = lock.try_set_job("acq").unwrap();

        let remote = lock.clone();
        std::thread::spawn(move || assert!(remote.request_stop("acq")))
            .join()
            .unwrap();

        assert!(guard.stop_requested());
    }
}
