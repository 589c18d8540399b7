//! Session store: one live session per operation name, plus an archive.

use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
};

use instrument_agent_core::{OpSession, SessionId, Snapshot, StatusPublisher};
use tokio::sync::watch;

/// Live session plus the completion signal of its launcher.
pub struct LiveSession {
    session: OpSession,
    completion: watch::Sender<bool>,
}

impl LiveSession {
    fn new(session: OpSession) -> Self {
        let (completion, _) = watch::channel(false);
        Self {
            session,
            completion,
        }
    }

    #[must_use]
    pub const fn session(&self) -> &OpSession {
        &self.session
    }

    pub const fn session_mut(&mut self) -> &mut OpSession {
        &mut self.session
    }

    /// Whether the launcher's completion handler has run.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        *self.completion.borrow()
    }

    /// Receiver that flips to `true` once the completion handler has run.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.completion.subscribe()
    }

    /// Mark the launcher as finished, waking every waiter.
    pub fn resolve(&self) {
        self.completion.send_replace(true);
    }
}

/// Holds at most one live session per operation name.
///
/// Confined to the control loop; nothing here is shared with workers.
pub struct SessionStore {
    live: HashMap<String, LiveSession>,
    archive: HashMap<String, VecDeque<Snapshot>>,
    archive_depth: usize,
    /// Final snapshot of the last retired session per name, kept even when
    /// archiving is disabled so pending waiters can still read it.
    last_retired: HashMap<String, Snapshot>,
    next_id: SessionId,
}

impl SessionStore {
    /// Create a store keeping up to `archive_depth` retired sessions per name.
    #[must_use]
    pub fn new(archive_depth: usize) -> Self {
        Self {
            live: HashMap::new(),
            archive: HashMap::new(),
            archive_depth,
            last_retired: HashMap::new(),
            next_id: 0,
        }
    }

    #[must_use]
    pub fn get(&self, op_name: &str) -> Option<&LiveSession> {
        self.live.get(op_name)
    }

    /// Live session for `op_name` if it has this id.
    pub fn get_session_mut(
        &mut self,
        op_name: &str,
        session_id: SessionId,
    ) -> Option<&mut LiveSession> {
        self.live
            .get_mut(op_name)
            .filter(|live| live.session.session_id() == session_id)
    }

    /// Allocate a fresh session in `starting` and install it as live.
    ///
    /// The caller must have retired (or never had) a live session for the
    /// name.
    pub fn create(
        &mut self,
        op_name: &str,
        publisher: Arc<dyn StatusPublisher>,
    ) -> &mut LiveSession {
        debug_assert!(!self.live.contains_key(op_name), "live session overwritten");
        let session_id = self.next_id;
        self.next_id += 1;

        let session = OpSession::new(session_id, op_name, publisher);
        tracing::debug!(op_name, session_id, "Session created");

        let slot = self.live.entry(op_name.to_string()).insert_entry(LiveSession::new(session));
        slot.into_mut()
    }

    /// Clear the live slot, archiving the session's final snapshot.
    pub fn retire(&mut self, op_name: &str) -> Option<Snapshot> {
        let retired = self.live.remove(op_name)?.session.snapshot();
        tracing::debug!(op_name, session_id = retired.session_id, "Session retired");

        if self.archive_depth > 0 {
            let history = self.archive.entry(op_name.to_string()).or_default();
            while history.len() >= self.archive_depth {
                history.pop_front();
            }
            history.push_back(retired.clone());
        }
        self.last_retired.insert(op_name.to_string(), retired.clone());
        Some(retired)
    }

    /// Archived sessions for `op_name`, oldest first.
    #[must_use]
    pub fn history(&self, op_name: &str) -> Vec<Snapshot> {
        self.archive
            .get(op_name)
            .map(|h| h.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Most recently archived session for `op_name`.
    #[must_use]
    pub fn latest_archived(&self, op_name: &str) -> Option<&Snapshot> {
        self.archive.get(op_name).and_then(VecDeque::back)
    }

    /// Snapshot of a specific session, live or archived, with its
    /// resolution state.
    #[must_use]
    pub fn find(&self, op_name: &str, session_id: SessionId) -> Option<(Snapshot, bool)> {
        if let Some(live) = self
            .live
            .get(op_name)
            .filter(|live| live.session.session_id() == session_id)
        {
            return Some((live.session.snapshot(), live.is_resolved()));
        }
        self.archive
            .get(op_name)
            .and_then(|h| h.iter().find(|s| s.session_id == session_id))
            .or_else(|| {
                self.last_retired
                    .get(op_name)
                    .filter(|s| s.session_id == session_id)
            })
            .map(|s| (s.clone(), true))
    }
}

#[cfg(test)]
mod tests {
    use instrument_agent_core::Status;

    use super::*;

    struct Discard;

    impl StatusPublisher for Discard {
        fn publish_status(&self, _: Snapshot) {}
    }

    fn publisher() -> Arc<dyn StatusPublisher> {
        Arc::new(Discard)
    }

    #[test]
    fn test_ids_increase_across_names() {
        let mut store = SessionStore::new(4);
        let a = store.create("init", publisher()).session().session_id();
        let b = store.create("acq", publisher()).session().session_id();
        store.retire("init");
        let c = store.create("init", publisher()).session().session_id();

        assert!(a < b && b < c);
        assert_eq!(store.create("scan", publisher()).session().session_id(), c + 1);
    }

    #[test]
    fn test_create_starts_unresolved() {
        let mut store = SessionStore::new(4);
        let live = store.create("init", publisher());

        assert_eq!(live.session().status(), Status::Starting);
        assert!(!live.is_resolved());

        let mut rx = live.subscribe();
        live.resolve();
        assert!(live.is_resolved());
        assert!(rx.has_changed().unwrap());
        assert!(*rx.borrow_and_update());
    }

    #[test]
    fn test_retire_archives_bounded() {
        let mut store = SessionStore::new(2);
        for _ in 0..3 {
            store
                .create("init", publisher())
                .session_mut()
                .set_status(Status::Done, None, true);
            store.retire("init");
        }

        let ids: Vec<SessionId> = store.history("init").iter().map(|s| s.session_id).collect();
        assert_eq!(ids, [1, 2]);
        assert_eq!(store.latest_archived("init").unwrap().session_id, 2);
        assert!(store.get("init").is_none());
        assert!(store.retire("init").is_none());
    }

    #[test]
    fn test_zero_depth_disables_archive() {
        let mut store = SessionStore::new(0);
        store.create("init", publisher());
        assert!(store.retire("init").is_some());
        assert!(store.history("init").is_empty());
        assert!(store.latest_archived("init").is_none());
    }

    #[test]
    fn test_find_retired_without_archive() {
        let mut store = SessionStore::new(0);
        store
            .create("init", publisher())
            .session_mut()
            .set_status(Status::Done, None, true);
        store.retire("init");
        store.create("init", publisher());

        let (snapshot, resolved) = store.find("init", 0).unwrap();
        assert!(resolved);
        assert_eq!(snapshot.status, Status::Done);
        assert!(store.find("init", 1).is_some_and(|(_, resolved)| !resolved));
    }

    #[test]
    fn test_find_live_and_archived() {
        let mut store = SessionStore::new(4);
        store.create("acq", publisher());
        assert_eq!(store.find("acq", 0).map(|(s, r)| (s.session_id, r)), Some((0, false)));

        store.retire("acq");
        store.create("acq", publisher());
        assert_eq!(store.find("acq", 0).map(|(s, r)| (s.session_id, r)), Some((0, true)));
        assert_eq!(store.find("acq", 1).map(|(s, r)| (s.session_id, r)), Some((1, false)));
        assert!(store.find("acq", 9).is_none());
        assert!(store.get_session_mut("acq", 0).is_none());
        assert!(store.get_session_mut("acq", 1).is_some());
    }
}
