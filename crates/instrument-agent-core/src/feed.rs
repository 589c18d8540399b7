//! Broadcast + history status feed.

use std::{
    collections::VecDeque,
    sync::{PoisonError, RwLock},
};

use futures::{StreamExt, future};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::{Snapshot, traits::StatusPublisher};

/// Default broadcast capacity.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Default number of events kept for late subscribers.
pub const DEFAULT_HISTORY: usize = 256;

/// One published session snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedEvent {
    pub topic: String,
    pub session: Snapshot,
}

/// Status feed with broadcast and bounded history.
///
/// A subscriber that (re)connects replays recent history and then switches
/// to live events without gaps or duplicates.
pub struct Feed {
    topic: String,
    history_limit: usize,
    history: RwLock<VecDeque<FeedEvent>>,
    sender: broadcast::Sender<FeedEvent>,
}

impl Feed {
    /// Create a feed publishing on `topic`.
    #[must_use]
    pub fn new(topic: impl Into<String>, capacity: usize, history_limit: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            topic: topic.into(),
            history_limit,
            history: RwLock::new(VecDeque::with_capacity(history_limit.min(32))),
            sender,
        }
    }

    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Push an event to live listeners and history.
    pub fn push(&self, event: FeedEvent) {
        let mut history = self.history.write().unwrap_or_else(PoisonError::into_inner);
        // Sent under the lock so a concurrent subscribe sees it exactly once.
        let _ = self.sender.send(event.clone());
        if self.history_limit == 0 {
            return;
        }
        while history.len() >= self.history_limit {
            history.pop_front();
        }
        history.push_back(event);
    }

    /// Get a receiver for live updates.
    #[must_use]
    pub fn get_receiver(&self) -> broadcast::Receiver<FeedEvent> {
        self.sender.subscribe()
    }

    /// Get a snapshot of the history.
    #[must_use]
    pub fn get_history(&self) -> Vec<FeedEvent> {
        self.history
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Stream that yields history first, then live updates.
    ///
    /// Events a slow consumer lagged past are skipped.
    #[must_use]
    pub fn history_plus_stream(&self) -> futures::stream::BoxStream<'static, FeedEvent> {
        let (history, rx) = {
            let guard = self.history.read().unwrap_or_else(PoisonError::into_inner);
            (guard.iter().cloned().collect::<Vec<_>>(), self.sender.subscribe())
        };

        let hist = futures::stream::iter(history);
        let live = BroadcastStream::new(rx).filter_map(|res| future::ready(res.ok()));

        Box::pin(hist.chain(live))
    }

    /// History-then-live stream restricted to one operation.
    #[must_use]
    pub fn operation_stream(
        &self,
        op_name: impl Into<String>,
    ) -> futures::stream::BoxStream<'static, FeedEvent> {
        let op_name = op_name.into();
        self.history_plus_stream()
            .filter(move |event| future::ready(event.session.op_name == op_name))
            .boxed()
    }
}

impl StatusPublisher for Feed {
    fn publish_status(&self, snapshot: Snapshot) {
        self.push(FeedEvent {
            topic: self.topic.clone(),
            session: snapshot,
        });
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;
    use crate::Status;

    fn snapshot(op_name: &str, session_id: u64) -> Snapshot {
        Snapshot {
            session_id,
            op_name: op_name.into(),
            status: Status::Running,
            start_time: 1.0,
            end_time: None,
            messages: Vec::new(),
        }
    }

    #[test]
    fn test_history_is_bounded() {
        let feed = Feed::new("observatory.test.feed", 16, 2);
        for id in 0..5 {
            feed.publish_status(snapshot("acq", id));
        }

        let ids: Vec<u64> = feed.get_history().iter().map(|e| e.session.session_id).collect();
        assert_eq!(ids, [3, 4]);
        assert!(feed.get_history().iter().all(|e| e.topic == "observatory.test.feed"));
    }

    #[test]
    fn test_zero_history_keeps_nothing() {
        let feed = Feed::new("t", 16, 0);
        feed.publish_status(snapshot("acq", 0));
        assert!(feed.get_history().is_empty());
    }

    #[test]
    fn test_history_then_live() {
        tokio_test::block_on(async {
            let feed = Feed::new("t", 16, 8);
            feed.publish_status(snapshot("acq", 0));

            let mut stream = feed.history_plus_stream();
            feed.publish_status(snapshot("acq", 1));

            assert_eq!(stream.next().await.unwrap().session.session_id, 0);
            assert_eq!(stream.next().await.unwrap().session.session_id, 1);
        });
    }

    #[test]
    fn test_operation_stream_filters() {
        tokio_test::block_on(async {
            let feed = Feed::new("t", 16, 8);
            feed.publish_status(snapshot("init", 0));
            feed.publish_status(snapshot("acq", 1));
            feed.publish_status(snapshot("init", 2));

            let ids: Vec<u64> = feed
                .operation_stream("init")
                .take(2)
                .map(|e| e.session.session_id)
                .collect()
                .await;
            assert_eq!(ids, [0, 2]);
        });
    }
}
