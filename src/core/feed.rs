//! In-process change feed.
//!
//! Every committed mutation is published once, after commit. Consumers get
//! at-least-once, per-entity ordered delivery for as long as they keep up;
//! a consumer that lags past the buffer is told how many events it missed
//! and must reconcile with a catch-up read of the store.

use crate::models::change_event::ChangeEvent;
use tokio::sync::broadcast;
use tracing::trace;

pub const DEFAULT_FEED_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<ChangeEvent>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(DEFAULT_FEED_CAPACITY)
    }
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }

    /// Never blocks; an event published with no consumers is simply dropped.
    pub fn publish(&self, event: ChangeEvent) -> usize {
        trace!(
            entity = ?event.entity(),
            entity_id = event.entity_id(),
            sequence = event.sequence,
            kind = event.kind.as_str(),
            "publishing change"
        );
        self.sender.send(event).unwrap_or(0)
    }

    pub fn consumer_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Pull whatever is already buffered without waiting. Returns the events in
/// order and how many were lost to lag along the way.
pub fn drain_ready(feed: &mut broadcast::Receiver<ChangeEvent>) -> (Vec<ChangeEvent>, u64) {
    use broadcast::error::TryRecvError;

    let mut events = Vec::new();
    let mut missed = 0;
    loop {
        match feed.try_recv() {
            Ok(event) => events.push(event),
            Err(TryRecvError::Lagged(n)) => missed += n,
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
        }
    }
    (events, missed)
}
