//! Subscriber Registry: live dashboard subscriptions.
//!
//! Each subscription owns a bounded mpsc channel. Deliveries go out while the
//! registry lock is held, and unregistering flips the handle's `active` flag
//! under the same lock, so once `unregister` returns the connection can never
//! see another event, including ones already sitting in its buffer.

use crate::models::change_event::ChangeEvent;
use crate::models::ids::{ConnectionId, ProjectId, UserId};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::watch;
use tracing::{debug, info, warn};

pub const DEFAULT_LIVENESS_WINDOW: Duration = Duration::from_secs(30);
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 256;

/// Which events a dashboard wants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionFilter {
    All,
    Project(ProjectId),
    Assembler(UserId),
}

impl SubscriptionFilter {
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        match self {
            SubscriptionFilter::All => true,
            SubscriptionFilter::Project(id) => event.project_id() == id,
            SubscriptionFilter::Assembler(id) => event.assembler_id() == Some(id),
        }
    }
}

struct Subscription {
    filter: SubscriptionFilter,
    last_heartbeat: Instant,
    sender: mpsc::Sender<ChangeEvent>,
    active: Arc<AtomicBool>,
}

impl Subscription {
    fn is_live(&self, now: Instant, window: Duration) -> bool {
        now.saturating_duration_since(self.last_heartbeat) <= window
    }

    fn deactivate(&self) {
        self.active.store(false, Ordering::SeqCst);
    }
}

/// Receiving end of one registration.
pub struct SubscriberHandle {
    pub connection_id: ConnectionId,
    receiver: mpsc::Receiver<ChangeEvent>,
    active: Arc<AtomicBool>,
}

impl SubscriberHandle {
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Next event, or `None` once the subscription is gone.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        if !self.is_active() {
            return None;
        }
        let event = self.receiver.recv().await?;
        self.is_active().then_some(event)
    }

    pub fn try_recv(&mut self) -> Option<ChangeEvent> {
        if !self.is_active() {
            return None;
        }
        self.receiver.try_recv().ok()
    }
}

pub struct SubscriberRegistry {
    liveness_window: Duration,
    buffer: usize,
    subscriptions: Mutex<HashMap<ConnectionId, Subscription>>,
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_LIVENESS_WINDOW, DEFAULT_SUBSCRIBER_BUFFER)
    }
}

impl SubscriberRegistry {
    pub fn new(liveness_window: Duration, buffer: usize) -> Self {
        Self {
            liveness_window,
            buffer: buffer.max(1),
            subscriptions: Mutex::new(HashMap::new()),
        }
    }

    pub fn liveness_window(&self) -> Duration {
        self.liveness_window
    }

    fn table(&self) -> MutexGuard<'_, HashMap<ConnectionId, Subscription>> {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register(&self, connection_id: ConnectionId, filter: SubscriptionFilter) -> SubscriberHandle {
        self.register_at(connection_id, filter, Instant::now())
    }

    /// Registering an id that is already live replaces the old subscription;
    /// the old handle stops receiving.
    pub fn register_at(
        &self,
        connection_id: ConnectionId,
        filter: SubscriptionFilter,
        now: Instant,
    ) -> SubscriberHandle {
        let (sender, receiver) = mpsc::channel(self.buffer);
        let active = Arc::new(AtomicBool::new(true));

        let mut table = self.table();
        if let Some(old) = table.remove(&connection_id) {
            old.deactivate();
        }
        debug!(connection = %connection_id, ?filter, "subscription registered");
        table.insert(
            connection_id.clone(),
            Subscription {
                filter,
                last_heartbeat: now,
                sender,
                active: Arc::clone(&active),
            },
        );

        SubscriberHandle {
            connection_id,
            receiver,
            active,
        }
    }

    /// Returns false when the connection was not registered.
    pub fn unregister(&self, connection_id: &ConnectionId) -> bool {
        match self.table().remove(connection_id) {
            Some(sub) => {
                sub.deactivate();
                debug!(connection = %connection_id, "subscription removed");
                true
            }
            None => false,
        }
    }

    pub fn heartbeat(&self, connection_id: &ConnectionId) -> bool {
        self.heartbeat_at(connection_id, Instant::now())
    }

    /// A heartbeat for an already expired subscription does not revive it.
    pub fn heartbeat_at(&self, connection_id: &ConnectionId, now: Instant) -> bool {
        let mut table = self.table();
        match table.get_mut(connection_id) {
            None => return false,
            Some(sub) if sub.is_live(now, self.liveness_window) => {
                sub.last_heartbeat = now;
                return true;
            }
            Some(_) => {}
        }
        if let Some(dead) = table.remove(connection_id) {
            dead.deactivate();
        }
        warn!(connection = %connection_id, "heartbeat after liveness window, subscription purged");
        false
    }

    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Instant::now())
    }

    pub fn purge_expired_at(&self, now: Instant) -> usize {
        let window = self.liveness_window;
        let mut table = self.table();
        let before = table.len();
        table.retain(|id, sub| {
            let keep = sub.is_live(now, window);
            if !keep {
                sub.deactivate();
                warn!(connection = %id, "subscription expired");
            }
            keep
        });
        before - table.len()
    }

    /// Connections whose filter accepts `event` and that are still live.
    pub fn matching(&self, event: &ChangeEvent) -> HashSet<ConnectionId> {
        self.matching_at(event, Instant::now())
    }

    pub fn matching_at(&self, event: &ChangeEvent, now: Instant) -> HashSet<ConnectionId> {
        self.table()
            .iter()
            .filter(|(_, sub)| sub.is_live(now, self.liveness_window) && sub.filter.matches(event))
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn dispatch(&self, event: &ChangeEvent) -> usize {
        self.dispatch_at(event, Instant::now())
    }

    /// Push `event` to every matching live subscription. Expired ones are
    /// purged on the way; a subscriber whose buffer is full or whose handle
    /// was dropped is disconnected and has to re-register and re-read.
    pub fn dispatch_at(&self, event: &ChangeEvent, now: Instant) -> usize {
        let window = self.liveness_window;
        let mut delivered = 0;
        let mut table = self.table();

        table.retain(|id, sub| {
            if !sub.is_live(now, window) {
                sub.deactivate();
                warn!(connection = %id, "subscription expired");
                return false;
            }
            if !sub.filter.matches(event) {
                return true;
            }
            match sub.sender.try_send(event.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(TrySendError::Full(_)) => {
                    sub.deactivate();
                    warn!(connection = %id, "subscriber buffer full, disconnecting");
                    false
                }
                Err(TrySendError::Closed(_)) => {
                    sub.deactivate();
                    debug!(connection = %id, "subscriber handle dropped");
                    false
                }
            }
        });

        delivered
    }

    /// Drop every subscription; used when the fan-out lost events.
    pub fn disconnect_all(&self) -> usize {
        let mut table = self.table();
        let count = table.len();
        for (_, sub) in table.drain() {
            sub.deactivate();
        }
        count
    }

    pub fn len(&self) -> usize {
        self.table().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table().is_empty()
    }

    pub fn contains(&self, connection_id: &ConnectionId) -> bool {
        self.table().contains_key(connection_id)
    }
}

/// Periodically purge expired subscriptions until shutdown.
pub async fn run_reaper(
    registry: Arc<SubscriberRegistry>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let purged = registry.purge_expired();
                if purged > 0 {
                    info!(purged, remaining = registry.len(), "expired subscriptions purged");
                }
            }
            _ = shutdown.changed() => break,
        }
    }
}
