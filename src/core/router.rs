//! Notification Router.
//!
//! Turns `session/updated` events whose snapshot just reached `completed`
//! into exactly one `work_completed` notification for the project owner.
//! The feed is at-least-once, so the notifications table key
//! (recipient, session, kind) is the dedup point; a replayed or re-read
//! completion finds the row already there and produces nothing.

use crate::core::delivery::{DeliveryTransport, compose_completion};
use crate::core::feed::drain_ready;
use crate::core::notifications::NotificationStore;
use crate::core::store::SessionStore;
use crate::errors::AppResult;
use crate::models::change_event::{ChangeEvent, ChangeKind};
use crate::models::ids::{NotificationId, ProjectId, UserId};
use crate::models::notification::Notification;
use crate::models::work_session::WorkSession;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};

/// Resolves "who owns this project" for routing.
pub trait ProjectResolver: Send + Sync {
    fn project_owner(&self, project_id: &ProjectId) -> AppResult<UserId>;

    /// Human-readable names for the delivery message; best effort.
    fn session_labels(&self, _session: &WorkSession) -> SessionLabels {
        SessionLabels::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionLabels {
    pub project: Option<String>,
    pub component: Option<String>,
    pub process: Option<String>,
    pub assembler: Option<String>,
}

/// What the router did with one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    Notified(NotificationId),
    /// Already notified for this session; nothing new was written.
    Duplicate,
    NotQualifying,
    /// The owner completed their own session.
    SelfCompletion,
    /// Owner lookup failed; the event is not retried.
    Dropped,
    /// Store error while appending the notification.
    Failed,
}

/// The completed session if `event` is the transition into `completed`.
pub fn completion_of(event: &ChangeEvent) -> Option<&WorkSession> {
    if event.kind != ChangeKind::Updated {
        return None;
    }
    let session = event.session()?;
    if !session.is_completed() {
        return None;
    }
    if event.previous_session().is_some_and(|p| p.is_completed()) {
        return None;
    }
    Some(session)
}

#[derive(Clone)]
pub struct NotificationRouter {
    notifications: NotificationStore,
    resolver: Arc<dyn ProjectResolver>,
    transport: Arc<dyn DeliveryTransport>,
}

impl NotificationRouter {
    pub fn new(
        notifications: NotificationStore,
        resolver: Arc<dyn ProjectResolver>,
        transport: Arc<dyn DeliveryTransport>,
    ) -> Self {
        Self {
            notifications,
            resolver,
            transport,
        }
    }

    /// Route one feed event. Never fails: problems are logged and the
    /// event is skipped.
    pub fn handle(&self, event: &ChangeEvent) -> RouteOutcome {
        match completion_of(event) {
            Some(session) => self.notify_owner(session),
            None => RouteOutcome::NotQualifying,
        }
    }

    /// Catch-up after missed events: make sure every completed session has
    /// its owner notification. Returns how many were newly created.
    pub fn reconcile(&self, completed: &[WorkSession]) -> usize {
        completed
            .iter()
            .filter(|s| s.is_completed())
            .map(|s| self.notify_owner(s))
            .filter(|outcome| matches!(outcome, RouteOutcome::Notified(_)))
            .count()
    }

    fn notify_owner(&self, session: &WorkSession) -> RouteOutcome {
        let owner = match self.resolver.project_owner(&session.project_id) {
            Ok(owner) => owner,
            Err(e) => {
                warn!(
                    session = %session.id,
                    project = %session.project_id,
                    error = %e,
                    "dropping completion: owner lookup failed"
                );
                return RouteOutcome::Dropped;
            }
        };

        if owner == session.assembler_id {
            debug!(session = %session.id, "owner completed own session, not notifying");
            return RouteOutcome::SelfCompletion;
        }

        let notification = Notification::work_completed(owner.clone(), session.clone(), Utc::now());
        match self.notifications.record(&notification) {
            Ok(true) => {
                let labels = self.resolver.session_labels(session);
                let request = compose_completion(&owner, session, &labels);
                if let Err(e) = self.transport.send(request) {
                    warn!(notification = %notification.id, error = %e, "delivery transport failed");
                }
                info!(
                    notification = %notification.id,
                    recipient = %owner,
                    session = %session.id,
                    "work_completed notification created"
                );
                RouteOutcome::Notified(notification.id)
            }
            Ok(false) => {
                debug!(session = %session.id, recipient = %owner, "duplicate completion ignored");
                RouteOutcome::Duplicate
            }
            Err(e) => {
                error!(session = %session.id, error = %e, "cannot record notification");
                RouteOutcome::Failed
            }
        }
    }

    /// Long-lived consumer loop. Exits when the feed closes or `shutdown`
    /// flips, after routing everything already buffered.
    pub async fn run(
        self,
        mut feed: broadcast::Receiver<ChangeEvent>,
        sessions: Arc<SessionStore>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        debug!("notification router started");
        // Completions committed while no router was running (or whose
        // record failed) are only visible in the store.
        self.reconcile_from_store(&sessions).await;
        loop {
            tokio::select! {
                biased;
                received = feed.recv() => match received {
                    Ok(event) => self.route_blocking(event).await,
                    Err(RecvError::Lagged(missed)) => self.catch_up(&sessions, missed).await,
                    Err(RecvError::Closed) => break,
                },
                _ = shutdown.changed() => {
                    let (pending, missed) = drain_ready(&mut feed);
                    for event in pending {
                        self.route_blocking(event).await;
                    }
                    if missed > 0 {
                        self.catch_up(&sessions, missed).await;
                    }
                    break;
                }
            }
        }
        debug!("notification router stopped");
    }

    // Store access is synchronous; keep it off the async workers.
    async fn route_blocking(&self, event: ChangeEvent) {
        if completion_of(&event).is_none() {
            return;
        }
        let router = self.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || router.handle(&event)).await {
            error!(error = %e, "router worker panicked");
        }
    }

    async fn catch_up(&self, sessions: &Arc<SessionStore>, missed: u64) {
        warn!(missed, "router lagged behind the change feed, reconciling from store");
        self.reconcile_from_store(sessions).await;
    }

    async fn reconcile_from_store(&self, sessions: &Arc<SessionStore>) {
        let router = self.clone();
        let sessions = Arc::clone(sessions);
        let joined = tokio::task::spawn_blocking(move || {
            sessions
                .completed_sessions()
                .map(|completed| router.reconcile(&completed))
        })
        .await;

        match joined {
            Ok(Ok(0)) => debug!("reconciliation found nothing to notify"),
            Ok(Ok(created)) => info!(created, "reconciliation finished"),
            Ok(Err(e)) => error!(error = %e, "reconciliation read failed"),
            Err(e) => error!(error = %e, "router worker panicked"),
        }
    }
}
