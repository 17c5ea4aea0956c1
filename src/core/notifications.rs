//! Notification table access. The router appends; recipients' clients mark
//! `delivered` / `read` by id.

use crate::db::log::ttlog_best_effort;
use crate::db::pool::DbPool;
use crate::db::queries::{self, NotificationFlag};
use crate::db::retry::{RetryPolicy, with_retry};
use crate::errors::{AppError, AppResult};
use crate::models::ids::{NotificationId, SessionId, UserId};
use crate::models::notification::Notification;
use std::sync::Arc;

#[derive(Clone)]
pub struct NotificationStore {
    pool: Arc<DbPool>,
    retry: RetryPolicy,
}

impl NotificationStore {
    pub fn new(pool: Arc<DbPool>, retry: RetryPolicy) -> Self {
        Self { pool, retry }
    }

    /// Append unless the (recipient, session, kind) key already exists.
    /// Returns true when this call created the row.
    pub fn record(&self, notification: &Notification) -> AppResult<bool> {
        with_retry(&self.retry, "record_notification", || {
            self.pool.with_conn(|conn| {
                let inserted = queries::insert_notification_if_absent(conn, notification)?;
                if inserted {
                    ttlog_best_effort(
                        conn,
                        "notify",
                        notification.session_id().as_str(),
                        &format!(
                            "{} → {}",
                            notification.kind.to_db_str(),
                            notification.recipient_id
                        ),
                    );
                }
                Ok(inserted)
            })
        })
    }

    /// Newest first.
    pub fn for_recipient(&self, recipient_id: &UserId) -> AppResult<Vec<Notification>> {
        with_retry(&self.retry, "notifications_for", || {
            self.pool
                .with_conn(|conn| queries::notifications_for(conn, recipient_id))
        })
    }

    pub fn for_session(&self, session_id: &SessionId) -> AppResult<Vec<Notification>> {
        with_retry(&self.retry, "notifications_for_session", || {
            self.pool
                .with_conn(|conn| queries::notifications_for_session(conn, session_id))
        })
    }

    pub fn unread_count(&self, recipient_id: &UserId) -> AppResult<u64> {
        with_retry(&self.retry, "unread_count", || {
            self.pool
                .with_conn(|conn| queries::unread_count(conn, recipient_id))
        })
    }

    pub fn mark_delivered(&self, id: &NotificationId) -> AppResult<()> {
        self.mark(id, NotificationFlag::Delivered)
    }

    pub fn mark_read(&self, id: &NotificationId) -> AppResult<()> {
        self.mark(id, NotificationFlag::Read)
    }

    fn mark(&self, id: &NotificationId, flag: NotificationFlag) -> AppResult<()> {
        let found = with_retry(&self.retry, "mark_notification", || {
            self.pool
                .with_conn(|conn| queries::set_notification_flag(conn, id, flag))
        })?;

        if !found {
            return Err(AppError::NotFound(format!("notification {id}")));
        }
        Ok(())
    }
}
