use super::ids::{NotificationId, SessionId, UserId};
use super::work_session::WorkSession;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    WorkCompleted,
}

impl NotificationKind {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            NotificationKind::WorkCompleted => "work_completed",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "work_completed" => Some(NotificationKind::WorkCompleted),
            _ => None,
        }
    }
}

/// Durable "recipient X should be told about event Y" record.
/// At most one exists per (recipient_id, session_id, kind).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub recipient_id: UserId,
    pub kind: NotificationKind,
    pub payload: WorkSession,
    pub created_at: DateTime<Utc>,
    pub delivered: bool,
    pub read: bool,
}

impl Notification {
    pub fn work_completed(recipient_id: UserId, session: WorkSession, now: DateTime<Utc>) -> Self {
        Self {
            id: NotificationId::generate(),
            recipient_id,
            kind: NotificationKind::WorkCompleted,
            payload: session,
            created_at: now,
            delivered: false,
            read: false,
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.payload.id
    }
}

/// What the delivery transport (email etc.) is asked to send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryRequest {
    pub recipient_id: UserId,
    pub subject: String,
    pub body: String,
}
