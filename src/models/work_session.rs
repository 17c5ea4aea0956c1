use super::ids::{ComponentId, ProcessId, ProjectId, SessionId, UserId};
use super::session_status::SessionStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One bounded unit of work by one operator against one project component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkSession {
    pub id: SessionId,
    pub project_id: ProjectId,
    pub component_id: ComponentId,
    pub process_id: ProcessId,
    pub assembler_id: UserId,
    pub status: SessionStatus,
    pub start_time: DateTime<Utc>,         // immutable after creation
    pub end_time: Option<DateTime<Utc>>,   // set only when completed
    pub parts_completed: u32,
    pub duration_minutes: Option<i64>,     // end_time - start_time, whole minutes
    pub version: u64,                      // per-session change sequence, 1 on creation
    pub created_at: DateTime<Utc>,
}

impl WorkSession {
    /// A freshly started session: in progress, nothing completed yet.
    pub fn begin(
        project_id: ProjectId,
        component_id: ComponentId,
        process_id: ProcessId,
        assembler_id: UserId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: SessionId::generate(),
            project_id,
            component_id,
            process_id,
            assembler_id,
            status: SessionStatus::InProgress,
            start_time: now,
            end_time: None,
            parts_completed: 0,
            duration_minutes: None,
            version: 1,
            created_at: now,
        }
    }

    /// `status == completed` exactly when `end_time` is set.
    pub fn is_consistent(&self) -> bool {
        (self.status == SessionStatus::Completed) == self.end_time.is_some()
            && self.end_time.is_some() == self.duration_minutes.is_some()
    }

    pub fn is_completed(&self) -> bool {
        self.status == SessionStatus::Completed
    }

    /// Close the session at `now`.
    pub fn complete(&mut self, parts_completed: u32, now: DateTime<Utc>) {
        self.status = SessionStatus::Completed;
        self.parts_completed = parts_completed;
        self.end_time = Some(now);
        self.duration_minutes = Some((now - self.start_time).num_minutes());
    }
}
