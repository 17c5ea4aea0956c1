use super::ids::{ProjectId, UserId};
use super::project::Project;
use super::work_session::WorkSession;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Session,
    Project,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Created => "created",
            ChangeKind::Updated => "updated",
            ChangeKind::Deleted => "deleted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entity", content = "row", rename_all = "snake_case")]
pub enum Snapshot {
    Session(WorkSession),
    Project(Project),
}

impl Snapshot {
    pub fn entity(&self) -> EntityKind {
        match self {
            Snapshot::Session(_) => EntityKind::Session,
            Snapshot::Project(_) => EntityKind::Project,
        }
    }

    pub fn entity_id(&self) -> &str {
        match self {
            Snapshot::Session(s) => s.id.as_str(),
            Snapshot::Project(p) => p.id.as_str(),
        }
    }

    pub fn project_id(&self) -> &ProjectId {
        match self {
            Snapshot::Session(s) => &s.project_id,
            Snapshot::Project(p) => &p.id,
        }
    }
}

/// One committed mutation. `sequence` increases strictly per entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub sequence: u64,
    pub committed_at: DateTime<Utc>,
    /// Row as it was before the mutation; absent for `created`.
    pub previous: Option<Snapshot>,
    pub snapshot: Snapshot,
}

impl ChangeEvent {
    pub fn session_created(session: WorkSession) -> Self {
        Self {
            kind: ChangeKind::Created,
            sequence: session.version,
            committed_at: session.created_at,
            previous: None,
            snapshot: Snapshot::Session(session),
        }
    }

    pub fn session_updated(previous: WorkSession, current: WorkSession, at: DateTime<Utc>) -> Self {
        Self {
            kind: ChangeKind::Updated,
            sequence: current.version,
            committed_at: at,
            previous: Some(Snapshot::Session(previous)),
            snapshot: Snapshot::Session(current),
        }
    }

    pub fn project_changed(
        kind: ChangeKind,
        previous: Option<Project>,
        current: Project,
    ) -> Self {
        Self {
            kind,
            sequence: current.version,
            committed_at: current.updated_at,
            previous: previous.map(Snapshot::Project),
            snapshot: Snapshot::Project(current),
        }
    }

    pub fn entity(&self) -> EntityKind {
        self.snapshot.entity()
    }

    pub fn entity_id(&self) -> &str {
        self.snapshot.entity_id()
    }

    pub fn project_id(&self) -> &ProjectId {
        self.snapshot.project_id()
    }

    pub fn session(&self) -> Option<&WorkSession> {
        match &self.snapshot {
            Snapshot::Session(s) => Some(s),
            Snapshot::Project(_) => None,
        }
    }

    pub fn previous_session(&self) -> Option<&WorkSession> {
        match &self.previous {
            Some(Snapshot::Session(s)) => Some(s),
            _ => None,
        }
    }

    /// Operator owning the session; `None` for project events.
    pub fn assembler_id(&self) -> Option<&UserId> {
        self.session().map(|s| &s.assembler_id)
    }
}
