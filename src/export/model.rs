use crate::models::project::{Component, Process, Project, User};
use crate::models::work_session::WorkSession;
use serde::Serialize;
use std::collections::HashMap;

/// Flat row for CSV / JSON work-history export.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct SessionExport {
    pub id: String,
    pub project: String,
    pub component: String,
    pub process: String,
    pub assembler: String,
    pub status: String,
    pub start_time: String,
    pub end_time: String,
    pub parts_completed: u32,
    pub duration_minutes: Option<i64>,
}

/// Id → display name lookups; unknown ids export as themselves.
#[derive(Default)]
pub(crate) struct NameIndex {
    pub projects: HashMap<String, String>,
    pub components: HashMap<String, String>,
    pub processes: HashMap<String, String>,
    pub users: HashMap<String, String>,
}

impl NameIndex {
    pub fn build(projects: &[Project], components: &[Component], processes: &[Process], users: &[User]) -> Self {
        Self {
            projects: projects.iter().map(|p| (p.id.to_string(), p.name.clone())).collect(),
            components: components.iter().map(|c| (c.id.to_string(), c.name.clone())).collect(),
            processes: processes.iter().map(|p| (p.id.to_string(), p.name.clone())).collect(),
            users: users.iter().map(|u| (u.id.to_string(), u.name.clone())).collect(),
        }
    }
}

fn lookup(map: &HashMap<String, String>, id: &str) -> String {
    map.get(id).cloned().unwrap_or_else(|| id.to_string())
}

pub(crate) fn session_to_row(s: &WorkSession, names: &NameIndex) -> SessionExport {
    SessionExport {
        id: s.id.to_string(),
        project: lookup(&names.projects, s.project_id.as_str()),
        component: lookup(&names.components, s.component_id.as_str()),
        process: lookup(&names.processes, s.process_id.as_str()),
        assembler: lookup(&names.users, s.assembler_id.as_str()),
        status: s.status.to_db_str().to_string(),
        start_time: s.start_time.to_rfc3339(),
        end_time: s.end_time.map(|t| t.to_rfc3339()).unwrap_or_default(),
        parts_completed: s.parts_completed,
        duration_minutes: s.duration_minutes,
    }
}
