//! Read-only rollups recomputed from the current session snapshot.
//!
//! Everything here is a pure function of its inputs: no store access, no
//! caching. Missing or partial component data counts as zero instead of
//! failing.

use crate::models::ids::{ComponentId, ProjectId, UserId};
use crate::models::project::{Component, Project, ProjectStatus};
use crate::models::session_status::SessionStatus;
use crate::models::work_session::WorkSession;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectAnalytics {
    pub project_id: ProjectId,
    pub total_components: usize,
    pub completed_components: usize,
    /// Percentage in `[0, 100]`.
    pub overall_progress: f64,
    pub active_assemblers: usize,
    pub total_hours: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformancePoint {
    pub created_at: DateTime<Utc>,
    pub parts_completed: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub active_projects: usize,
    pub total_components: usize,
    pub active_assemblers: usize,
}

/// Rollup for one project.
///
/// A component counts as completed when at least one completed session of
/// this project covers it. Sessions of other projects are ignored.
pub fn project_analytics(
    project_id: &ProjectId,
    components: &[Component],
    sessions: &[WorkSession],
) -> ProjectAnalytics {
    let known: HashSet<&ComponentId> = components
        .iter()
        .filter(|c| &c.project_id == project_id)
        .map(|c| &c.id)
        .collect();

    let own: Vec<&WorkSession> = sessions
        .iter()
        .filter(|s| &s.project_id == project_id)
        .collect();

    let completed_components = own
        .iter()
        .filter(|s| s.status == SessionStatus::Completed && known.contains(&s.component_id))
        .map(|s| &s.component_id)
        .collect::<HashSet<_>>()
        .len();

    let total_components = known.len();
    let overall_progress = if total_components == 0 {
        0.0
    } else {
        (completed_components as f64 / total_components as f64 * 100.0).clamp(0.0, 100.0)
    };

    let total_minutes: i64 = own
        .iter()
        .filter(|s| s.is_completed())
        .filter_map(|s| s.duration_minutes)
        .map(|m| m.max(0))
        .sum();

    ProjectAnalytics {
        project_id: project_id.clone(),
        total_components,
        completed_components,
        overall_progress,
        active_assemblers: active_assemblers(own.iter().copied()),
        total_hours: total_minutes as f64 / 60.0,
    }
}

/// Parts completed per session for one operator, oldest first.
pub fn assembler_performance(assembler_id: &UserId, sessions: &[WorkSession]) -> Vec<PerformancePoint> {
    let mut points: Vec<PerformancePoint> = sessions
        .iter()
        .filter(|s| &s.assembler_id == assembler_id)
        .map(|s| PerformancePoint {
            created_at: s.created_at,
            parts_completed: s.parts_completed,
        })
        .collect();
    points.sort_by_key(|p| p.created_at);
    points
}

pub fn dashboard_summary(
    projects: &[Project],
    components: &[Component],
    sessions: &[WorkSession],
) -> DashboardSummary {
    DashboardSummary {
        active_projects: projects
            .iter()
            .filter(|p| p.status == ProjectStatus::Active)
            .count(),
        total_components: components.len(),
        active_assemblers: active_assemblers(sessions.iter()),
    }
}

fn active_assemblers<'a>(sessions: impl Iterator<Item = &'a WorkSession>) -> usize {
    sessions
        .filter(|s| s.status == SessionStatus::InProgress)
        .map(|s| &s.assembler_id)
        .collect::<HashSet<_>>()
        .len()
}
