use chrono::{Duration, TimeZone, Utc};
use shopfloor::core::analytics::{assembler_performance, dashboard_summary, project_analytics};
use shopfloor::errors::AppError;
use shopfloor::models::ids::{ComponentId, ProcessId, ProjectId, UserId};
use shopfloor::models::project::{Component, Project, ProjectStatus};
use shopfloor::models::session_status::SessionStatus;
use shopfloor::models::work_session::WorkSession;

mod common;
use common::{open_services, seed, setup_test_db};

fn component(project: &str, id: &str) -> Component {
    Component {
        id: ComponentId::from(id),
        project_id: ProjectId::from(project),
        name: id.to_uppercase(),
        quantity: 10,
    }
}

fn session(project: &str, component: &str, assembler: &str, minutes_ago: i64) -> WorkSession {
    let start = Utc::now() - Duration::minutes(minutes_ago);
    WorkSession::begin(
        ProjectId::from(project),
        ComponentId::from(component),
        ProcessId::from("assembly"),
        UserId::from(assembler),
        start,
    )
}

fn completed(project: &str, component: &str, assembler: &str, minutes: i64) -> WorkSession {
    let mut s = session(project, component, assembler, minutes);
    let end = s.start_time + Duration::minutes(minutes);
    s.complete(5, end);
    s
}

fn project(id: &str, status: ProjectStatus) -> Project {
    let now = Utc::now();
    Project {
        id: ProjectId::from(id),
        name: id.to_string(),
        total_quantity: 0,
        status,
        created_by: UserId::from("lead"),
        version: 1,
        created_at: now,
        updated_at: now,
    }
}

#[test]
fn one_of_four_components_completed_is_25_percent() {
    let components: Vec<Component> = ["c1", "c2", "c3", "c4"]
        .iter()
        .map(|c| component("p1", c))
        .collect();
    let sessions = vec![
        completed("p1", "c1", "a1", 90),
        // A second completed session on the same component counts once.
        completed("p1", "c1", "a2", 30),
        session("p1", "c2", "a1", 10),
    ];

    let rollup = project_analytics(&ProjectId::from("p1"), &components, &sessions);
    assert_eq!(rollup.total_components, 4);
    assert_eq!(rollup.completed_components, 1);
    assert!((rollup.overall_progress - 25.0).abs() < f64::EPSILON);
    assert_eq!(rollup.active_assemblers, 1);
    assert!((rollup.total_hours - 2.0).abs() < 1e-9);
}

#[test]
fn project_without_components_reports_zero_progress() {
    let sessions = vec![completed("p1", "ghost", "a1", 60)];
    let rollup = project_analytics(&ProjectId::from("p1"), &[], &sessions);
    assert_eq!(rollup.total_components, 0);
    assert_eq!(rollup.completed_components, 0);
    assert_eq!(rollup.overall_progress, 0.0);
}

#[test]
fn other_projects_are_ignored() {
    let components = vec![component("p1", "c1"), component("p2", "c9")];
    let sessions = vec![
        completed("p2", "c9", "a1", 60),
        session("p2", "c9", "a2", 5),
    ];
    let rollup = project_analytics(&ProjectId::from("p1"), &components, &sessions);
    assert_eq!(rollup.total_components, 1);
    assert_eq!(rollup.completed_components, 0);
    assert_eq!(rollup.active_assemblers, 0);
    assert_eq!(rollup.total_hours, 0.0);
}

#[test]
fn paused_sessions_do_not_count_as_active() {
    let mut paused = session("p1", "c1", "a3", 5);
    paused.status = SessionStatus::Paused;
    let sessions = vec![paused, session("p1", "c1", "a1", 5), session("p1", "c2", "a1", 5)];

    let rollup = project_analytics(&ProjectId::from("p1"), &[component("p1", "c1")], &sessions);
    assert_eq!(rollup.active_assemblers, 1);
}

#[test]
fn performance_is_oldest_first_and_filtered() {
    let mut late = session("p1", "c1", "a1", 0);
    late.created_at = Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap();
    late.parts_completed = 7;
    let mut early = session("p1", "c2", "a1", 0);
    early.created_at = Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap();
    early.parts_completed = 3;
    let other = session("p1", "c3", "a2", 0);

    let points = assembler_performance(&UserId::from("a1"), &[late, other, early]);
    let parts: Vec<u32> = points.iter().map(|p| p.parts_completed).collect();
    assert_eq!(parts, vec![3, 7]);
    assert!(points[0].created_at < points[1].created_at);
}

#[test]
fn dashboard_counts_active_projects_and_operators() {
    let projects = vec![
        project("p1", ProjectStatus::Active),
        project("p2", ProjectStatus::Paused),
        project("p3", ProjectStatus::Active),
    ];
    let components = vec![component("p1", "c1"), component("p1", "c2"), component("p3", "c3")];
    let sessions = vec![
        session("p1", "c1", "a1", 5),
        session("p3", "c3", "a1", 5),
        session("p3", "c3", "a2", 5),
        completed("p1", "c2", "a3", 30),
    ];

    let summary = dashboard_summary(&projects, &components, &sessions);
    assert_eq!(summary.active_projects, 2);
    assert_eq!(summary.total_components, 3);
    assert_eq!(summary.active_assemblers, 2);
}

#[test]
fn services_rollup_reads_current_store_state() {
    let db = setup_test_db("analytics_services");
    let services = open_services(&db);
    let s = seed(&services);

    let id = services
        .store
        .start(&s.project, &s.components[0], &s.process, &s.assembler)
        .unwrap();
    let rollup = services.project_analytics(&s.project).unwrap();
    assert_eq!(rollup.total_components, 4);
    assert_eq!(rollup.active_assemblers, 1);
    assert_eq!(rollup.overall_progress, 0.0);

    services.store.end(&id, 10).unwrap();
    let rollup = services.project_analytics(&s.project).unwrap();
    assert_eq!(rollup.completed_components, 1);
    assert!((rollup.overall_progress - 25.0).abs() < f64::EPSILON);
    assert_eq!(rollup.active_assemblers, 0);

    let points = services.assembler_performance(&s.assembler).unwrap();
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].parts_completed, 10);

    let summary = services.dashboard_summary().unwrap();
    assert_eq!(summary.active_projects, 1);
    assert_eq!(summary.total_components, 4);
}

#[test]
fn unknown_project_rollup_is_not_found() {
    let db = setup_test_db("analytics_unknown");
    let services = open_services(&db);
    let err = services
        .project_analytics(&ProjectId::from("nope"))
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}
