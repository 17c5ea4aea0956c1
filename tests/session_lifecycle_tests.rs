use shopfloor::core::feed::drain_ready;
use shopfloor::core::router::{NotificationRouter, ProjectResolver, RouteOutcome};
use shopfloor::core::delivery::RecordingTransport;
use shopfloor::errors::AppError;
use shopfloor::models::change_event::ChangeKind;
use shopfloor::models::ids::{ComponentId, ProjectId, SessionId, UserId};
use shopfloor::models::notification::NotificationKind;
use shopfloor::models::session_status::SessionStatus;
use std::sync::Arc;

mod common;
use common::{open_services, seed, setup_test_db};

#[test]
fn start_creates_in_progress_session() {
    let db = setup_test_db("lifecycle_start");
    let services = open_services(&db);
    let s = seed(&services);

    let id = services
        .store
        .start(&s.project, &s.components[0], &s.process, &s.assembler)
        .expect("start");

    let row = services.store.get(&id).expect("get");
    assert_eq!(row.status, SessionStatus::InProgress);
    assert_eq!(row.parts_completed, 0);
    assert!(row.end_time.is_none());
    assert!(row.duration_minutes.is_none());
    assert_eq!(row.version, 1);
    assert!(row.is_consistent());
}

#[test]
fn progress_then_end_scenario_notifies_owner_once() {
    let db = setup_test_db("lifecycle_scenario");
    let services = open_services(&db);
    let s = seed(&services);
    let mut feed = services.feed.subscribe();

    let transport = Arc::new(RecordingTransport::default());
    let resolver: Arc<dyn ProjectResolver> = services.directory.clone();
    let router = NotificationRouter::new(services.notifications.clone(), resolver, transport.clone());

    let id = services
        .store
        .start(&s.project, &s.components[0], &s.process, &s.assembler)
        .unwrap();

    let row = services.store.update_progress(&id, 5).unwrap();
    assert_eq!(row.parts_completed, 5);
    assert_eq!(row.status, SessionStatus::InProgress);

    let row = services.store.end(&id, 10).unwrap();
    assert_eq!(row.status, SessionStatus::Completed);
    assert_eq!(row.parts_completed, 10);
    assert!(row.end_time.is_some());
    assert_eq!(row.duration_minutes, Some(0));

    let (events, missed) = drain_ready(&mut feed);
    assert_eq!(missed, 0);
    let outcomes: Vec<RouteOutcome> = events.iter().map(|e| router.handle(e)).collect();
    assert_eq!(
        outcomes.iter().filter(|o| matches!(o, RouteOutcome::Notified(_))).count(),
        1
    );

    let notes = services.notifications.for_session(&id).unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].recipient_id, s.lead);
    assert_eq!(notes[0].kind, NotificationKind::WorkCompleted);
    assert_eq!(notes[0].payload.parts_completed, 10);
    assert_eq!(transport.sent().len(), 1);

    // Second end fails and nothing new is routed.
    let err = services.store.end(&id, 10).unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition { .. }));
    let (events, _) = drain_ready(&mut feed);
    assert!(events.is_empty());
    assert_eq!(services.notifications.for_session(&id).unwrap().len(), 1);
}

#[test]
fn end_on_completed_leaves_row_unchanged() {
    let db = setup_test_db("lifecycle_end_twice");
    let services = open_services(&db);
    let s = seed(&services);

    let id = services
        .store
        .start(&s.project, &s.components[1], &s.process, &s.assembler)
        .unwrap();
    let completed = services.store.end(&id, 7).unwrap();

    for attempt in [services.store.end(&id, 99), services.store.update_progress(&id, 99)] {
        assert!(matches!(attempt, Err(AppError::InvalidTransition { .. })));
    }
    assert!(matches!(services.store.pause(&id), Err(AppError::InvalidTransition { .. })));
    assert!(matches!(services.store.resume(&id), Err(AppError::InvalidTransition { .. })));

    assert_eq!(services.store.get(&id).unwrap(), completed);
}

#[test]
fn pause_resume_and_progress_while_paused() {
    let db = setup_test_db("lifecycle_pause");
    let services = open_services(&db);
    let s = seed(&services);

    let id = services
        .store
        .start(&s.project, &s.components[0], &s.process, &s.assembler)
        .unwrap();

    assert_eq!(services.store.pause(&id).unwrap().status, SessionStatus::Paused);
    assert!(matches!(services.store.pause(&id), Err(AppError::InvalidTransition { .. })));

    let row = services.store.update_progress(&id, 3).unwrap();
    assert_eq!(row.status, SessionStatus::Paused);
    assert_eq!(row.parts_completed, 3);

    assert_eq!(services.store.resume(&id).unwrap().status, SessionStatus::InProgress);
    assert!(matches!(services.store.resume(&id), Err(AppError::InvalidTransition { .. })));

    // A paused session can be ended directly.
    services.store.pause(&id).unwrap();
    let row = services.store.end(&id, 4).unwrap();
    assert_eq!(row.status, SessionStatus::Completed);
    assert_eq!(row.version, 7);
}

#[test]
fn every_transition_publishes_one_ordered_event() {
    let db = setup_test_db("lifecycle_events");
    let services = open_services(&db);
    let s = seed(&services);
    let mut feed = services.feed.subscribe();

    let id = services
        .store
        .start(&s.project, &s.components[0], &s.process, &s.assembler)
        .unwrap();
    services.store.update_progress(&id, 1).unwrap();
    services.store.pause(&id).unwrap();
    services.store.resume(&id).unwrap();
    services.store.end(&id, 2).unwrap();
    let _ = services.store.end(&id, 3);

    let (events, _) = drain_ready(&mut feed);
    assert_eq!(events.len(), 5);
    assert_eq!(events[0].kind, ChangeKind::Created);
    assert!(events.iter().all(|e| e.entity_id() == id.as_str()));
    let sequences: Vec<u64> = events.iter().map(|e| e.sequence).collect();
    assert_eq!(sequences, vec![1, 2, 3, 4, 5]);

    let last = events.last().unwrap();
    assert_eq!(last.previous_session().unwrap().status, SessionStatus::InProgress);
    assert_eq!(last.session().unwrap().status, SessionStatus::Completed);
}

#[test]
fn unknown_references_are_rejected() {
    let db = setup_test_db("lifecycle_refs");
    let services = open_services(&db);
    let s = seed(&services);
    let store = &services.store;

    let bad_project = store.start(&ProjectId::from("nope"), &s.components[0], &s.process, &s.assembler);
    assert!(matches!(bad_project, Err(AppError::InvalidReference(_))));

    let bad_component = store.start(&s.project, &ComponentId::from("nope"), &s.process, &s.assembler);
    assert!(matches!(bad_component, Err(AppError::InvalidReference(_))));

    let bad_assembler = store.start(&s.project, &s.components[0], &s.process, &UserId::from("nope"));
    assert!(matches!(bad_assembler, Err(AppError::InvalidReference(_))));

    // Component from another project.
    let other = services.directory.create_project("Other", 1, &s.lead).unwrap();
    let foreign = services.directory.add_component(&other, "Bolt", 1).unwrap();
    let mismatch = store.start(&s.project, &foreign, &s.process, &s.assembler);
    assert!(matches!(mismatch, Err(AppError::InvalidReference(_))));

    assert!(store.all().unwrap().is_empty());
}

#[test]
fn unknown_session_and_negative_parts() {
    let db = setup_test_db("lifecycle_inputs");
    let services = open_services(&db);
    let s = seed(&services);

    let missing = SessionId::from("missing");
    assert!(matches!(services.store.get(&missing), Err(AppError::NotFound(_))));
    assert!(matches!(services.store.end(&missing, 1), Err(AppError::NotFound(_))));

    let id = services
        .store
        .start(&s.project, &s.components[0], &s.process, &s.assembler)
        .unwrap();
    assert!(matches!(
        services.store.update_progress(&id, -1),
        Err(AppError::InvalidInput(_))
    ));
    assert!(matches!(services.store.end(&id, -5), Err(AppError::InvalidInput(_))));
    assert_eq!(services.store.get(&id).unwrap().version, 1);
}

#[test]
fn duplicate_starts_are_distinct_sessions() {
    let db = setup_test_db("lifecycle_dup_start");
    let services = open_services(&db);
    let s = seed(&services);

    let a = services
        .store
        .start(&s.project, &s.components[0], &s.process, &s.assembler)
        .unwrap();
    let b = services
        .store
        .start(&s.project, &s.components[0], &s.process, &s.assembler)
        .unwrap();

    assert_ne!(a, b);
    assert_eq!(services.store.active_for_assembler(&s.assembler).unwrap().len(), 2);
}

#[test]
fn read_api_filters_by_assembler_and_status() {
    let db = setup_test_db("lifecycle_reads");
    let services = open_services(&db);
    let s = seed(&services);
    let other = services
        .directory
        .create_user("Bo", "", shopfloor::models::role::Role::Assembler)
        .unwrap();

    let mine = services
        .store
        .start(&s.project, &s.components[0], &s.process, &s.assembler)
        .unwrap();
    let done = services
        .store
        .start(&s.project, &s.components[1], &s.process, &s.assembler)
        .unwrap();
    services.store.end(&done, 1).unwrap();
    services
        .store
        .start(&s.project, &s.components[2], &s.process, &other)
        .unwrap();

    let active: Vec<SessionId> = services
        .store
        .active_for_assembler(&s.assembler)
        .unwrap()
        .into_iter()
        .map(|w| w.id)
        .collect();
    assert_eq!(active, vec![mine]);

    assert_eq!(services.store.history_for_assembler(&s.assembler).unwrap().len(), 2);
    assert_eq!(services.store.sessions_for_project(&s.project).unwrap().len(), 3);

    let completed = services.store.completed_sessions().unwrap();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].id, done);
}
