use shopfloor::core::feed::drain_ready;
use shopfloor::errors::AppError;
use shopfloor::models::session_status::SessionStatus;
use std::sync::{Arc, Barrier};
use std::thread;

mod common;
use common::{open_services, seed, setup_test_db};

const WRITERS: usize = 8;

#[test]
fn concurrent_ends_on_one_session_succeed_exactly_once() {
    let db = setup_test_db("concurrency_end");
    let services = open_services(&db);
    let s = seed(&services);
    let id = services
        .store
        .start(&s.project, &s.components[0], &s.process, &s.assembler)
        .unwrap();
    let mut feed = services.feed.subscribe();

    let barrier = Arc::new(Barrier::new(WRITERS));
    let handles: Vec<_> = (0..WRITERS)
        .map(|i| {
            let store = Arc::clone(&services.store);
            let barrier = Arc::clone(&barrier);
            let id = id.clone();
            thread::spawn(move || {
                barrier.wait();
                store.end(&id, 10 + i as i64)
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    let rejected = results
        .iter()
        .filter(|r| matches!(r, Err(AppError::InvalidTransition { .. })))
        .count();

    assert_eq!(winners.len(), 1);
    assert_eq!(rejected, WRITERS - 1);

    let row = services.store.get(&id).unwrap();
    assert_eq!(row.status, SessionStatus::Completed);
    assert_eq!(row.parts_completed, winners[0].parts_completed);

    let (events, _) = drain_ready(&mut feed);
    assert_eq!(events.len(), 1);
}

#[test]
fn concurrent_transitions_on_different_sessions_all_apply() {
    let db = setup_test_db("concurrency_many");
    let services = open_services(&db);
    let s = seed(&services);

    let ids: Vec<_> = (0..WRITERS)
        .map(|i| {
            services
                .store
                .start(&s.project, &s.components[i % 4], &s.process, &s.assembler)
                .unwrap()
        })
        .collect();

    let barrier = Arc::new(Barrier::new(WRITERS));
    let handles: Vec<_> = ids
        .iter()
        .cloned()
        .map(|id| {
            let store = Arc::clone(&services.store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                store.update_progress(&id, 3)?;
                store.pause(&id)?;
                store.end(&id, 5)
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap().expect("transition on own session");
    }

    for id in &ids {
        let row = services.store.get(id).unwrap();
        assert_eq!(row.status, SessionStatus::Completed);
        assert_eq!(row.parts_completed, 5);
        assert!(row.is_consistent());
    }
}

#[test]
fn concurrent_starts_are_all_accepted() {
    let db = setup_test_db("concurrency_start");
    let services = open_services(&db);
    let s = seed(&services);

    let barrier = Arc::new(Barrier::new(WRITERS));
    let handles: Vec<_> = (0..WRITERS)
        .map(|_| {
            let store = Arc::clone(&services.store);
            let barrier = Arc::clone(&barrier);
            let (p, c, pr, a) = (
                s.project.clone(),
                s.components[0].clone(),
                s.process.clone(),
                s.assembler.clone(),
            );
            thread::spawn(move || {
                barrier.wait();
                store.start(&p, &c, &pr, &a)
            })
        })
        .collect();

    let mut ids: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().unwrap().expect("start"))
        .collect();
    ids.sort();
    ids.dedup();

    assert_eq!(ids.len(), WRITERS);
    assert_eq!(services.store.active_for_assembler(&s.assembler).unwrap().len(), WRITERS);
}

#[test]
fn per_session_events_stay_in_sequence_under_contention() {
    let db = setup_test_db("concurrency_order");
    let services = open_services(&db);
    let s = seed(&services);
    let id = services
        .store
        .start(&s.project, &s.components[0], &s.process, &s.assembler)
        .unwrap();
    let mut feed = services.feed.subscribe();

    let barrier = Arc::new(Barrier::new(WRITERS));
    let handles: Vec<_> = (0..WRITERS)
        .map(|i| {
            let store = Arc::clone(&services.store);
            let barrier = Arc::clone(&barrier);
            let id = id.clone();
            thread::spawn(move || {
                barrier.wait();
                store.update_progress(&id, i as i64)
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap().expect("progress");
    }

    let (events, _) = drain_ready(&mut feed);
    let sequences: Vec<u64> = events.iter().map(|e| e.sequence).collect();
    let expected: Vec<u64> = (2..2 + WRITERS as u64).collect();
    assert_eq!(sequences, expected);
}
