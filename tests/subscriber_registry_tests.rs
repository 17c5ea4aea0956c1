use chrono::Utc;
use shopfloor::core::registry::{SubscriberRegistry, SubscriptionFilter};
use shopfloor::models::change_event::ChangeEvent;
use shopfloor::models::ids::{ComponentId, ConnectionId, ProcessId, ProjectId, UserId};
use shopfloor::models::work_session::WorkSession;
use std::time::{Duration, Instant};

const WINDOW: Duration = Duration::from_secs(30);

fn session_event(project: &str, assembler: &str) -> ChangeEvent {
    ChangeEvent::session_created(WorkSession::begin(
        ProjectId::from(project),
        ComponentId::from("c1"),
        ProcessId::from("pr1"),
        UserId::from(assembler),
        Utc::now(),
    ))
}

fn conn(id: &str) -> ConnectionId {
    ConnectionId::from(id)
}

#[test]
fn matching_respects_filters() {
    let registry = SubscriberRegistry::new(WINDOW, 8);
    let _all = registry.register(conn("all"), SubscriptionFilter::All);
    let _p1 = registry.register(conn("p1"), SubscriptionFilter::Project(ProjectId::from("p1")));
    let _a2 = registry.register(conn("a2"), SubscriptionFilter::Assembler(UserId::from("a2")));

    let hits = registry.matching(&session_event("p1", "a1"));
    assert!(hits.contains(&conn("all")));
    assert!(hits.contains(&conn("p1")));
    assert!(!hits.contains(&conn("a2")));

    let hits = registry.matching(&session_event("p9", "a2"));
    assert_eq!(hits.len(), 2);
    assert!(hits.contains(&conn("a2")));
}

#[test]
fn dispatch_delivers_to_matching_handles() {
    let registry = SubscriberRegistry::new(WINDOW, 8);
    let mut p1 = registry.register(conn("p1"), SubscriptionFilter::Project(ProjectId::from("p1")));
    let mut other = registry.register(conn("p2"), SubscriptionFilter::Project(ProjectId::from("p2")));

    let event = session_event("p1", "a1");
    assert_eq!(registry.dispatch(&event), 1);

    assert_eq!(p1.try_recv(), Some(event));
    assert_eq!(other.try_recv(), None);
}

#[test]
fn unregister_stops_in_flight_deliveries() {
    let registry = SubscriberRegistry::new(WINDOW, 8);
    let mut handle = registry.register(conn("c"), SubscriptionFilter::All);

    // Already buffered when the viewer disconnects.
    registry.dispatch(&session_event("p1", "a1"));
    assert!(registry.unregister(&conn("c")));

    assert!(!handle.is_active());
    assert_eq!(handle.try_recv(), None);
    assert_eq!(registry.dispatch(&session_event("p1", "a1")), 0);
    assert!(!registry.unregister(&conn("c")));
}

#[test]
fn missed_heartbeats_expire_subscriptions() {
    let registry = SubscriberRegistry::new(WINDOW, 8);
    let t0 = Instant::now();
    let mut stale = registry.register_at(conn("stale"), SubscriptionFilter::All, t0);
    let _fresh = registry.register_at(conn("fresh"), SubscriptionFilter::All, t0);

    let t1 = t0 + Duration::from_secs(20);
    assert!(registry.heartbeat_at(&conn("fresh"), t1));

    let t2 = t0 + Duration::from_secs(40);
    assert_eq!(registry.matching_at(&session_event("p", "a"), t2).len(), 1);
    assert_eq!(registry.purge_expired_at(t2), 1);
    assert!(!registry.contains(&conn("stale")));
    assert!(registry.contains(&conn("fresh")));
    assert_eq!(stale.try_recv(), None);

    // Too late: a heartbeat cannot revive it.
    assert!(!registry.heartbeat_at(&conn("stale"), t2));
}

#[test]
fn dispatch_purges_expired_before_delivering() {
    let registry = SubscriberRegistry::new(WINDOW, 8);
    let t0 = Instant::now();
    let mut handle = registry.register_at(conn("c"), SubscriptionFilter::All, t0);

    let delivered = registry.dispatch_at(&session_event("p", "a"), t0 + WINDOW * 2);
    assert_eq!(delivered, 0);
    assert!(registry.is_empty());
    assert!(!handle.is_active());
    assert_eq!(handle.try_recv(), None);
}

#[test]
fn heartbeat_after_expiry_purges() {
    let registry = SubscriberRegistry::new(Duration::from_millis(10), 8);
    let t0 = Instant::now();
    let _h = registry.register_at(conn("c"), SubscriptionFilter::All, t0);
    assert!(!registry.heartbeat_at(&conn("c"), t0 + Duration::from_secs(1)));
    assert_eq!(registry.len(), 0);
}

#[test]
fn slow_subscriber_is_disconnected_when_buffer_fills() {
    let registry = SubscriberRegistry::new(WINDOW, 2);
    let mut slow = registry.register(conn("slow"), SubscriptionFilter::All);
    let mut fast = registry.register(conn("fast"), SubscriptionFilter::All);

    for _ in 0..2 {
        registry.dispatch(&session_event("p", "a"));
        assert!(fast.try_recv().is_some());
    }
    registry.dispatch(&session_event("p", "a"));

    assert!(!registry.contains(&conn("slow")));
    assert!(registry.contains(&conn("fast")));
    assert_eq!(slow.try_recv(), None);
}

#[test]
fn re_registering_replaces_the_old_handle() {
    let registry = SubscriberRegistry::new(WINDOW, 8);
    let old = registry.register(conn("c"), SubscriptionFilter::All);
    let mut new = registry.register(conn("c"), SubscriptionFilter::All);

    assert!(!old.is_active());
    assert_eq!(registry.len(), 1);
    registry.dispatch(&session_event("p", "a"));
    assert!(new.try_recv().is_some());
}

#[tokio::test]
async fn handle_recv_ends_after_unregister() {
    let registry = SubscriberRegistry::new(WINDOW, 8);
    let mut handle = registry.register(conn("c"), SubscriptionFilter::All);

    let event = session_event("p", "a");
    registry.dispatch(&event);
    assert_eq!(handle.recv().await, Some(event));

    registry.unregister(&conn("c"));
    assert_eq!(handle.recv().await, None);
}
