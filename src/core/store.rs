//! Session Store: the only writer of work-session rows.
//!
//! Every transition runs in one IMMEDIATE transaction (read, validate, write)
//! while holding a per-session lock, and publishes its change event before
//! the lock is released. That keeps each session's events in sequence order
//! on the feed, and once a session is completed every later attempt fails
//! instead of overwriting it. Transitions on different sessions only
//! contend on SQLite's own short write lock.

use crate::core::feed::ChangeFeed;
use crate::core::lifecycle::{invalid_transition, next_status};
use crate::db::log::ttlog_best_effort;
use crate::db::pool::DbPool;
use crate::db::queries;
use crate::db::retry::{RetryPolicy, with_retry};
use crate::errors::{AppError, AppResult};
use crate::models::change_event::ChangeEvent;
use crate::models::ids::{ComponentId, ProcessId, ProjectId, SessionId, UserId};
use crate::models::session_status::{SessionAction, SessionStatus};
use crate::models::work_session::WorkSession;
use chrono::Utc;
use rusqlite::{Connection, TransactionBehavior};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

pub struct SessionStore {
    pool: Arc<DbPool>,
    feed: ChangeFeed,
    retry: RetryPolicy,
    locks: SessionLocks,
}

impl SessionStore {
    pub fn new(pool: Arc<DbPool>, feed: ChangeFeed, retry: RetryPolicy) -> Self {
        Self {
            pool,
            feed,
            retry,
            locks: SessionLocks::default(),
        }
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    /// Open a new session in `in_progress` with nothing completed.
    ///
    /// Two starts for the same (assembler, component, process) both succeed
    /// as distinct sessions.
    pub fn start(
        &self,
        project_id: &ProjectId,
        component_id: &ComponentId,
        process_id: &ProcessId,
        assembler_id: &UserId,
    ) -> AppResult<SessionId> {
        let draft = WorkSession::begin(
            project_id.clone(),
            component_id.clone(),
            process_id.clone(),
            assembler_id.clone(),
            Utc::now(),
        );

        // Held until the `created` event is on the feed, so no update to the
        // new row can overtake it.
        let handle = self.locks.handle(&draft.id);
        let result = {
            let _guard = handle.lock().unwrap_or_else(PoisonError::into_inner);

            let committed = with_retry(&self.retry, "start", || {
                self.pool.with_conn(|conn| {
                    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                    resolve_references(&tx, project_id, component_id, process_id, assembler_id)?;
                    queries::insert_session(&tx, &draft)?;
                    tx.commit()?;
                    Ok(())
                })
            });

            committed.map(|()| {
                self.audit(
                    "start",
                    &draft.id,
                    &format!(
                        "assembler {} started component {} ({}) on project {}",
                        draft.assembler_id, draft.component_id, draft.process_id, draft.project_id
                    ),
                );
                info!(session = %draft.id, assembler = %draft.assembler_id, "work session started");
                self.feed.publish(ChangeEvent::session_created(draft.clone()));
                draft.id.clone()
            })
        };
        self.locks.release(&draft.id, handle);
        result
    }

    /// Overwrite `parts_completed`. Fails once the session is completed.
    pub fn update_progress(&self, id: &SessionId, parts_completed: i64) -> AppResult<WorkSession> {
        let parts = validate_parts(parts_completed)?;
        self.transition(id, SessionAction::UpdateProgress, Some(parts))
    }

    pub fn pause(&self, id: &SessionId) -> AppResult<WorkSession> {
        self.transition(id, SessionAction::Pause, None)
    }

    pub fn resume(&self, id: &SessionId) -> AppResult<WorkSession> {
        self.transition(id, SessionAction::Resume, None)
    }

    /// Complete the session: stamps `end_time`, fixes `parts_completed` and
    /// derives `duration_minutes`. Only one `end` per session ever succeeds.
    pub fn end(&self, id: &SessionId, parts_completed: i64) -> AppResult<WorkSession> {
        let parts = validate_parts(parts_completed)?;
        self.transition(id, SessionAction::End, Some(parts))
    }

    fn transition(
        &self,
        id: &SessionId,
        action: SessionAction,
        parts: Option<u32>,
    ) -> AppResult<WorkSession> {
        let handle = self.locks.handle(id);
        let result = {
            let _guard = handle.lock().unwrap_or_else(PoisonError::into_inner);
            self.transition_locked(id, action, parts)
        };
        self.locks.release(id, handle);
        result
    }

    fn transition_locked(
        &self,
        id: &SessionId,
        action: SessionAction,
        parts: Option<u32>,
    ) -> AppResult<WorkSession> {
        let (previous, updated) = with_retry(&self.retry, action.as_str(), || {
            self.pool.with_conn(|conn| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

                let previous = queries::load_session(&tx, id)?
                    .ok_or_else(|| AppError::NotFound(format!("work session {id}")))?;

                let next = next_status(previous.status, action)
                    .ok_or_else(|| invalid_transition(id, previous.status, action))?;

                let mut updated = previous.clone();
                updated.version = previous.version + 1;
                match action {
                    SessionAction::End => {
                        updated.complete(parts.unwrap_or(previous.parts_completed), Utc::now())
                    }
                    _ => {
                        updated.status = next;
                        if let Some(p) = parts {
                            updated.parts_completed = p;
                        }
                    }
                }

                if !queries::update_session_guarded(&tx, &updated, previous.version)? {
                    return Err(invalid_transition(id, previous.status, action));
                }

                tx.commit()?;
                Ok((previous, updated))
            })
        })?;

        self.audit(
            action.as_str(),
            id,
            &format!(
                "{} → {} (parts {})",
                previous.status, updated.status, updated.parts_completed
            ),
        );
        debug!(session = %id, action = action.as_str(), status = %updated.status, "transition committed");

        let at = updated.end_time.unwrap_or_else(Utc::now);
        self.feed
            .publish(ChangeEvent::session_updated(previous, updated.clone(), at));
        Ok(updated)
    }

    fn audit(&self, operation: &str, id: &SessionId, message: &str) {
        if let Err(e) = self.pool.with_conn(|conn| {
            ttlog_best_effort(conn, operation, id.as_str(), message);
            Ok(())
        }) {
            warn!(operation, session = %id, error = %e, "audit connection unavailable");
        }
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub fn get(&self, id: &SessionId) -> AppResult<WorkSession> {
        self.read("get", |conn| queries::load_session(conn, id))?
            .ok_or_else(|| AppError::NotFound(format!("work session {id}")))
    }

    /// Sessions currently `in_progress` for an operator.
    pub fn active_for_assembler(&self, assembler_id: &UserId) -> AppResult<Vec<WorkSession>> {
        self.read("active_for_assembler", |conn| {
            queries::sessions_for_assembler(conn, assembler_id, Some(SessionStatus::InProgress))
        })
    }

    /// Every session of an operator, newest first.
    pub fn history_for_assembler(&self, assembler_id: &UserId) -> AppResult<Vec<WorkSession>> {
        self.read("history_for_assembler", |conn| {
            queries::sessions_for_assembler(conn, assembler_id, None)
        })
    }

    pub fn sessions_for_project(&self, project_id: &ProjectId) -> AppResult<Vec<WorkSession>> {
        self.read("sessions_for_project", |conn| {
            queries::sessions_for_project(conn, project_id)
        })
    }

    /// Catch-up read used by consumers that fell behind the feed.
    pub fn completed_sessions(&self) -> AppResult<Vec<WorkSession>> {
        self.read("completed_sessions", |conn| {
            queries::sessions_by_status(conn, SessionStatus::Completed)
        })
    }

    pub fn all(&self) -> AppResult<Vec<WorkSession>> {
        self.read("all_sessions", queries::all_sessions)
    }

    fn read<T, F>(&self, operation: &str, f: F) -> AppResult<T>
    where
        F: Fn(&Connection) -> AppResult<T>,
    {
        with_retry(&self.retry, operation, || self.pool.with_conn(|conn| f(conn)))
    }
}

fn validate_parts(parts_completed: i64) -> AppResult<u32> {
    u32::try_from(parts_completed).map_err(|_| {
        AppError::InvalidInput(format!(
            "parts_completed must be between 0 and {}, got {parts_completed}",
            u32::MAX
        ))
    })
}

/// Every id a new session points at must resolve, and the component must
/// belong to the project.
fn resolve_references(
    conn: &Connection,
    project_id: &ProjectId,
    component_id: &ComponentId,
    process_id: &ProcessId,
    assembler_id: &UserId,
) -> AppResult<()> {
    if queries::load_project(conn, project_id)?.is_none() {
        return Err(AppError::InvalidReference(format!("project {project_id}")));
    }

    match queries::load_component(conn, component_id)? {
        Some(c) if &c.project_id == project_id => {}
        Some(_) => {
            return Err(AppError::InvalidReference(format!(
                "component {component_id} does not belong to project {project_id}"
            )));
        }
        None => {
            return Err(AppError::InvalidReference(format!(
                "component {component_id}"
            )));
        }
    }

    if queries::load_process(conn, process_id)?.is_none() {
        return Err(AppError::InvalidReference(format!("process {process_id}")));
    }

    if queries::load_user(conn, assembler_id)?.is_none() {
        return Err(AppError::InvalidReference(format!(
            "assembler {assembler_id}"
        )));
    }

    Ok(())
}

/// Per-session mutexes, created on demand and dropped when idle.
#[derive(Default)]
struct SessionLocks {
    table: Mutex<HashMap<SessionId, Arc<Mutex<()>>>>,
}

impl SessionLocks {
    fn handle(&self, id: &SessionId) -> Arc<Mutex<()>> {
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(table.entry(id.clone()).or_default())
    }

    fn release(&self, id: &SessionId, handle: Arc<Mutex<()>>) {
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        // One reference in the table plus ours: nobody else is waiting.
        if Arc::strong_count(&handle) == 2 {
            table.remove(id);
        }
        // Dropped under the table lock so the next releaser counts correctly.
        drop(handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    impl SessionLocks {
        fn len(&self) -> usize {
            self.table.lock().unwrap_or_else(PoisonError::into_inner).len()
        }
    }

    #[test]
    fn overlapping_releases_leave_no_entry_behind() {
        let locks = SessionLocks::default();
        let id = SessionId::from("s1");

        let first = locks.handle(&id);
        let second = locks.handle(&id);
        locks.release(&id, second);
        assert_eq!(locks.len(), 1);
        locks.release(&id, first);
        assert_eq!(locks.len(), 0);
    }

    #[test]
    fn contended_ids_are_removed_once_idle() {
        let locks = Arc::new(SessionLocks::default());
        let workers: Vec<_> = (0..8)
            .map(|_| {
                let locks = Arc::clone(&locks);
                thread::spawn(move || {
                    for i in 0..200 {
                        let id = SessionId::from(format!("s{}", i % 3).as_str());
                        let handle = locks.handle(&id);
                        {
                            let _guard = handle.lock().unwrap();
                        }
                        locks.release(&id, handle);
                    }
                })
            })
            .collect();
        for w in workers {
            w.join().unwrap();
        }
        assert_eq!(locks.len(), 0);
    }
}
