//! Cross-process change detection.
//!
//! The in-process feed only sees commits made by this process. `watch` runs
//! next to other `shopfloor` invocations writing the same database, so it
//! re-reads sessions and projects on a timer and republishes every row whose
//! `version` moved since the last scan. Versions only grow, so per-entity
//! order is preserved; intermediate versions between two scans collapse into
//! one event.

use crate::core::feed::ChangeFeed;
use crate::db::pool::DbPool;
use crate::db::queries;
use crate::errors::AppResult;
use crate::models::change_event::{ChangeEvent, ChangeKind};
use crate::models::project::Project;
use crate::models::work_session::WorkSession;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

pub struct FeedPoller {
    pool: Arc<DbPool>,
    feed: ChangeFeed,
    sessions: HashMap<String, WorkSession>,
    projects: HashMap<String, Project>,
}

impl FeedPoller {
    pub fn new(pool: Arc<DbPool>, feed: ChangeFeed) -> Self {
        Self {
            pool,
            feed,
            sessions: HashMap::new(),
            projects: HashMap::new(),
        }
    }

    /// Record the current state without publishing anything.
    pub fn prime(&mut self) -> AppResult<()> {
        let (sessions, projects) = self.read()?;
        self.sessions = sessions.into_iter().map(|s| (s.id.to_string(), s)).collect();
        self.projects = projects.into_iter().map(|p| (p.id.to_string(), p)).collect();
        debug!(
            sessions = self.sessions.len(),
            projects = self.projects.len(),
            "poller primed"
        );
        Ok(())
    }

    /// One scan. Returns the number of events published.
    pub fn poll_once(&mut self) -> AppResult<usize> {
        let (sessions, projects) = self.read()?;
        let mut published = 0;

        for project in projects {
            let key = project.id.to_string();
            let event = match self.projects.get(&key) {
                None => Some(ChangeEvent::project_changed(ChangeKind::Created, None, project.clone())),
                Some(seen) if seen.version < project.version => Some(ChangeEvent::project_changed(
                    ChangeKind::Updated,
                    Some(seen.clone()),
                    project.clone(),
                )),
                Some(_) => None,
            };
            if let Some(event) = event {
                self.feed.publish(event);
                published += 1;
                self.projects.insert(key, project);
            }
        }

        for session in sessions {
            let key = session.id.to_string();
            let event = match self.sessions.get(&key) {
                None => Some(ChangeEvent::session_created(session.clone())),
                Some(seen) if seen.version < session.version => {
                    let at = session.end_time.unwrap_or_else(Utc::now);
                    Some(ChangeEvent::session_updated(seen.clone(), session.clone(), at))
                }
                Some(_) => None,
            };
            if let Some(event) = event {
                self.feed.publish(event);
                published += 1;
                self.sessions.insert(key, session);
            }
        }

        Ok(published)
    }

    fn read(&self) -> AppResult<(Vec<WorkSession>, Vec<Project>)> {
        self.pool.with_conn(|conn| {
            Ok((queries::all_sessions(conn)?, queries::list_projects(conn)?))
        })
    }

    /// Scan every `interval` until shutdown. Store errors skip one round.
    pub async fn run(mut self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match tokio::task::block_in_place(|| self.poll_once()) {
                        Ok(0) => {}
                        Ok(n) => debug!(published = n, "poller published changes"),
                        Err(e) => warn!(error = %e, "poll failed"),
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
    }
}
