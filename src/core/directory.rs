//! Reference data: users, projects, components, processes.
//!
//! The lifecycle core only reads these rows; this is the write side the CLI
//! and tests use to make references resolvable. Project mutations are
//! published on the change feed like session mutations.

use crate::core::feed::ChangeFeed;
use crate::core::router::{ProjectResolver, SessionLabels};
use crate::db::log::ttlog_best_effort;
use crate::db::pool::DbPool;
use crate::db::queries;
use crate::db::retry::{RetryPolicy, with_retry};
use crate::errors::{AppError, AppResult};
use crate::models::change_event::{ChangeEvent, ChangeKind};
use crate::models::ids::{ComponentId, ProcessId, ProjectId, UserId};
use crate::models::project::{Component, Process, Project, ProjectStatus, User};
use crate::models::role::Role;
use crate::models::work_session::WorkSession;
use chrono::Utc;
use rusqlite::{Connection, TransactionBehavior};
use std::sync::Arc;
use tracing::info;

pub struct Directory {
    pool: Arc<DbPool>,
    feed: ChangeFeed,
    retry: RetryPolicy,
}

impl Directory {
    pub fn new(pool: Arc<DbPool>, feed: ChangeFeed, retry: RetryPolicy) -> Self {
        Self { pool, feed, retry }
    }

    fn write<T, F>(&self, operation: &str, f: F) -> AppResult<T>
    where
        F: Fn(&Connection) -> AppResult<T>,
    {
        with_retry(&self.retry, operation, || {
            self.pool.with_conn(|conn| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                let out = f(&tx)?;
                tx.commit()?;
                Ok(out)
            })
        })
    }

    fn read<T, F>(&self, operation: &str, f: F) -> AppResult<T>
    where
        F: Fn(&Connection) -> AppResult<T>,
    {
        with_retry(&self.retry, operation, || self.pool.with_conn(|conn| f(conn)))
    }

    pub fn create_user(&self, name: &str, email: &str, role: Role) -> AppResult<UserId> {
        let user = User {
            id: UserId::generate(),
            name: non_empty("user name", name)?,
            email: email.trim().to_string(),
            role,
        };

        self.write("create_user", |conn| {
            queries::insert_user(conn, &user)?;
            ttlog_best_effort(conn, "user", user.id.as_str(), &format!("{} ({})", user.name, role));
            Ok(())
        })?;
        Ok(user.id)
    }

    pub fn user(&self, id: &UserId) -> AppResult<User> {
        self.read("user", |conn| queries::load_user(conn, id))?
            .ok_or_else(|| AppError::NotFound(format!("user {id}")))
    }

    pub fn users(&self) -> AppResult<Vec<User>> {
        self.read("users", queries::all_users)
    }

    /// Create a project owned by `created_by`, who must be a project lead.
    pub fn create_project(
        &self,
        name: &str,
        total_quantity: i64,
        created_by: &UserId,
    ) -> AppResult<ProjectId> {
        let name = non_empty("project name", name)?;
        if total_quantity < 0 {
            return Err(AppError::InvalidInput(format!(
                "total quantity must not be negative, got {total_quantity}"
            )));
        }

        let now = Utc::now();
        let project = Project {
            id: ProjectId::generate(),
            name,
            total_quantity,
            status: ProjectStatus::Active,
            created_by: created_by.clone(),
            version: 1,
            created_at: now,
            updated_at: now,
        };

        self.write("create_project", |conn| {
            match queries::load_user(conn, created_by)? {
                Some(u) if u.role == Role::ProjectLead => {}
                Some(u) => {
                    return Err(AppError::InvalidReference(format!(
                        "user {} is an {} and cannot own projects",
                        u.id, u.role
                    )));
                }
                None => return Err(AppError::InvalidReference(format!("user {created_by}"))),
            }
            queries::insert_project(conn, &project)?;
            ttlog_best_effort(conn, "project", project.id.as_str(), &project.name);
            Ok(())
        })?;

        info!(project = %project.id, owner = %created_by, "project created");
        let id = project.id.clone();
        self.feed
            .publish(ChangeEvent::project_changed(ChangeKind::Created, None, project));
        Ok(id)
    }

    pub fn set_project_status(&self, id: &ProjectId, status: ProjectStatus) -> AppResult<Project> {
        let (previous, updated) = self.write("set_project_status", |conn| {
            let previous = queries::load_project(conn, id)?
                .ok_or_else(|| AppError::NotFound(format!("project {id}")))?;
            let mut updated = previous.clone();
            updated.status = status;
            updated.version = previous.version + 1;
            updated.updated_at = Utc::now();
            queries::update_project_status(conn, &updated)?;
            ttlog_best_effort(
                conn,
                "project",
                id.as_str(),
                &format!("status → {}", status.to_db_str()),
            );
            Ok((previous, updated))
        })?;

        self.feed.publish(ChangeEvent::project_changed(
            ChangeKind::Updated,
            Some(previous),
            updated.clone(),
        ));
        Ok(updated)
    }

    pub fn project(&self, id: &ProjectId) -> AppResult<Project> {
        self.read("project", |conn| queries::load_project(conn, id))?
            .ok_or_else(|| AppError::NotFound(format!("project {id}")))
    }

    pub fn list_projects(&self) -> AppResult<Vec<Project>> {
        self.read("list_projects", queries::list_projects)
    }

    pub fn add_component(
        &self,
        project_id: &ProjectId,
        name: &str,
        quantity: i64,
    ) -> AppResult<ComponentId> {
        let component = Component {
            id: ComponentId::generate(),
            project_id: project_id.clone(),
            name: non_empty("component name", name)?,
            quantity: quantity.max(0),
        };

        self.write("add_component", |conn| {
            if queries::load_project(conn, project_id)?.is_none() {
                return Err(AppError::InvalidReference(format!("project {project_id}")));
            }
            queries::insert_component(conn, &component)?;
            Ok(())
        })?;
        Ok(component.id)
    }

    pub fn components_for(&self, project_id: &ProjectId) -> AppResult<Vec<Component>> {
        self.read("components_for", |conn| {
            queries::components_for_project(conn, project_id)
        })
    }

    pub fn all_components(&self) -> AppResult<Vec<Component>> {
        self.read("all_components", queries::all_components)
    }

    pub fn create_process(&self, name: &str) -> AppResult<ProcessId> {
        let process = Process {
            id: ProcessId::generate(),
            name: non_empty("process name", name)?,
        };
        self.write("create_process", |conn| queries::insert_process(conn, &process))?;
        Ok(process.id)
    }

    pub fn processes(&self) -> AppResult<Vec<Process>> {
        self.read("processes", queries::all_processes)
    }
}

impl ProjectResolver for Directory {
    fn project_owner(&self, project_id: &ProjectId) -> AppResult<UserId> {
        match self.read("project_owner", |conn| queries::load_project(conn, project_id)) {
            Ok(Some(project)) => Ok(project.created_by),
            Ok(None) => Err(AppError::RoutingResolutionFailure(format!(
                "project {project_id} not found"
            ))),
            Err(e) => Err(AppError::RoutingResolutionFailure(format!(
                "project {project_id}: {e}"
            ))),
        }
    }

    fn session_labels(&self, session: &WorkSession) -> SessionLabels {
        let labels = self.read("session_labels", |conn| {
            Ok(SessionLabels {
                project: queries::load_project(conn, &session.project_id)?.map(|p| p.name),
                component: queries::load_component(conn, &session.component_id)?.map(|c| c.name),
                process: queries::load_process(conn, &session.process_id)?.map(|p| p.name),
                assembler: queries::load_user(conn, &session.assembler_id)?.map(|u| u.name),
            })
        });
        labels.unwrap_or_default()
    }
}

fn non_empty(what: &str, value: &str) -> AppResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidInput(format!("{what} must not be empty")));
    }
    Ok(trimmed.to_string())
}
