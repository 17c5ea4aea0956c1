use crate::errors::{AppError, AppResult};
use crate::models::ids::{ComponentId, NotificationId, ProcessId, ProjectId, SessionId, UserId};
use crate::models::notification::{Notification, NotificationKind};
use crate::models::project::{Component, Process, Project, ProjectStatus, User};
use crate::models::role::Role;
use crate::models::session_status::SessionStatus;
use crate::models::work_session::WorkSession;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Result, Row, params};

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

/// Timestamps are stored as fixed-width RFC 3339 UTC text so they sort lexically.
pub fn fmt_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_error(err: AppError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(err))
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| conversion_error(AppError::InvalidInput(format!("bad timestamp '{raw}'"))))
}

fn get_ts(row: &Row, column: &str) -> Result<DateTime<Utc>> {
    let raw: String = row.get(column)?;
    parse_ts(&raw)
}

fn get_opt_ts(row: &Row, column: &str) -> Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(column)?;
    raw.as_deref().map(parse_ts).transpose()
}

fn get_u64(row: &Row, column: &str) -> Result<u64> {
    let raw: i64 = row.get(column)?;
    u64::try_from(raw).map_err(|_| {
        conversion_error(AppError::InvalidInput(format!(
            "negative value {raw} in column {column}"
        )))
    })
}

// ---------------------------------------------------------------------------
// Work sessions
// ---------------------------------------------------------------------------

const SESSION_COLUMNS: &str = "id, project_id, component_id, process_id, assembler_id, status,
     start_time, end_time, parts_completed, duration_minutes, version, created_at";

pub fn map_session(row: &Row) -> Result<WorkSession> {
    let status_str: String = row.get("status")?;
    let status = SessionStatus::from_db_str(&status_str).ok_or_else(|| {
        conversion_error(AppError::InvalidInput(format!(
            "invalid session status '{status_str}'"
        )))
    })?;

    let parts: i64 = row.get("parts_completed")?;
    let parts_completed = u32::try_from(parts).map_err(|_| {
        conversion_error(AppError::InvalidInput(format!(
            "invalid parts_completed {parts}"
        )))
    })?;

    Ok(WorkSession {
        id: row.get("id")?,
        project_id: row.get("project_id")?,
        component_id: row.get("component_id")?,
        process_id: row.get("process_id")?,
        assembler_id: row.get("assembler_id")?,
        status,
        start_time: get_ts(row, "start_time")?,
        end_time: get_opt_ts(row, "end_time")?,
        parts_completed,
        duration_minutes: row.get("duration_minutes")?,
        version: get_u64(row, "version")?,
        created_at: get_ts(row, "created_at")?,
    })
}

pub fn insert_session(conn: &Connection, s: &WorkSession) -> AppResult<()> {
    conn.execute(
        "INSERT INTO work_sessions (id, project_id, component_id, process_id, assembler_id, status,
                                    start_time, end_time, parts_completed, duration_minutes, version, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            s.id,
            s.project_id,
            s.component_id,
            s.process_id,
            s.assembler_id,
            s.status.to_db_str(),
            fmt_ts(&s.start_time),
            s.end_time.as_ref().map(fmt_ts),
            s.parts_completed,
            s.duration_minutes,
            s.version as i64,
            fmt_ts(&s.created_at),
        ],
    )?;
    Ok(())
}

/// Write the mutable columns of `s`, but only if the stored row is still at
/// `expected_version` and not completed. Returns false when that guard failed.
pub fn update_session_guarded(
    conn: &Connection,
    s: &WorkSession,
    expected_version: u64,
) -> AppResult<bool> {
    let changed = conn.execute(
        "UPDATE work_sessions
         SET status = ?1, end_time = ?2, parts_completed = ?3,
             duration_minutes = ?4, version = ?5
         WHERE id = ?6 AND version = ?7 AND status <> 'completed'",
        params![
            s.status.to_db_str(),
            s.end_time.as_ref().map(fmt_ts),
            s.parts_completed,
            s.duration_minutes,
            s.version as i64,
            s.id,
            expected_version as i64,
        ],
    )?;
    Ok(changed == 1)
}

pub fn load_session(conn: &Connection, id: &SessionId) -> AppResult<Option<WorkSession>> {
    let sql = format!("SELECT {SESSION_COLUMNS} FROM work_sessions WHERE id = ?1");
    Ok(conn.query_row(&sql, [id], map_session).optional()?)
}

fn collect_sessions(
    conn: &Connection,
    where_and_order: &str,
    args: &[&dyn rusqlite::ToSql],
) -> AppResult<Vec<WorkSession>> {
    let sql = format!("SELECT {SESSION_COLUMNS} FROM work_sessions {where_and_order}");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(args, map_session)?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

pub fn sessions_for_assembler(
    conn: &Connection,
    assembler_id: &UserId,
    status: Option<SessionStatus>,
) -> AppResult<Vec<WorkSession>> {
    match status {
        Some(st) => collect_sessions(
            conn,
            "WHERE assembler_id = ?1 AND status = ?2 ORDER BY start_time ASC",
            &[assembler_id, &st.to_db_str()],
        ),
        None => collect_sessions(
            conn,
            "WHERE assembler_id = ?1 ORDER BY created_at DESC",
            &[assembler_id],
        ),
    }
}

pub fn sessions_for_project(conn: &Connection, project_id: &ProjectId) -> AppResult<Vec<WorkSession>> {
    collect_sessions(
        conn,
        "WHERE project_id = ?1 ORDER BY created_at ASC",
        &[project_id],
    )
}

pub fn sessions_by_status(conn: &Connection, status: SessionStatus) -> AppResult<Vec<WorkSession>> {
    collect_sessions(
        conn,
        "WHERE status = ?1 ORDER BY created_at ASC",
        &[&status.to_db_str()],
    )
}

pub fn all_sessions(conn: &Connection) -> AppResult<Vec<WorkSession>> {
    collect_sessions(conn, "ORDER BY created_at ASC", &[])
}

// ---------------------------------------------------------------------------
// Reference data
// ---------------------------------------------------------------------------

pub fn map_user(row: &Row) -> Result<User> {
    let role_str: String = row.get("role")?;
    let role = Role::from_db_str(&role_str).ok_or_else(|| {
        conversion_error(AppError::InvalidInput(format!("invalid role '{role_str}'")))
    })?;

    Ok(User {
        id: row.get("id")?,
        name: row.get("name")?,
        email: row.get("email")?,
        role,
    })
}

pub fn insert_user(conn: &Connection, user: &User) -> AppResult<()> {
    conn.execute(
        "INSERT INTO users (id, name, email, role) VALUES (?1, ?2, ?3, ?4)",
        params![user.id, user.name, user.email, user.role.to_db_str()],
    )?;
    Ok(())
}

pub fn load_user(conn: &Connection, id: &UserId) -> AppResult<Option<User>> {
    Ok(conn
        .query_row(
            "SELECT id, name, email, role FROM users WHERE id = ?1",
            [id],
            map_user,
        )
        .optional()?)
}

pub fn all_users(conn: &Connection) -> AppResult<Vec<User>> {
    let mut stmt = conn.prepare("SELECT id, name, email, role FROM users ORDER BY name ASC")?;
    let rows = stmt.query_map([], map_user)?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

pub fn map_project(row: &Row) -> Result<Project> {
    let status_str: String = row.get("status")?;
    let status = ProjectStatus::from_db_str(&status_str).ok_or_else(|| {
        conversion_error(AppError::InvalidInput(format!(
            "invalid project status '{status_str}'"
        )))
    })?;

    Ok(Project {
        id: row.get("id")?,
        name: row.get("name")?,
        total_quantity: row.get("total_quantity")?,
        status,
        created_by: row.get("created_by")?,
        version: get_u64(row, "version")?,
        created_at: get_ts(row, "created_at")?,
        updated_at: get_ts(row, "updated_at")?,
    })
}

const PROJECT_COLUMNS: &str =
    "id, name, total_quantity, status, created_by, version, created_at, updated_at";

pub fn insert_project(conn: &Connection, p: &Project) -> AppResult<()> {
    conn.execute(
        "INSERT INTO projects (id, name, total_quantity, status, created_by, version, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            p.id,
            p.name,
            p.total_quantity,
            p.status.to_db_str(),
            p.created_by,
            p.version as i64,
            fmt_ts(&p.created_at),
            fmt_ts(&p.updated_at),
        ],
    )?;
    Ok(())
}

pub fn update_project_status(conn: &Connection, p: &Project) -> AppResult<()> {
    conn.execute(
        "UPDATE projects SET status = ?1, version = ?2, updated_at = ?3 WHERE id = ?4",
        params![
            p.status.to_db_str(),
            p.version as i64,
            fmt_ts(&p.updated_at),
            p.id,
        ],
    )?;
    Ok(())
}

pub fn load_project(conn: &Connection, id: &ProjectId) -> AppResult<Option<Project>> {
    let sql = format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = ?1");
    Ok(conn.query_row(&sql, [id], map_project).optional()?)
}

pub fn list_projects(conn: &Connection) -> AppResult<Vec<Project>> {
    let sql = format!("SELECT {PROJECT_COLUMNS} FROM projects ORDER BY created_at ASC");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], map_project)?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

fn map_component(row: &Row) -> Result<Component> {
    Ok(Component {
        id: row.get("id")?,
        project_id: row.get("project_id")?,
        name: row.get("name")?,
        quantity: row.get("quantity")?,
    })
}

pub fn insert_component(conn: &Connection, c: &Component) -> AppResult<()> {
    conn.execute(
        "INSERT INTO components (id, project_id, name, quantity) VALUES (?1, ?2, ?3, ?4)",
        params![c.id, c.project_id, c.name, c.quantity],
    )?;
    Ok(())
}

pub fn load_component(conn: &Connection, id: &ComponentId) -> AppResult<Option<Component>> {
    Ok(conn
        .query_row(
            "SELECT id, project_id, name, quantity FROM components WHERE id = ?1",
            [id],
            map_component,
        )
        .optional()?)
}

pub fn components_for_project(conn: &Connection, project_id: &ProjectId) -> AppResult<Vec<Component>> {
    let mut stmt = conn.prepare(
        "SELECT id, project_id, name, quantity FROM components WHERE project_id = ?1 ORDER BY name ASC",
    )?;
    let rows = stmt.query_map([project_id], map_component)?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

pub fn all_components(conn: &Connection) -> AppResult<Vec<Component>> {
    let mut stmt = conn.prepare("SELECT id, project_id, name, quantity FROM components")?;
    let rows = stmt.query_map([], map_component)?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

pub fn insert_process(conn: &Connection, p: &Process) -> AppResult<()> {
    conn.execute(
        "INSERT INTO processes (id, name) VALUES (?1, ?2)",
        params![p.id, p.name],
    )?;
    Ok(())
}

pub fn load_process(conn: &Connection, id: &ProcessId) -> AppResult<Option<Process>> {
    Ok(conn
        .query_row(
            "SELECT id, name FROM processes WHERE id = ?1",
            [id],
            |row| {
                Ok(Process {
                    id: row.get("id")?,
                    name: row.get("name")?,
                })
            },
        )
        .optional()?)
}

pub fn all_processes(conn: &Connection) -> AppResult<Vec<Process>> {
    let mut stmt = conn.prepare("SELECT id, name FROM processes ORDER BY name ASC")?;
    let rows = stmt.query_map([], |row| {
        Ok(Process {
            id: row.get("id")?,
            name: row.get("name")?,
        })
    })?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

pub fn map_notification(row: &Row) -> Result<Notification> {
    let kind_str: String = row.get("kind")?;
    let kind = NotificationKind::from_db_str(&kind_str).ok_or_else(|| {
        conversion_error(AppError::InvalidInput(format!(
            "invalid notification kind '{kind_str}'"
        )))
    })?;

    let payload_str: String = row.get("payload")?;
    let payload: WorkSession = serde_json::from_str(&payload_str).map_err(|e| {
        conversion_error(AppError::InvalidInput(format!(
            "invalid notification payload: {e}"
        )))
    })?;

    Ok(Notification {
        id: row.get("id")?,
        recipient_id: row.get("recipient_id")?,
        kind,
        payload,
        created_at: get_ts(row, "created_at")?,
        delivered: row.get::<_, i32>("delivered")? == 1,
        read: row.get::<_, i32>("read")? == 1,
    })
}

/// Append `n` unless a notification with the same (recipient, session, kind)
/// already exists. Returns true when the row was inserted.
pub fn insert_notification_if_absent(conn: &Connection, n: &Notification) -> AppResult<bool> {
    let payload = serde_json::to_string(&n.payload)
        .map_err(|e| AppError::Other(format!("cannot encode notification payload: {e}")))?;

    let inserted = conn.execute(
        "INSERT INTO notifications (id, recipient_id, session_id, kind, payload, created_at, delivered, read)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(recipient_id, session_id, kind) DO NOTHING",
        params![
            n.id,
            n.recipient_id,
            n.session_id(),
            n.kind.to_db_str(),
            payload,
            fmt_ts(&n.created_at),
            if n.delivered { 1 } else { 0 },
            if n.read { 1 } else { 0 },
        ],
    )?;
    Ok(inserted == 1)
}

pub fn notifications_for(conn: &Connection, recipient_id: &UserId) -> AppResult<Vec<Notification>> {
    let mut stmt = conn.prepare(
        "SELECT id, recipient_id, kind, payload, created_at, delivered, read
         FROM notifications
         WHERE recipient_id = ?1
         ORDER BY created_at DESC",
    )?;
    let rows = stmt.query_map([recipient_id], map_notification)?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

pub fn notifications_for_session(conn: &Connection, session_id: &SessionId) -> AppResult<Vec<Notification>> {
    let mut stmt = conn.prepare(
        "SELECT id, recipient_id, kind, payload, created_at, delivered, read
         FROM notifications
         WHERE session_id = ?1
         ORDER BY created_at ASC",
    )?;
    let rows = stmt.query_map([session_id], map_notification)?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

pub fn unread_count(conn: &Connection, recipient_id: &UserId) -> AppResult<u64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM notifications WHERE recipient_id = ?1 AND read = 0",
        [recipient_id],
        |row| row.get(0),
    )?;
    Ok(count.max(0) as u64)
}

/// Set `delivered` or `read` on one notification. Returns false for unknown ids.
pub fn set_notification_flag(
    conn: &Connection,
    id: &NotificationId,
    flag: NotificationFlag,
) -> AppResult<bool> {
    let sql = match flag {
        NotificationFlag::Delivered => "UPDATE notifications SET delivered = 1 WHERE id = ?1",
        NotificationFlag::Read => "UPDATE notifications SET read = 1 WHERE id = ?1",
    };
    Ok(conn.execute(sql, [id])? == 1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationFlag {
    Delivered,
    Read,
}
