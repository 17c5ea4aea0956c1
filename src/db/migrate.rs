use crate::errors::{AppError, AppResult};
use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior};
use tracing::info;

/// Ensure that the `log` table exists. Applied migrations are recorded there.
fn ensure_log_table(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS log (
            id        INTEGER PRIMARY KEY AUTOINCREMENT,
            date      TEXT NOT NULL,
            operation TEXT NOT NULL,
            target    TEXT DEFAULT '',
            message   TEXT NOT NULL
        );
        "#,
    )
}

fn is_applied(conn: &Connection, version: &str) -> rusqlite::Result<bool> {
    let mut chk = conn.prepare(
        "SELECT 1 FROM log WHERE operation = 'migration_applied' AND target = ?1 LIMIT 1",
    )?;
    Ok(chk.query_row([version], |_| Ok(())).optional()?.is_some())
}

struct Migration {
    version: &'static str,
    description: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: "20260301_0001_reference_tables",
        description: "Created users, projects, components and processes tables",
        sql: r#"
        CREATE TABLE IF NOT EXISTS users (
            id     TEXT PRIMARY KEY,
            name   TEXT NOT NULL,
            email  TEXT NOT NULL DEFAULT '',
            role   TEXT NOT NULL CHECK(role IN ('project_lead','assembler'))
        );

        CREATE TABLE IF NOT EXISTS projects (
            id             TEXT PRIMARY KEY,
            name           TEXT NOT NULL,
            total_quantity INTEGER NOT NULL DEFAULT 0,
            status         TEXT NOT NULL DEFAULT 'active'
                           CHECK(status IN ('active','paused','completed')),
            created_by     TEXT NOT NULL REFERENCES users(id),
            version        INTEGER NOT NULL DEFAULT 1,
            created_at     TEXT NOT NULL,
            updated_at     TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS components (
            id          TEXT PRIMARY KEY,
            project_id  TEXT NOT NULL REFERENCES projects(id),
            name        TEXT NOT NULL,
            quantity    INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS processes (
            id    TEXT PRIMARY KEY,
            name  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_components_project ON components(project_id);
        "#,
    },
    Migration {
        version: "20260301_0002_work_sessions",
        description: "Created work_sessions table",
        sql: r#"
        CREATE TABLE IF NOT EXISTS work_sessions (
            id                TEXT PRIMARY KEY,
            project_id        TEXT NOT NULL REFERENCES projects(id),
            component_id      TEXT NOT NULL REFERENCES components(id),
            process_id        TEXT NOT NULL REFERENCES processes(id),
            assembler_id      TEXT NOT NULL REFERENCES users(id),
            status            TEXT NOT NULL DEFAULT 'in_progress'
                              CHECK(status IN ('in_progress','paused','completed')),
            start_time        TEXT NOT NULL,
            end_time          TEXT,
            parts_completed   INTEGER NOT NULL DEFAULT 0 CHECK(parts_completed >= 0),
            duration_minutes  INTEGER,
            version           INTEGER NOT NULL DEFAULT 1,
            created_at        TEXT NOT NULL,
            CHECK ((status = 'completed') = (end_time IS NOT NULL))
        );

        CREATE INDEX IF NOT EXISTS idx_sessions_assembler_status ON work_sessions(assembler_id, status);
        CREATE INDEX IF NOT EXISTS idx_sessions_project ON work_sessions(project_id);
        "#,
    },
    Migration {
        version: "20260301_0003_notifications",
        description: "Created notifications table with per-recipient dedup key",
        sql: r#"
        CREATE TABLE IF NOT EXISTS notifications (
            id            TEXT PRIMARY KEY,
            recipient_id  TEXT NOT NULL,
            session_id    TEXT NOT NULL,
            kind          TEXT NOT NULL CHECK(kind IN ('work_completed')),
            payload       TEXT NOT NULL,
            created_at    TEXT NOT NULL,
            delivered     INTEGER NOT NULL DEFAULT 0,
            read          INTEGER NOT NULL DEFAULT 0,
            UNIQUE(recipient_id, session_id, kind)
        );

        CREATE INDEX IF NOT EXISTS idx_notifications_recipient ON notifications(recipient_id, created_at);
        "#,
    },
];

/// Apply one migration atomically and mark it in `log`.
fn apply(conn: &Connection, migration: &Migration) -> AppResult<bool> {
    // IMMEDIATE: concurrent initializers must not both apply the same version.
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)
        .map_err(|e| AppError::Migration(format!("{}: {e}", migration.version)))?;

    if is_applied(&tx, migration.version)? {
        return Ok(false);
    }

    tx.execute_batch(migration.sql)
        .map_err(|e| AppError::Migration(format!("{}: {e}", migration.version)))?;

    tx.execute(
        "INSERT INTO log (date, operation, target, message)
         VALUES (datetime('now'), 'migration_applied', ?1, ?2)",
        [migration.version, migration.description],
    )?;

    tx.commit()?;
    info!(version = migration.version, "{}", migration.description);
    Ok(true)
}

/// Public entry point: run all pending migrations.
///
/// Invoked by db::initialize::init_db(). Returns the number of migrations applied.
pub fn run_pending_migrations(conn: &Connection) -> AppResult<usize> {
    ensure_log_table(conn)?;

    let mut applied = 0;
    for migration in MIGRATIONS {
        if apply(conn, migration)? {
            applied += 1;
        }
    }

    Ok(applied)
}
