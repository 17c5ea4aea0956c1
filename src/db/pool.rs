//! SQLite connection pool.
//!
//! Writers on different threads each check out their own connection so
//! transitions on different sessions never share a lock in this process;
//! SQLite itself serializes the short write transactions.

use crate::errors::AppResult;
use rusqlite::Connection;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

pub struct DbPool {
    path: PathBuf,
    busy_timeout: Duration,
    idle: Mutex<Vec<Connection>>,
}

impl DbPool {
    pub fn open(path: impl AsRef<Path>, busy_timeout: Duration) -> AppResult<Self> {
        let path = path.as_ref().to_path_buf();
        let first = open_connection(&path, busy_timeout)?;
        Ok(Self {
            path,
            busy_timeout,
            idle: Mutex::new(vec![first]),
        })
    }

    /// Check out a connection; it returns to the pool when dropped.
    pub fn get(&self) -> AppResult<PooledConnection<'_>> {
        let reused = self
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();

        let conn = match reused {
            Some(conn) => conn,
            None => open_connection(&self.path, self.busy_timeout)?,
        };

        Ok(PooledConnection {
            pool: self,
            conn: Some(conn),
        })
    }

    /// Helper to execute a closure with a mutable connection reference.
    pub fn with_conn<F, T>(&self, func: F) -> AppResult<T>
    where
        F: FnOnce(&mut Connection) -> AppResult<T>,
    {
        let mut conn = self.get()?;
        func(&mut conn)
    }
}

fn open_connection(path: &Path, busy_timeout: Duration) -> AppResult<Connection> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(busy_timeout)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub struct PooledConnection<'a> {
    pool: &'a DbPool,
    conn: Option<Connection>,
}

impl Deref for PooledConnection<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn.as_ref().expect("pooled connection used after drop")
    }
}

impl DerefMut for PooledConnection<'_> {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().expect("pooled connection used after drop")
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool
                .idle
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(conn);
        }
    }
}
