//! Unified application error type.
//! All modules (db, core, cli, export) return AppError to keep the error
//! handling consistent and easy to manage.

use rusqlite::ErrorCode;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    // ---------------------------
    // IO
    // ---------------------------
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    // ---------------------------
    // Database-related
    // ---------------------------
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("Database migration error: {0}")]
    Migration(String),

    #[error("Store unavailable after {attempts} attempt(s): {message}")]
    TransientStoreFailure { attempts: u32, message: String },

    // ---------------------------
    // Session lifecycle
    // ---------------------------
    #[error("Cannot {action} work session {session_id}: session is {from}")]
    InvalidTransition {
        session_id: String,
        from: String,
        action: String,
    },

    #[error("Unresolvable reference: {0}")]
    InvalidReference(String),

    #[error("Not found: {0}")]
    NotFound(String),

    // ---------------------------
    // Notification routing
    // ---------------------------
    #[error("Cannot resolve notification recipient: {0}")]
    RoutingResolutionFailure(String),

    // ---------------------------
    // Input / config
    // ---------------------------
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not permitted: {0}")]
    Forbidden(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Export error: {0}")]
    Export(String),

    // ---------------------------
    // Generic fallback
    // ---------------------------
    #[error("Internal error: {0}")]
    Other(String),
}

impl AppError {
    /// True for failures worth retrying: the store was busy/locked or already
    /// reported as unreachable.
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::TransientStoreFailure { .. } => true,
            AppError::Db(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.code,
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
