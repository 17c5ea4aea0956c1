//! Work-session state machine.
//!
//! ```text
//! in_progress ──pause──▶ paused
//!      ▲                   │
//!      └──────resume───────┘
//! in_progress | paused ──end──▶ completed   (terminal)
//! ```

use crate::errors::AppError;
use crate::models::ids::SessionId;
use crate::models::session_status::{SessionAction, SessionStatus};

/// Status after applying `action`, or `None` if the transition is not allowed.
pub fn next_status(current: SessionStatus, action: SessionAction) -> Option<SessionStatus> {
    use SessionAction::*;
    use SessionStatus::*;

    match (current, action) {
        (Completed, _) => None,
        (status, UpdateProgress) => Some(status),
        (InProgress, Pause) => Some(Paused),
        (Paused, Resume) => Some(InProgress),
        (InProgress | Paused, End) => Some(Completed),
        (Paused, Pause) | (InProgress, Resume) => None,
    }
}

pub fn invalid_transition(
    session_id: &SessionId,
    from: SessionStatus,
    action: SessionAction,
) -> AppError {
    AppError::InvalidTransition {
        session_id: session_id.to_string(),
        from: from.to_string(),
        action: action.to_string(),
    }
}
