//! ANSI colours for terminal output.
use crate::models::session_status::SessionStatus;

pub const RESET: &str = "\x1b[0m";
pub const GREY: &str = "\x1b[90m";
pub const GREEN: &str = "\x1b[32m";
pub const YELLOW: &str = "\x1b[33m";
pub const BLUE: &str = "\x1b[34m";

pub fn color_for_status(status: SessionStatus) -> &'static str {
    match status {
        SessionStatus::InProgress => GREEN,
        SessionStatus::Paused => YELLOW,
        SessionStatus::Completed => BLUE,
    }
}

pub fn colorize_status(status: SessionStatus) -> String {
    format!("{}{}{RESET}", color_for_status(status), status)
}

/// Grey placeholder for empty values.
pub fn colorize_optional(value: Option<String>) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => format!("{GREY}--{RESET}"),
    }
}
