//! User-facing CLI messages. Diagnostics go through `tracing` instead.

use std::fmt;

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";

#[derive(Clone, Copy)]
enum Level {
    Info,
    Success,
    Warning,
    Error,
}

impl Level {
    fn style(self) -> (&'static str, &'static str) {
        match self {
            Level::Info => ("\x1b[34m", "ℹ️"),
            Level::Success => ("\x1b[32m", "✅"),
            Level::Warning => ("\x1b[33m", "⚠️"),
            Level::Error => ("\x1b[31m", "❌"),
        }
    }
}

fn render(level: Level, msg: impl fmt::Display) -> String {
    let (colour, icon) = level.style();
    format!("{colour}{BOLD}{icon}{RESET} {msg}")
}

pub fn info<T: fmt::Display>(msg: T) {
    println!("{}", render(Level::Info, msg));
}

pub fn success<T: fmt::Display>(msg: T) {
    println!("{}", render(Level::Success, msg));
}

pub fn warning<T: fmt::Display>(msg: T) {
    println!("{}", render(Level::Warning, msg));
}

pub fn error<T: fmt::Display>(msg: T) {
    eprintln!("{}", render(Level::Error, msg));
}

pub fn header<T: fmt::Display>(msg: T) {
    println!("\x1b[34m{BOLD}====================== {msg}{RESET}\n");
}
