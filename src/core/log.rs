use crate::db::pool::DbPool;
use crate::errors::AppResult;
use ansi_term::Colour;
use regex::Regex;
use std::sync::LazyLock;

static ANSI: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1B\[[0-9;]*[mK]").expect("ANSI pattern is valid")
});

const OP_COLUMN_MAX: usize = 60;

fn strip_ansi(s: &str) -> String {
    ANSI.replace_all(s, "").into_owned()
}

/// ANSI colour for an audit operation.
fn color_for_operation(op: &str) -> Colour {
    match op {
        "start" | "resume" => Colour::Green,
        "progress" => Colour::Cyan,
        "pause" => Colour::Yellow,
        "end" => Colour::Blue,
        "notify" => Colour::RGB(255, 153, 51),
        "user" | "project" => Colour::White,
        "migration_applied" | "init" => Colour::Purple,
        _ => Colour::White,
    }
}

struct LogEntry {
    id: i64,
    date: String,
    operation: String,
    op_target: String,
    message: String,
}

pub struct LogLogic;

impl LogLogic {
    pub fn print_log(pool: &DbPool) -> AppResult<()> {
        let entries = pool.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT id, date, operation, target, message FROM log ORDER BY id ASC",
            )?;
            let rows = stmt.query_map([], |row| {
                let raw_date: String = row.get(1)?;
                let operation: String = row.get(2)?;
                let target: Option<String> = row.get(3)?;
                let target = target.unwrap_or_default();

                let date = chrono::DateTime::parse_from_rfc3339(&raw_date)
                    .map(|dt| dt.format("%FT%T%:z").to_string())
                    .unwrap_or(raw_date);

                let op_target = if target.is_empty() {
                    operation.clone()
                } else {
                    format!("{operation} ({target})")
                };

                Ok(LogEntry {
                    id: row.get(0)?,
                    date,
                    operation,
                    op_target,
                    message: row.get(4)?,
                })
            })?;

            let mut out = Vec::new();
            for r in rows {
                out.push(r?);
            }
            Ok(out)
        })?;

        if entries.is_empty() {
            println!("📜 Internal log is empty.");
            return Ok(());
        }

        let op_w = entries
            .iter()
            .map(|e| e.op_target.chars().count())
            .max()
            .unwrap_or(10)
            .min(OP_COLUMN_MAX);
        let id_w = entries
            .iter()
            .map(|e| e.id.to_string().len())
            .max()
            .unwrap_or(1);
        let date_w = entries.iter().map(|e| e.date.len()).max().unwrap_or(0);

        println!("📜 Internal log:\n");

        for entry in entries {
            let color = color_for_operation(&entry.operation);
            let cell = render_op_cell(&entry.op_target, color);
            let padding = " ".repeat(op_w.saturating_sub(strip_ansi(&cell).chars().count()));

            println!(
                "{:>id_w$}: {:<date_w$} | {}{} => {}",
                entry.id, entry.date, cell, padding, entry.message
            );
        }

        Ok(())
    }
}

/// Truncate on visible width, then colour only the operation word.
fn render_op_cell(op_target: &str, color: Colour) -> String {
    let visible = if op_target.chars().count() > OP_COLUMN_MAX {
        let mut s: String = op_target.chars().take(OP_COLUMN_MAX - 3).collect();
        s.push_str("...");
        s
    } else {
        op_target.to_string()
    };

    match visible.split_once(' ') {
        Some((op, rest)) => format!("{} {}", color.paint(op), rest),
        None => color.paint(visible.as_str()).to_string(),
    }
}
