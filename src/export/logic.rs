use crate::core::pipeline::Services;
use crate::db::queries;
use crate::errors::{AppError, AppResult};
use crate::export::ExportFormat;
use crate::export::fs_utils::ensure_writable;
use crate::export::json_csv::{export_csv, export_json};
use crate::export::model::{NameIndex, SessionExport, session_to_row};
use crate::models::ids::UserId;
use crate::ui::messages::warning;
use std::path::Path;

pub struct ExportLogic;

impl ExportLogic {
    /// Write work-history rows, oldest first, optionally for one assembler.
    /// `file` must be an absolute path.
    pub fn export(
        services: &Services,
        format: ExportFormat,
        file: &str,
        assembler: Option<&UserId>,
        force: bool,
    ) -> AppResult<usize> {
        let path = Path::new(file);
        if !path.is_absolute() {
            return Err(AppError::Export(format!(
                "output file path must be absolute: {file}"
            )));
        }

        ensure_writable(path, force)?;

        let rows = load_rows(services, assembler)?;
        if rows.is_empty() {
            warning("No work sessions to export.");
            return Ok(0);
        }

        match format {
            ExportFormat::Csv => export_csv(&rows, path)?,
            ExportFormat::Json => export_json(&rows, path)?,
        }

        Ok(rows.len())
    }
}

fn load_rows(services: &Services, assembler: Option<&UserId>) -> AppResult<Vec<SessionExport>> {
    let mut sessions = match assembler {
        Some(id) => services.store.history_for_assembler(id)?,
        None => services.store.all()?,
    };
    sessions.sort_by(|a, b| a.start_time.cmp(&b.start_time).then_with(|| a.id.cmp(&b.id)));

    let names = services.pool.with_conn(|conn| {
        Ok(NameIndex::build(
            &queries::list_projects(conn)?,
            &queries::all_components(conn)?,
            &queries::all_processes(conn)?,
            &queries::all_users(conn)?,
        ))
    })?;

    Ok(sessions.iter().map(|s| session_to_row(s, &names)).collect())
}
