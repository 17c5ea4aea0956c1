//! `start`, `progress`, `pause`, `resume`, `end` and `sessions`.

use crate::cli::parser::Commands;
use crate::config::Config;
use crate::core::identity::IdentityProvider;
use crate::core::pipeline::{Pipeline, Services};
use crate::errors::{AppError, AppResult};
use crate::models::ids::{ComponentId, ProcessId, ProjectId, SessionId, UserId};
use crate::models::role::{CurrentUser, Route};
use crate::models::work_session::WorkSession;
use crate::ui::messages::{info, success};
use crate::utils::colors::{colorize_optional, colorize_status};
use crate::utils::formatting::{fmt_local, mins2readable};
use crate::utils::table::Table;

pub fn handle(cmd: &Commands, cfg: &Config, actor: Option<&UserId>) -> AppResult<()> {
    match cmd {
        Commands::Start {
            project,
            component,
            process,
        } => super::with_pipeline(cfg, |pipeline| {
            let user = assembler(pipeline, actor)?;
            let id = pipeline.store().start(
                &ProjectId::from(project.as_str()),
                &ComponentId::from(component.as_str()),
                &ProcessId::from(process.as_str()),
                &user.id,
            )?;
            success("Work session started");
            println!("{id}");
            Ok(())
        }),

        Commands::Progress(args) => super::with_pipeline(cfg, |pipeline| {
            let id = owned_session(pipeline, actor, &args.session)?;
            let s = pipeline.store().update_progress(&id, args.parts)?;
            success(format!("{} parts completed ({})", s.parts_completed, s.status));
            Ok(())
        }),

        Commands::Pause(args) => super::with_pipeline(cfg, |pipeline| {
            let id = owned_session(pipeline, actor, &args.session)?;
            pipeline.store().pause(&id)?;
            success(format!("Session {id} paused"));
            Ok(())
        }),

        Commands::Resume(args) => super::with_pipeline(cfg, |pipeline| {
            let id = owned_session(pipeline, actor, &args.session)?;
            pipeline.store().resume(&id)?;
            success(format!("Session {id} resumed"));
            Ok(())
        }),

        Commands::End(args) => super::with_pipeline(cfg, |pipeline| {
            let id = owned_session(pipeline, actor, &args.session)?;
            let s = pipeline.store().end(&id, args.parts)?;
            success(format!(
                "Session {id} completed: {} parts in {}",
                s.parts_completed,
                mins2readable(s.duration_minutes.unwrap_or(0), false, false)
            ));
            Ok(())
        }),

        Commands::Sessions { active, project } => {
            let services = Services::open(cfg)?;
            let sessions = match project {
                Some(p) => {
                    super::identity(&services, actor).authorize(Route::Projects)?;
                    services
                        .store
                        .sessions_for_project(&ProjectId::from(p.as_str()))?
                }
                None => {
                    let user = super::identity(&services, actor).authorize(Route::WorkHistory)?;
                    if *active {
                        services.store.active_for_assembler(&user.id)?
                    } else {
                        services.store.history_for_assembler(&user.id)?
                    }
                }
            };
            print_sessions(&sessions);
            Ok(())
        }

        _ => Ok(()),
    }
}

fn assembler(pipeline: &Pipeline, actor: Option<&UserId>) -> AppResult<CurrentUser> {
    super::identity(&pipeline.services, actor).authorize(Route::AssemblerConsole)
}

/// Operators only act on their own sessions.
fn owned_session(pipeline: &Pipeline, actor: Option<&UserId>, raw: &str) -> AppResult<SessionId> {
    let user = assembler(pipeline, actor)?;
    let id = SessionId::from(raw);
    let session = pipeline.store().get(&id)?;
    if session.assembler_id != user.id {
        return Err(AppError::Forbidden(format!(
            "session {id} belongs to {}",
            session.assembler_id
        )));
    }
    Ok(id)
}

fn print_sessions(sessions: &[WorkSession]) {
    if sessions.is_empty() {
        info("No work sessions.");
        return;
    }

    let mut table = Table::new([
        "ID", "STATUS", "PROJECT", "COMPONENT", "PROCESS", "ASSEMBLER", "START", "END", "PARTS",
        "DURATION",
    ]);
    for s in sessions {
        table.add_row(vec![
            s.id.to_string(),
            colorize_status(s.status),
            s.project_id.to_string(),
            s.component_id.to_string(),
            s.process_id.to_string(),
            s.assembler_id.to_string(),
            fmt_local(&s.start_time),
            colorize_optional(s.end_time.as_ref().map(fmt_local)),
            s.parts_completed.to_string(),
            colorize_optional(s.duration_minutes.map(|m| mins2readable(m, false, true))),
        ]);
    }
    print!("{}", table.render());
}
