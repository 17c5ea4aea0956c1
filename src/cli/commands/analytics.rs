use crate::cli::parser::Commands;
use crate::config::Config;
use crate::core::identity::IdentityProvider;
use crate::core::pipeline::Services;
use crate::errors::{AppError, AppResult};
use crate::models::ids::{ProjectId, UserId};
use crate::models::role::Route;
use crate::ui::messages::{header, info};
use crate::utils::formatting::fmt_local;
use crate::utils::table::Table;

pub fn handle(cmd: &Commands, cfg: &Config, actor: Option<&UserId>) -> AppResult<()> {
    let Commands::Analytics {
        project,
        assembler,
        summary,
    } = cmd
    else {
        return Ok(());
    };

    let services = Services::open(cfg)?;
    let identity = super::identity(&services, actor);

    if let Some(p) = project {
        identity.authorize(Route::Dashboard)?;
        let a = services.project_analytics(&ProjectId::from(p.as_str()))?;
        header(format!("Project {p}"));
        println!("Components       : {}/{} completed", a.completed_components, a.total_components);
        println!("Overall progress : {:.1}%", a.overall_progress);
        println!("Active assemblers: {}", a.active_assemblers);
        println!("Total hours      : {:.2}", a.total_hours);
        return Ok(());
    }

    if let Some(id) = assembler {
        identity.authorize(Route::WorkHistory)?;
        let points = services.assembler_performance(&UserId::from(id.as_str()))?;
        if points.is_empty() {
            info(format!("No sessions for assembler {id}."));
            return Ok(());
        }
        let mut table = Table::new(["STARTED", "PARTS"]);
        for p in points {
            table.add_row(vec![fmt_local(&p.created_at), p.parts_completed.to_string()]);
        }
        print!("{}", table.render());
        return Ok(());
    }

    if *summary {
        identity.authorize(Route::Dashboard)?;
        let s = services.dashboard_summary()?;
        header("Dashboard");
        println!("Active projects  : {}", s.active_projects);
        println!("Total components : {}", s.total_components);
        println!("Active assemblers: {}", s.active_assemblers);
        return Ok(());
    }

    Err(AppError::InvalidInput(
        "choose one of --project, --assembler or --summary".into(),
    ))
}
