use crate::cli::parser::{Commands, ProjectAction};
use crate::config::Config;
use crate::core::identity::IdentityProvider;
use crate::core::pipeline::Services;
use crate::errors::AppResult;
use crate::models::ids::{ProjectId, UserId};
use crate::models::project::ProjectStatus;
use crate::models::role::Route;
use crate::ui::messages::{info, success};
use crate::utils::formatting::fmt_local;
use crate::utils::table::Table;

pub fn handle(cmd: &Commands, cfg: &Config, actor: Option<&UserId>) -> AppResult<()> {
    let Commands::Project { action } = cmd else {
        return Ok(());
    };

    match action {
        ProjectAction::Add { name, quantity } => super::with_pipeline(cfg, |pipeline| {
            let lead = super::identity(&pipeline.services, actor).authorize(Route::Projects)?;
            let id = pipeline.directory().create_project(name, *quantity, &lead.id)?;
            success(format!("Project '{name}' created"));
            println!("{id}");
            Ok(())
        }),

        ProjectAction::Status { project, status } => super::with_pipeline(cfg, |pipeline| {
            super::identity(&pipeline.services, actor).authorize(Route::Projects)?;
            let status = ProjectStatus::from(*status);
            let updated = pipeline
                .directory()
                .set_project_status(&ProjectId::from(project.as_str()), status)?;
            success(format!(
                "Project '{}' is now {}",
                updated.name,
                status.to_db_str()
            ));
            Ok(())
        }),

        ProjectAction::List => {
            let services = Services::open(cfg)?;
            let projects = services.directory.list_projects()?;
            if projects.is_empty() {
                info("No projects.");
                return Ok(());
            }
            let mut table = Table::new(["ID", "NAME", "QTY", "STATUS", "OWNER", "CREATED"]);
            for p in projects {
                table.add_row(vec![
                    p.id.to_string(),
                    p.name,
                    p.total_quantity.to_string(),
                    p.status.to_db_str().to_string(),
                    p.created_by.to_string(),
                    fmt_local(&p.created_at),
                ]);
            }
            print!("{}", table.render());
            Ok(())
        }
    }
}
