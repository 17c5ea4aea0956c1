use crate::cli::parser::{Commands, ComponentAction};
use crate::config::Config;
use crate::core::identity::IdentityProvider;
use crate::core::pipeline::Services;
use crate::errors::AppResult;
use crate::models::ids::{ProjectId, UserId};
use crate::models::role::Route;
use crate::ui::messages::{info, success};
use crate::utils::table::Table;

pub fn handle(cmd: &Commands, cfg: &Config, actor: Option<&UserId>) -> AppResult<()> {
    let Commands::Component { action } = cmd else {
        return Ok(());
    };
    let services = Services::open(cfg)?;

    match action {
        ComponentAction::Add {
            project,
            name,
            quantity,
        } => {
            super::identity(&services, actor).authorize(Route::Projects)?;
            let id = services
                .directory
                .add_component(&ProjectId::from(project.as_str()), name, *quantity)?;
            success(format!("Component '{name}' added to project {project}"));
            println!("{id}");
        }
        ComponentAction::List { project } => {
            let components = services
                .directory
                .components_for(&ProjectId::from(project.as_str()))?;
            if components.is_empty() {
                info(format!("Project {project} has no components."));
                return Ok(());
            }
            let mut table = Table::new(["ID", "NAME", "QTY"]);
            for c in components {
                table.add_row(vec![c.id.to_string(), c.name, c.quantity.to_string()]);
            }
            print!("{}", table.render());
        }
    }
    Ok(())
}
