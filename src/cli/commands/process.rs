use crate::cli::parser::{Commands, ProcessAction};
use crate::config::Config;
use crate::core::identity::IdentityProvider;
use crate::core::pipeline::Services;
use crate::errors::AppResult;
use crate::models::ids::UserId;
use crate::models::role::Route;
use crate::ui::messages::{info, success};
use crate::utils::table::Table;

pub fn handle(cmd: &Commands, cfg: &Config, actor: Option<&UserId>) -> AppResult<()> {
    let Commands::Process { action } = cmd else {
        return Ok(());
    };
    let services = Services::open(cfg)?;

    match action {
        ProcessAction::Add { name } => {
            super::identity(&services, actor).authorize(Route::Projects)?;
            let id = services.directory.create_process(name)?;
            success(format!("Process '{name}' created"));
            println!("{id}");
        }
        ProcessAction::List => {
            let processes = services.directory.processes()?;
            if processes.is_empty() {
                info("No processes.");
                return Ok(());
            }
            let mut table = Table::new(["ID", "NAME"]);
            for p in processes {
                table.add_row(vec![p.id.to_string(), p.name]);
            }
            print!("{}", table.render());
        }
    }
    Ok(())
}
