use crate::cli::parser::{Commands, UserAction};
use crate::config::Config;
use crate::core::pipeline::Services;
use crate::errors::AppResult;
use crate::models::role::Role;
use crate::ui::messages::{info, success};
use crate::utils::table::Table;

pub fn handle(cmd: &Commands, cfg: &Config) -> AppResult<()> {
    let Commands::User { action } = cmd else {
        return Ok(());
    };
    let services = Services::open(cfg)?;

    match action {
        UserAction::Add { name, email, role } => {
            let role = Role::from(*role);
            let id = services.directory.create_user(name, email, role)?;
            success(format!("User '{name}' created as {role}"));
            println!("{id}");
        }
        UserAction::List => {
            let users = services.directory.users()?;
            if users.is_empty() {
                info("No users.");
                return Ok(());
            }
            let mut table = Table::new(["ID", "NAME", "ROLE", "EMAIL"]);
            for u in users {
                table.add_row(vec![u.id.to_string(), u.name, u.role.to_string(), u.email]);
            }
            print!("{}", table.render());
        }
    }
    Ok(())
}
