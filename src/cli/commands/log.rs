use crate::cli::parser::Commands;
use crate::config::Config;
use crate::core::log::LogLogic;
use crate::core::pipeline::Services;
use crate::errors::AppResult;

pub fn handle(cmd: &Commands, cfg: &Config) -> AppResult<()> {
    if matches!(cmd, Commands::Log { print: true }) {
        let services = Services::open(cfg)?;
        LogLogic::print_log(&services.pool)?;
    }

    Ok(())
}
