use crate::cli::parser::Commands;
use crate::config::Config;
use crate::core::pipeline::Services;
use crate::errors::AppResult;
use crate::export::ExportLogic;
use crate::models::ids::UserId;

pub fn handle(cmd: &Commands, cfg: &Config) -> AppResult<()> {
    if let Commands::Export {
        format,
        file,
        assembler,
        force,
    } = cmd
    {
        let services = Services::open(cfg)?;
        let assembler = assembler.as_deref().map(UserId::from);
        ExportLogic::export(&services, *format, file, assembler.as_ref(), *force)?;
    }
    Ok(())
}
