use crate::cli::parser::Cli;
use crate::config::Config;
use crate::core::pipeline::Services;
use crate::db::log;
use crate::errors::AppResult;
use crate::ui::messages::{success, warning};

/// Handle the `init` command
///
/// Creates the config directory and file (unless `--test`), the SQLite
/// database, and applies every pending migration.
pub fn handle(cli: &Cli) -> AppResult<()> {
    let cfg = Config::init_all(cli.db.clone(), cli.test)?;

    println!("⚙️  Initializing shopfloor…");
    if !cli.test {
        println!("📄 Config file : {}", Config::config_file().display());
    }
    println!("🗄️  Database   : {}", cfg.database);

    let services = Services::open(&cfg)?;

    let logged = services.pool.with_conn(|conn| {
        log::ttlog(
            conn,
            "init",
            "",
            &format!("Database initialized at {}", cfg.database),
        )
    });
    if let Err(e) = logged {
        warning(format!("Failed to write internal log: {e}"));
    }

    success(format!("Database initialized at {}", cfg.database));
    Ok(())
}
