//! shopfloor library root.
//! Work-session lifecycle, change feed, notification routing and live
//! fan-out, plus the CLI that drives them.

pub mod cli;
pub mod config;
pub mod core;
pub mod db;
pub mod errors;
pub mod export;
pub mod models;
pub mod ui;
pub mod utils;

use clap::Parser;
use cli::parser::{Cli, Commands};
use config::Config;
use errors::AppResult;
use tracing_subscriber::EnvFilter;

/// Environment variable overriding the configured log filter.
pub const LOG_ENV: &str = "SHOPFLOOR_LOG";

/// Central command dispatcher
pub fn dispatch(cli: &Cli, cfg: &Config) -> AppResult<()> {
    let actor = cli.actor();
    let actor = actor.as_ref();

    match &cli.command {
        Commands::Init => cli::commands::init::handle(cli),
        Commands::Config { .. } => cli::commands::config::handle(&cli.command, cfg),
        Commands::Log { .. } => cli::commands::log::handle(&cli.command, cfg),
        Commands::Whoami => cli::commands::whoami::handle(cfg, actor),
        Commands::User { .. } => cli::commands::user::handle(&cli.command, cfg),
        Commands::Project { .. } => cli::commands::project::handle(&cli.command, cfg, actor),
        Commands::Component { .. } => cli::commands::component::handle(&cli.command, cfg, actor),
        Commands::Process { .. } => cli::commands::process::handle(&cli.command, cfg, actor),
        Commands::Start { .. }
        | Commands::Progress(_)
        | Commands::Pause(_)
        | Commands::Resume(_)
        | Commands::End(_)
        | Commands::Sessions { .. } => cli::commands::session::handle(&cli.command, cfg, actor),
        Commands::Notifications { .. } => {
            cli::commands::notifications::handle(&cli.command, cfg, actor)
        }
        Commands::Analytics { .. } => cli::commands::analytics::handle(&cli.command, cfg, actor),
        Commands::Export { .. } => cli::commands::export::handle(&cli.command, cfg),
        Commands::Watch { .. } => cli::commands::watch::handle(&cli.command, cfg),
    }
}

/// Install the stderr diagnostics subscriber. `SHOPFLOOR_LOG` wins over the
/// configured level. Calling it twice is harmless.
pub fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Entry point used by main.rs
pub fn run() -> AppResult<()> {
    let cli = Cli::parse();

    let mut cfg = Config::load()?;
    if let Some(custom_db) = &cli.db {
        cfg.database = custom_db.clone();
    }

    init_tracing(&cfg.log_level);

    dispatch(&cli, &cfg)
}
