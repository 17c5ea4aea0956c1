use crate::cli::parser::Commands;
use crate::config::Config;
use crate::errors::AppResult;
use crate::ui::messages::{info, success, warning};

/// Handle the `config` subcommand
pub fn handle(cmd: &Commands, cfg: &Config) -> AppResult<()> {
    if let Commands::Config {
        print_config,
        check,
    } = cmd
    {
        if *print_config {
            println!("📄 Current configuration:\n");
            println!("{}", cfg.to_yaml()?);
        }

        if *check {
            let path = Config::config_file();
            if !path.exists() {
                warning(format!(
                    "No configuration file at {}; defaults are in use.",
                    path.display()
                ));
                return Ok(());
            }

            let missing = Config::missing_keys(&path)?;
            if missing.is_empty() {
                success(format!("{} is complete.", path.display()));
            } else {
                for key in &missing {
                    warning(format!("Missing key '{key}' (default value used)"));
                }
                info("Run `shopfloor init` to rewrite the file with every key.");
            }
        }
    }

    Ok(())
}
