use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Seconds without heartbeat after which a live subscription is dead.
    #[serde(default = "default_liveness_window")]
    pub liveness_window_secs: u64,
    #[serde(default = "default_reaper_interval")]
    pub reaper_interval_secs: u64,
    #[serde(default = "default_feed_capacity")]
    pub feed_buffer_capacity: usize,
    #[serde(default = "default_subscriber_capacity")]
    pub subscriber_buffer_capacity: usize,
    #[serde(default = "default_retry_attempts")]
    pub store_retry_attempts: u32,
    #[serde(default = "default_retry_backoff")]
    pub store_retry_backoff_ms: u64,
    #[serde(default = "default_busy_timeout")]
    pub store_busy_timeout_ms: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_liveness_window() -> u64 {
    30
}
fn default_reaper_interval() -> u64 {
    5
}
fn default_feed_capacity() -> usize {
    1024
}
fn default_subscriber_capacity() -> usize {
    256
}
fn default_retry_attempts() -> u32 {
    3
}
fn default_retry_backoff() -> u64 {
    50
}
fn default_busy_timeout() -> u64 {
    2000
}

/// Keys every config file is expected to carry. Used by `config --check`.
const KNOWN_KEYS: &[&str] = &[
    "database",
    "log_level",
    "liveness_window_secs",
    "reaper_interval_secs",
    "feed_buffer_capacity",
    "subscriber_buffer_capacity",
    "store_retry_attempts",
    "store_retry_backoff_ms",
    "store_busy_timeout_ms",
];

impl Default for Config {
    fn default() -> Self {
        Self::with_database(Self::database_file())
    }
}

impl Config {
    /// Defaults pointing at an explicit database file.
    pub fn with_database(path: impl AsRef<Path>) -> Self {
        Self {
            database: path.as_ref().to_string_lossy().to_string(),
            log_level: default_log_level(),
            liveness_window_secs: default_liveness_window(),
            reaper_interval_secs: default_reaper_interval(),
            feed_buffer_capacity: default_feed_capacity(),
            subscriber_buffer_capacity: default_subscriber_capacity(),
            store_retry_attempts: default_retry_attempts(),
            store_retry_backoff_ms: default_retry_backoff(),
            store_busy_timeout_ms: default_busy_timeout(),
        }
    }

    /// Return the standard configuration directory depending on the platform
    pub fn config_dir() -> PathBuf {
        if cfg!(target_os = "windows") {
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("shopfloor")
        } else {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".shopfloor")
        }
    }

    /// Return the full path of the config file
    pub fn config_file() -> PathBuf {
        Self::config_dir().join("shopfloor.conf")
    }

    /// Return the full path of the SQLite database
    pub fn database_file() -> PathBuf {
        Self::config_dir().join("shopfloor.sqlite")
    }

    pub fn liveness_window(&self) -> Duration {
        Duration::from_secs(self.liveness_window_secs)
    }

    pub fn reaper_interval(&self) -> Duration {
        Duration::from_secs(self.reaper_interval_secs.max(1))
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.store_retry_backoff_ms)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.store_busy_timeout_ms)
    }

    /// Load configuration from file, or return defaults if not found
    pub fn load() -> AppResult<Self> {
        Self::load_from(&Self::config_file())
    }

    pub fn load_from(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        serde_yaml::from_str(&content)
            .map_err(|e| AppError::Config(format!("cannot parse {}: {e}", path.display())))
    }

    pub fn to_yaml(&self) -> AppResult<String> {
        serde_yaml::to_string(self)
            .map_err(|e| AppError::Config(format!("cannot serialize configuration: {e}")))
    }

    /// Keys absent from the YAML file at `path` (they fall back to defaults).
    pub fn missing_keys(path: &Path) -> AppResult<Vec<&'static str>> {
        let content = fs::read_to_string(path)?;
        let yaml: Value = serde_yaml::from_str(&content)
            .map_err(|e| AppError::Config(format!("cannot parse {}: {e}", path.display())))?;

        let Some(map) = yaml.as_mapping() else {
            return Ok(KNOWN_KEYS.to_vec());
        };

        Ok(KNOWN_KEYS
            .iter()
            .copied()
            .filter(|key| !map.contains_key(Value::String((*key).to_string())))
            .collect())
    }

    /// Initialize configuration and database files.
    /// Returns the configuration that was written (or would have been, in test mode).
    pub fn init_all(custom_db: Option<String>, is_test: bool) -> AppResult<Self> {
        let dir = Self::config_dir();

        // DB name: user provided or default
        let db_path = match custom_db {
            Some(name) => {
                let p = Path::new(&name);
                if p.is_absolute() {
                    p.to_path_buf()
                } else {
                    dir.join(p)
                }
            }
            None => Self::database_file(),
        };

        let config = Self::with_database(&db_path);

        if !is_test {
            fs::create_dir_all(&dir)?;
            fs::write(Self::config_file(), config.to_yaml()?)?;
        }

        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        if !db_path.exists() {
            fs::File::create(&db_path)?;
        }

        Ok(config)
    }
}
