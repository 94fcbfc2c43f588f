//! Process configuration resolved from the environment at startup.
//!
//! Only `run()` reads this; the record store and aggregator take explicit
//! arguments.

use std::path::PathBuf;

/// Application directory name under the platform data directory.
pub const APP_DIR_NAME: &str = "payment-daybook";
pub const DEFAULT_DB_FILE: &str = "payments.db";
pub const DEFAULT_LOG_FILTER: &str = "info,payment_daybook_lib=debug";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub db_file: String,
    pub log_filter: String,
}

impl AppConfig {
    /// Resolve configuration from the environment.
    ///
    /// - `DAYBOOK_DATA_DIR` overrides the data directory; otherwise
    ///   `LOCALAPPDATA` / `XDG_DATA_HOME` / `~/.local/share` joined with
    ///   `payment-daybook`.
    /// - `DAYBOOK_DB_FILE` overrides the database file name.
    /// - `RUST_LOG` overrides the log filter.
    pub fn from_env() -> Self {
        let data_dir = env_non_empty("DAYBOOK_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| platform_data_dir().join(APP_DIR_NAME));

        Self {
            data_dir,
            db_file: env_non_empty("DAYBOOK_DB_FILE").unwrap_or_else(|| DEFAULT_DB_FILE.into()),
            log_filter: env_non_empty("RUST_LOG").unwrap_or_else(|| DEFAULT_LOG_FILTER.into()),
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(&self.db_file)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn platform_data_dir() -> PathBuf {
    env_non_empty("LOCALAPPDATA")
        .or_else(|| env_non_empty("XDG_DATA_HOME"))
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            #[cfg(target_os = "windows")]
            {
                PathBuf::from(std::env::var("USERPROFILE").unwrap_or_else(|_| ".".into()))
                    .join("AppData")
                    .join("Local")
            }
            #[cfg(not(target_os = "windows"))]
            {
                PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()))
                    .join(".local")
                    .join("share")
            }
        })
}
