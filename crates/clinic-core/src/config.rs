//! Runtime configuration read from the environment.
//!
//! A `.env` file in the working directory is loaded first when present.

use std::env;
use std::path::PathBuf;

pub const DB_PATH_VAR: &str = "CLINIC_DB_PATH";
pub const LOG_FILTER_VAR: &str = "CLINIC_LOG";

const DEFAULT_DB_PATH: &str = "clinic.db";
const DEFAULT_LOG_FILTER: &str = "info";

/// Settings for opening the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    /// SQLite database file
    pub database_path: PathBuf,
    /// `tracing_subscriber::EnvFilter` directive string
    pub log_filter: String,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DB_PATH),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl CoreConfig {
    /// Load `.env` (if any), then read the process environment.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        Self {
            database_path: read(DB_PATH_VAR)
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),
            log_filter: read(LOG_FILTER_VAR).unwrap_or(defaults.log_filter),
        }
    }
}
