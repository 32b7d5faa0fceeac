use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const DEFAULT_ENDPOINT: &str = "https://wdf.princeedwardisland.ca/api/workflow";
pub const DEFAULT_LOG_FILE: &str = "waittimes.log";

/// Top-level configuration, read from `config.yml` / `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub scraper: ScraperConfig,

    /// Where the CLI writes its log. `-` means stderr.
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl AppConfig {
    pub fn log_file(&self) -> PathBuf {
        self.log_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

fn default_database_path() -> PathBuf {
    PathBuf::from("waittimes.db")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Facility codes, e.g. `QEH`. Each becomes `ERWaitTimes_<code>` on the wire.
    #[serde(default = "default_locations")]
    pub locations: Vec<String>,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
            locations: default_locations(),
        }
    }
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_locations() -> Vec<String> {
    vec!["QEH".to_string(), "PCH".to_string()]
}
