use std::path::{Path, PathBuf};

use ermon_common::{Error, Result};
use tracing::{debug, info};

use crate::model::AppConfig;

pub const ENV_DATABASE_PATH: &str = "ERMON_DATABASE_PATH";
pub const ENV_ENDPOINT: &str = "ERMON_ENDPOINT";

/// Resolves an `AppConfig` from an optional file plus environment overrides.
pub struct ConfigLoader {
    path: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    /// Load the config. A missing file is not an error: defaults apply.
    pub fn load(&self) -> Result<AppConfig> {
        // .env is optional
        if let Ok(path) = dotenvy::dotenv() {
            debug!("loaded environment from {}", path.display());
        }

        let mut config = match &self.path {
            Some(path) if path.exists() => {
                let config = parse_file(path)?;
                info!("config loaded from {}", path.display());
                config
            }
            Some(path) => {
                debug!("config file {} not found, using defaults", path.display());
                AppConfig::default()
            }
            None => AppConfig::default(),
        };

        apply_env_overrides(&mut config, |key| std::env::var(key).ok());
        Ok(config)
    }
}

fn parse_file(path: &Path) -> Result<AppConfig> {
    let contents = std::fs::read_to_string(path)?;

    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    match ext {
        "yml" | "yaml" => serde_yaml::from_str(&contents)
            .map_err(|e| Error::Config(format!("YAML parse error: {e}"))),
        "toml" => {
            toml::from_str(&contents).map_err(|e| Error::Config(format!("TOML parse error: {e}")))
        }
        other => Err(Error::Config(format!(
            "unsupported config extension: {other}"
        ))),
    }
}

fn apply_env_overrides(config: &mut AppConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(path) = lookup(ENV_DATABASE_PATH).filter(|v| !v.is_empty()) {
        config.database.path = PathBuf::from(path);
    }
    if let Some(endpoint) = lookup(ENV_ENDPOINT).filter(|v| !v.is_empty()) {
        config.scraper.endpoint = endpoint;
    }
}
