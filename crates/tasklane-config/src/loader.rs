use std::path::{Path, PathBuf};

use tasklane_common::{Error, Result};
use tracing::{debug, info};

use crate::model::AppConfig;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "TASKLANE_CONFIG";

const LOCAL_CANDIDATES: &[&str] = &["tasklane.yml", "tasklane.yaml", "tasklane.toml"];

/// Resolves and parses the tasklane configuration.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from the first source that exists:
    /// `explicit`, `$TASKLANE_CONFIG`, `./tasklane.{yml,yaml,toml}`,
    /// `<config dir>/tasklane/config.yml`, else built-in defaults.
    /// Environment overrides are applied on top. Validation is left to the
    /// caller so command-line overrides can still correct the result.
    pub fn load(explicit: Option<&Path>) -> Result<AppConfig> {
        let mut config = match Self::resolve_path(explicit) {
            Some(path) => {
                info!("loading config from {}", path.display());
                Self::from_file(&path)?
            }
            None => {
                debug!("no config file found, using defaults");
                AppConfig::default()
            }
        };

        Self::apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Parse a single config file, picking the format from its extension.
    pub fn from_file(path: &Path) -> Result<AppConfig> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read {}: {e}", path.display()))
        })?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext {
            "yml" | "yaml" => serde_yaml::from_str(&contents)
                .map_err(|e| Error::Config(format!("YAML parse error: {e}"))),
            "toml" => toml::from_str(&contents)
                .map_err(|e| Error::Config(format!("TOML parse error: {e}"))),
            other => Err(Error::Config(format!(
                "unsupported config extension: {other}"
            ))),
        }
    }

    /// Default location used by `tasklane init`.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tasklane")
            .join("config.yml")
    }

    fn resolve_path(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }

        if let Ok(path) = std::env::var(CONFIG_ENV)
            && !path.is_empty()
        {
            return Some(PathBuf::from(path));
        }

        LOCAL_CANDIDATES
            .iter()
            .map(PathBuf::from)
            .find(|p| p.exists())
            .or_else(|| Some(Self::default_path()).filter(|p| p.exists()))
    }

    /// Apply `TASKLANE_*` overrides, reading variables through `lookup`.
    pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(env) = lookup("TASKLANE_ENV") {
            config.environment = env.parse()?;
        }

        if let Some(path) = lookup("TASKLANE_DATABASE_PATH") {
            config.database.path = Some(PathBuf::from(path));
        }

        if let Some(timeout) = lookup("TASKLANE_DATABASE_BUSY_TIMEOUT_MS") {
            config.database.busy_timeout_ms = timeout.parse().map_err(|e| {
                Error::Config(format!("invalid TASKLANE_DATABASE_BUSY_TIMEOUT_MS: {e}"))
            })?;
        }

        if let Some(dir) = lookup("TASKLANE_MIGRATIONS_DIR") {
            config.migrations.directory = Some(PathBuf::from(dir));
        }

        if let Some(table) = lookup("TASKLANE_MIGRATIONS_TABLE") {
            config.migrations.table = table;
        }

        if let Some(table) = lookup("TASKLANE_SEEDS_TABLE") {
            config.seeds.table = table;
        }

        if let Some(level) = lookup("TASKLANE_LOG_LEVEL") {
            config.log.level = level;
        }

        if let Some(format) = lookup("TASKLANE_LOG_FORMAT") {
            config.log.format = format;
        }

        Ok(())
    }
}
