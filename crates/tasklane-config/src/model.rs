use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tasklane_common::{Error, Result};

const LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];
const LOG_FORMATS: &[&str] = &["pretty", "compact", "json"];

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier regex"));

/// Top-level configuration for the tasklane tooling.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub migrations: MigrationsConfig,
    pub seeds: SeedsConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
    Test,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Environment::Development => "development",
            Environment::Production => "production",
            Environment::Test => "test",
        };
        f.write_str(name)
    }
}

impl FromStr for Environment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            "test" => Ok(Environment::Test),
            other => Err(Error::Config(format!(
                "unknown environment '{other}' (expected development, production or test)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database file. Defaults to `<data dir>/tasklane/tasklane.db`.
    pub path: Option<PathBuf>,
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MigrationsConfig {
    /// Directory of `*.sql` migrations. When unset, the compiled-in schema is used.
    pub directory: Option<PathBuf>,
    pub table: String,
}

impl Default for MigrationsConfig {
    fn default() -> Self {
        Self {
            directory: None,
            table: "migrations".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SeedsConfig {
    pub table: String,
}

impl Default for SeedsConfig {
    fn default() -> Self {
        Self {
            table: "seeders".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub format: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

impl AppConfig {
    /// Reject values that would only fail later, deep inside a command.
    pub fn validate(&self) -> Result<()> {
        let level = self.log.level.to_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(Error::Config(format!(
                "invalid log level '{}' (expected one of: {})",
                self.log.level,
                LOG_LEVELS.join(", ")
            )));
        }

        let format = self.log.format.to_lowercase();
        if !LOG_FORMATS.contains(&format.as_str()) {
            return Err(Error::Config(format!(
                "invalid log format '{}' (expected one of: {})",
                self.log.format,
                LOG_FORMATS.join(", ")
            )));
        }

        validate_identifier("migrations.table", &self.migrations.table)?;
        validate_identifier("seeds.table", &self.seeds.table)?;

        if self.migrations.table == self.seeds.table {
            return Err(Error::Config(
                "migrations.table and seeds.table must differ".into(),
            ));
        }

        Ok(())
    }

    /// Database file to open, falling back to the platform data directory.
    pub fn database_path(&self) -> PathBuf {
        self.database.path.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("tasklane")
                .join("tasklane.db")
        })
    }
}

fn validate_identifier(field: &str, value: &str) -> Result<()> {
    if IDENTIFIER.is_match(value) {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "{field} must be a plain SQL identifier, got '{value}'"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.migrations.table, "migrations");
        assert_eq!(config.seeds.table, "seeders");
        assert_eq!(config.environment, Environment::Development);
    }

    #[test]
    fn rejects_unknown_log_level() {
        let mut config = AppConfig::default();
        config.log.level = "verbose".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("invalid log level"));
    }

    #[test]
    fn rejects_table_names_that_are_not_identifiers() {
        let mut config = AppConfig::default();
        config.migrations.table = "migrations; DROP TABLE users".into();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.seeds.table = "migrations".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn environment_parses_short_names() {
        assert_eq!("prod".parse::<Environment>().unwrap(), Environment::Production);
        assert_eq!(" Test ".parse::<Environment>().unwrap(), Environment::Test);
        assert!("staging".parse::<Environment>().is_err());
    }

    #[test]
    fn explicit_database_path_wins() {
        let mut config = AppConfig::default();
        config.database.path = Some(PathBuf::from("/tmp/tasks.db"));
        assert_eq!(config.database_path(), PathBuf::from("/tmp/tasks.db"));
    }
}
