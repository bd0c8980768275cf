pub mod migrate;
pub mod seed;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tasklane_config::AppConfig;
use tasklane_db::{Database, DirectorySource, EmbeddedSource, MigrationSource};
use tracing::warn;

/// Open the configured database, run `f`, then close the handle.
///
/// Fails before `f` runs when the store cannot be reached. A close error is
/// reported only if `f` itself succeeded.
pub fn with_database<T, F>(config: &AppConfig, f: F) -> Result<T>
where
    F: FnOnce(&Arc<Database>) -> Result<T>,
{
    let path = config.database_path();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let timeout = Duration::from_millis(config.database.busy_timeout_ms);
    let db = Database::open_with_timeout(&path, timeout)
        .with_context(|| format!("could not connect to database {}", path.display()))?;
    let db = Arc::new(db);

    let outcome = f(&db);

    match Arc::try_unwrap(db) {
        Ok(db) => {
            if let Err(e) = db.close() {
                if outcome.is_ok() {
                    return Err(e).context("failed to close database");
                }
                warn!("failed to close database: {e}");
            }
        }
        Err(_) => warn!("database handle still shared at exit, dropping it"),
    }
    outcome
}

/// Migration directory when configured, else the compiled-in schema.
pub fn migration_source(config: &AppConfig) -> Box<dyn MigrationSource> {
    match &config.migrations.directory {
        Some(dir) => Box::new(DirectorySource::new(dir)),
        None => Box::new(EmbeddedSource::builtin()),
    }
}

/// The directory `migration_source` scans. An error when none is configured.
pub fn migrations_dir(config: &AppConfig) -> Result<PathBuf> {
    config.migrations.directory.clone().ok_or_else(|| {
        anyhow!(
            "no migrations directory configured: pass --migrations-dir, set \
             migrations.directory or TASKLANE_MIGRATIONS_DIR"
        )
    })
}
