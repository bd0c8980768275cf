use std::path::{Path, PathBuf};
use std::sync::Arc;

use tasklane_common::{Error, Result};
use tracing::{debug, warn};

use super::builtin;
use super::unit::{Migration, SqlMigration, validate_migration_id};

/// File extension recognized by [`DirectorySource`].
pub const MIGRATION_EXTENSION: &str = "sql";

/// Supplies the declared migration units to the engine.
///
/// `load` is called afresh on every discovery pass. Implementations return
/// only well-formed units; anything malformed is logged and left out.
pub trait MigrationSource: Send + Sync {
    fn load(&self) -> Result<Vec<Arc<dyn Migration>>>;

    /// Short label used in banners and logs.
    fn describe(&self) -> String;
}

/// An explicit, caller-assembled registry of units.
pub struct EmbeddedSource {
    units: Vec<Arc<dyn Migration>>,
}

impl EmbeddedSource {
    pub fn new(units: Vec<Arc<dyn Migration>>) -> Self {
        Self { units }
    }

    /// The task backend schema compiled into this crate.
    pub fn builtin() -> Self {
        Self::new(builtin::migrations())
    }
}

impl MigrationSource for EmbeddedSource {
    fn load(&self) -> Result<Vec<Arc<dyn Migration>>> {
        let mut units = Vec::with_capacity(self.units.len());
        for unit in &self.units {
            match validate_migration_id(unit.id()) {
                Ok(()) => units.push(Arc::clone(unit)),
                Err(e) => warn!("skipping embedded migration: {e}"),
            }
        }
        Ok(units)
    }

    fn describe(&self) -> String {
        format!("embedded ({} units)", self.units.len())
    }
}

/// Reads `{id}_{slug}.sql` files from a directory.
pub struct DirectorySource {
    dir: PathBuf,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Sorted paths of every file carrying the migration extension.
    fn migration_files(&self) -> Result<Vec<PathBuf>> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| {
            Error::MigrationSource(format!(
                "failed to read migrations directory {}: {e}",
                self.dir.display()
            ))
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                Error::MigrationSource(format!("failed to read directory entry: {e}"))
            })?;
            let path = entry.path();
            if path.is_file() && path.extension().is_some_and(|x| x == MIGRATION_EXTENSION) {
                files.push(path);
            }
        }

        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(files)
    }
}

impl MigrationSource for DirectorySource {
    fn load(&self) -> Result<Vec<Arc<dyn Migration>>> {
        if !self.dir.exists() {
            warn!(
                "migrations directory {} does not exist, nothing to load",
                self.dir.display()
            );
            return Ok(Vec::new());
        }

        let mut units: Vec<Arc<dyn Migration>> = Vec::new();
        for path in self.migration_files()? {
            match load_file(&path) {
                Ok(migration) => {
                    debug!("loaded migration {}", migration.id);
                    units.push(Arc::new(migration));
                }
                Err(e) => warn!("skipping migration file {}: {e}", path.display()),
            }
        }
        Ok(units)
    }

    fn describe(&self) -> String {
        format!("directory {}", self.dir.display())
    }
}

fn load_file(path: &Path) -> Result<SqlMigration> {
    let id = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| Error::InvalidInput("file name is not valid UTF-8".into()))?;
    let source = std::fs::read_to_string(path)?;
    SqlMigration::parse(id, &source)
}
