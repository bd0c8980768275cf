use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tasklane_common::{Error, Result};
use tracing::{error, info, warn};

use super::source::MigrationSource;
use super::tracking::{self, ExecutionRecord};
use super::unit::Migration;
use crate::database::{Database, validate_identifier};

pub const DEFAULT_TABLE: &str = "migrations";

/// Progress notifications emitted while units are applied or reverted.
#[derive(Debug, Clone, Copy)]
pub enum MigrationEvent<'a> {
    Applying { id: &'a str, description: &'a str },
    Applied { id: &'a str, elapsed: Duration },
    RollingBack { id: &'a str, description: &'a str },
    RolledBack { id: &'a str, elapsed: Duration },
}

type ProgressFn = Box<dyn Fn(MigrationEvent<'_>) + Send + Sync>;

/// Outcome of [`Migrator::apply_pending`].
#[derive(Debug, Clone, Default)]
pub struct MigrationRunResult {
    /// Ids applied by this run, in application order.
    pub applied: Vec<String>,
    /// Declared units that were already applied before the run.
    /// Records whose source is gone are not counted.
    pub skipped_count: usize,
    pub elapsed: Duration,
}

/// Outcome of [`Migrator::rollback_last`].
#[derive(Debug, Clone, Default)]
pub struct RollbackResult {
    /// `None` when there was nothing to roll back.
    pub rolled_back: Option<String>,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum UnitState {
    Applied { executed_at: DateTime<Utc> },
    Pending,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnitStatus {
    pub id: String,
    pub description: String,
    #[serde(flatten)]
    pub state: UnitState,
}

#[derive(Debug, Clone, Serialize)]
pub struct MigrationStatusReport {
    pub source: String,
    pub units: Vec<UnitStatus>,
    /// Recorded as applied but missing from source.
    pub drifted: Vec<ExecutionRecord>,
    pub tables: Vec<String>,
}

impl MigrationStatusReport {
    pub fn total(&self) -> usize {
        self.units.len()
    }

    pub fn applied_count(&self) -> usize {
        self.units
            .iter()
            .filter(|u| matches!(u.state, UnitState::Applied { .. }))
            .count()
    }

    pub fn pending_count(&self) -> usize {
        self.total() - self.applied_count()
    }
}

/// Brings the schema forward one unit at a time and undoes the latest unit.
///
/// Assumes it is the only process migrating the store; there is no lock
/// across processes.
pub struct Migrator {
    db: Arc<Database>,
    source: Box<dyn MigrationSource>,
    table: String,
    progress: Option<ProgressFn>,
}

impl Migrator {
    pub fn new(db: Arc<Database>, source: Box<dyn MigrationSource>) -> Self {
        Self {
            db,
            source,
            table: DEFAULT_TABLE.to_string(),
            progress: None,
        }
    }

    /// Track executions in `table` instead of `migrations`.
    pub fn with_table(mut self, table: impl Into<String>) -> Result<Self> {
        let table = table.into();
        validate_identifier(&table)?;
        self.table = table;
        Ok(self)
    }

    pub fn on_progress<F>(mut self, f: F) -> Self
    where
        F: Fn(MigrationEvent<'_>) + Send + Sync + 'static,
    {
        self.progress = Some(Box::new(f));
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn source(&self) -> &dyn MigrationSource {
        self.source.as_ref()
    }

    fn emit(&self, event: MigrationEvent<'_>) {
        if let Some(progress) = &self.progress {
            progress(event);
        }
    }

    pub fn ensure_tracking_store(&self) -> Result<()> {
        self.db
            .with_connection(|conn| tracking::ensure_table(conn, &self.table))
    }

    /// Every declared unit, sorted by id, duplicates dropped.
    pub fn discover(&self) -> Result<Vec<Arc<dyn Migration>>> {
        let mut units = self.source.load()?;
        units.sort_by(|a, b| a.id().cmp(b.id()));

        let mut seen = HashSet::new();
        units.retain(|unit| {
            let fresh = seen.insert(unit.id().to_string());
            if !fresh {
                warn!("duplicate migration id {}, keeping the first one", unit.id());
            }
            fresh
        });
        Ok(units)
    }

    pub fn list_applied(&self) -> Result<Vec<ExecutionRecord>> {
        self.db
            .with_connection(|conn| tracking::list(conn, &self.table))
    }

    /// Discovered units with no execution record, in discovery order.
    pub fn pending(&self) -> Result<Vec<Arc<dyn Migration>>> {
        let applied: HashSet<String> = self.list_applied()?.into_iter().map(|r| r.id).collect();
        Ok(self
            .discover()?
            .into_iter()
            .filter(|unit| !applied.contains(unit.id()))
            .collect())
    }

    /// Apply every pending unit in ascending id order, one transaction each.
    ///
    /// Stops at the first failure. Units applied before it stay committed.
    pub fn apply_pending(&self) -> Result<MigrationRunResult> {
        let start = Instant::now();
        self.ensure_tracking_store()?;

        let declared = self.discover()?.len();
        let pending = self.pending()?;
        let skipped_count = declared - pending.len();

        if pending.is_empty() {
            info!("no pending migrations");
            return Ok(MigrationRunResult {
                applied: Vec::new(),
                skipped_count,
                elapsed: start.elapsed(),
            });
        }

        info!("{} pending migrations found", pending.len());

        let mut applied = Vec::with_capacity(pending.len());
        for unit in &pending {
            if let Err(e) = self.apply_one(unit.as_ref()) {
                error!(
                    "migration run stopped at {}: {} of {} pending applied",
                    unit.id(),
                    applied.len(),
                    pending.len()
                );
                return Err(e);
            }
            applied.push(unit.id().to_string());
        }

        info!("all migrations completed successfully");
        Ok(MigrationRunResult {
            applied,
            skipped_count,
            elapsed: start.elapsed(),
        })
    }

    /// Apply one unit and record it in the same transaction.
    pub fn apply_one(&self, unit: &dyn Migration) -> Result<()> {
        let start = Instant::now();
        info!("running migration {} - {}", unit.id(), unit.description());
        self.emit(MigrationEvent::Applying {
            id: unit.id(),
            description: unit.description(),
        });

        self.db
            .transaction(|tx| {
                unit.up(tx)?;
                tracking::insert(tx, &self.table, unit.id(), unit.description())
            })
            .map_err(|e| Error::migration(unit.id(), e))?;

        let elapsed = start.elapsed();
        info!("migration completed: {} ({elapsed:?})", unit.id());
        self.emit(MigrationEvent::Applied {
            id: unit.id(),
            elapsed,
        });
        Ok(())
    }

    /// Revert the most recently applied unit (latest `executed_at`).
    pub fn rollback_last(&self) -> Result<RollbackResult> {
        let start = Instant::now();
        let applied = self.list_applied()?;

        let Some(last) = applied.last() else {
            info!("no migrations to roll back");
            return Ok(RollbackResult {
                rolled_back: None,
                elapsed: start.elapsed(),
            });
        };

        let unit = self
            .discover()?
            .into_iter()
            .find(|unit| unit.id() == last.id)
            .ok_or_else(|| {
                Error::Drift(format!(
                    "migration {} is recorded as applied but its source was not found",
                    last.id
                ))
            })?;

        info!("rolling back migration {} - {}", unit.id(), unit.description());
        self.emit(MigrationEvent::RollingBack {
            id: unit.id(),
            description: unit.description(),
        });

        self.db
            .transaction(|tx| {
                unit.down(tx)?;
                tracking::delete(tx, &self.table, unit.id())
            })
            .map_err(|e| Error::migration(unit.id(), e))?;

        let elapsed = start.elapsed();
        info!("migration rolled back: {}", unit.id());
        self.emit(MigrationEvent::RolledBack {
            id: unit.id(),
            elapsed,
        });

        Ok(RollbackResult {
            rolled_back: Some(unit.id().to_string()),
            elapsed: start.elapsed(),
        })
    }

    /// Applied/pending state of every unit, plus drift and existing tables.
    pub fn status(&self) -> Result<MigrationStatusReport> {
        self.ensure_tracking_store()?;

        let records = self.list_applied()?;
        let units = self.discover()?;
        let declared: HashSet<&str> = units.iter().map(|u| u.id()).collect();

        let drifted: Vec<ExecutionRecord> = records
            .iter()
            .filter(|r| !declared.contains(r.id.as_str()))
            .cloned()
            .collect();

        let units = units
            .iter()
            .map(|unit| {
                let state = records
                    .iter()
                    .find(|r| r.id == unit.id())
                    .map(|r| UnitState::Applied {
                        executed_at: r.executed_at,
                    })
                    .unwrap_or(UnitState::Pending);
                UnitStatus {
                    id: unit.id().to_string(),
                    description: unit.description().to_string(),
                    state,
                }
            })
            .collect();

        Ok(MigrationStatusReport {
            source: self.source.describe(),
            units,
            drifted,
            tables: self.db.list_tables()?,
        })
    }
}
