//! Schema migrations.
//!
//! A [`Migration`] is a forward/backward change with a sortable id. A
//! [`MigrationSource`] supplies the declared units, the tracking store
//! records which ones were applied, and the [`Migrator`] reconciles the two.

pub mod builtin;
pub mod engine;
pub mod generator;
pub mod source;
pub mod tracking;
pub mod unit;

pub use engine::{
    DEFAULT_TABLE, MigrationEvent, MigrationRunResult, MigrationStatusReport, Migrator,
    RollbackResult, UnitState, UnitStatus,
};
pub use generator::{MigrationGenerator, Template};
pub use source::{DirectorySource, EmbeddedSource, MIGRATION_EXTENSION, MigrationSource};
pub use tracking::ExecutionRecord;
pub use unit::{Migration, SqlMigration, description_from_id, validate_migration_id};
