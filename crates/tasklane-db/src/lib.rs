pub mod database;
pub mod migrations;
pub mod seeds;

pub use database::Database;
pub use migrations::{
    DirectorySource, EmbeddedSource, ExecutionRecord, Migration, MigrationEvent,
    MigrationGenerator, MigrationRunResult, MigrationSource, MigrationStatusReport, Migrator,
    RollbackResult, SqlMigration, Template, UnitState, UnitStatus,
};
pub use seeds::{SeedRecord, SeedRunResult, SeedRunner, SeedStatus, Seeder};
