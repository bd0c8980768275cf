use std::io::IsTerminal;
use std::sync::Arc;

use anyhow::{Context, Result};
use dialoguer::Confirm;
use serde_json::json;
use tasklane_config::AppConfig;
use tasklane_db::{
    Database, MigrationEvent, MigrationGenerator, MigrationStatusReport, Migrator, Template,
    UnitState,
};

use super::{migration_source, migrations_dir, with_database};
use crate::banner;

fn migrator(config: &AppConfig, db: &Arc<Database>) -> Result<Migrator> {
    let migrator = Migrator::new(Arc::clone(db), migration_source(config))
        .with_table(config.migrations.table.clone())
        .context("invalid migrations table name")?;
    Ok(migrator.on_progress(print_progress))
}

fn print_progress(event: MigrationEvent<'_>) {
    match event {
        MigrationEvent::Applying { id, description } => println!("  → {id} - {description}"),
        MigrationEvent::Applied { id, elapsed } => println!("  ✓ {id} ({elapsed:.2?})"),
        MigrationEvent::RollingBack { id, description } => {
            println!("  ← {id} - {description}")
        }
        MigrationEvent::RolledBack { id, elapsed } => {
            println!("  ✓ rolled back {id} ({elapsed:.2?})")
        }
    }
}

pub fn run(config: &AppConfig) -> Result<()> {
    with_database(config, |db| {
        let migrator = migrator(config, db)?;
        banner::print_banner("migrate", config, &migrator.source().describe());

        let pending = migrator.pending()?.len();
        let result = match migrator.apply_pending() {
            Ok(result) => result,
            Err(e) => {
                let left = migrator.pending().map(|p| p.len()).unwrap_or(pending);
                println!(
                    "Applied {} of {pending} pending migration(s) before the failure.",
                    pending.saturating_sub(left)
                );
                return Err(e).context("migration run failed");
            }
        };
        if result.applied.is_empty() {
            println!("No pending migrations. {} already applied.", result.skipped_count);
        } else {
            println!(
                "Applied {} migration(s) in {:.2?}.",
                result.applied.len(),
                result.elapsed
            );
        }
        Ok(())
    })
}

pub fn status(config: &AppConfig, as_json: bool) -> Result<()> {
    with_database(config, |db| {
        let migrator = migrator(config, db)?;
        let report = migrator
            .status()
            .context("failed to read migration status")?;

        if as_json {
            println!("{}", serde_json::to_string_pretty(&status_json(&report))?);
        } else {
            banner::print_banner("status", config, &migrator.source().describe());
            print_status(&report);
        }
        Ok(())
    })
}

fn status_json(report: &MigrationStatusReport) -> serde_json::Value {
    json!({
        "source": report.source,
        "total": report.total(),
        "applied": report.applied_count(),
        "pending": report.pending_count(),
        "units": report.units,
        "drifted": report.drifted,
        "tables": report.tables,
    })
}

fn print_status(report: &MigrationStatusReport) {
    println!("Migrations from {}", report.source);
    println!(
        "  total: {}  applied: {}  pending: {}",
        report.total(),
        report.applied_count(),
        report.pending_count()
    );
    println!();

    for unit in &report.units {
        match &unit.state {
            UnitState::Applied { executed_at } => println!(
                "  [applied] {}  {}  ({})",
                unit.id,
                unit.description,
                executed_at.format("%Y-%m-%d %H:%M:%S")
            ),
            UnitState::Pending => println!("  [pending] {}  {}", unit.id, unit.description),
        }
    }

    if !report.drifted.is_empty() {
        println!();
        println!("Recorded as applied but missing from source:");
        for record in &report.drifted {
            println!(
                "  [drift]   {}  ({})",
                record.id,
                record.executed_at.format("%Y-%m-%d %H:%M:%S")
            );
        }
    }

    println!();
    if report.tables.is_empty() {
        println!("Tables: none");
    } else {
        println!("Tables: {}", report.tables.join(", "));
    }
}

pub fn rollback(config: &AppConfig, yes: bool) -> Result<()> {
    with_database(config, |db| {
        let migrator = migrator(config, db)?;
        banner::print_banner("rollback", config, &migrator.source().describe());

        let applied = migrator.list_applied()?;
        let Some(last) = applied.last() else {
            println!("Nothing to roll back.");
            return Ok(());
        };

        if !yes && std::io::stdin().is_terminal() {
            let confirmed = Confirm::new()
                .with_prompt(format!("Roll back {}?", last.id))
                .default(false)
                .interact()
                .context("confirmation cancelled")?;
            if !confirmed {
                println!("Rollback cancelled.");
                return Ok(());
            }
        }

        let result = migrator.rollback_last().context("rollback failed")?;
        match result.rolled_back {
            Some(id) => println!("Rolled back {id} in {:.2?}.", result.elapsed),
            None => println!("Nothing to roll back."),
        }
        Ok(())
    })
}

pub fn create(config: &AppConfig, name: &str, template: Template) -> Result<()> {
    let dir = migrations_dir(config)?;
    let generator = MigrationGenerator::new(dir);
    let path = generator
        .generate(name, template)
        .context("failed to create migration")?;
    println!("Created {} ({template})", path.display());
    Ok(())
}

pub fn list(config: &AppConfig) -> Result<()> {
    if config.migrations.directory.is_none() {
        let units = migration_source(config).load()?;
        println!("{} built-in migration(s):", units.len());
        for unit in units {
            println!("  {}  {}", unit.id(), unit.description());
        }
        return Ok(());
    }

    let generator = MigrationGenerator::new(migrations_dir(config)?);
    let files = generator.list()?;
    if files.is_empty() {
        println!("No migration files in {}", generator.dir().display());
        return Ok(());
    }

    println!("{} migration file(s) in {}:", files.len(), generator.dir().display());
    for file in files {
        println!("  {file}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn config_in(dir: &std::path::Path) -> AppConfig {
        let mut config = AppConfig::default();
        config.database.path = Some(dir.join("tasklane.db"));
        config
    }

    #[test]
    fn run_then_status_then_rollback_against_builtin_schema() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config_in(tmp.path());

        run(&config).unwrap();
        let report = with_database(&config, |db| Ok(migrator(&config, db)?.status()?)).unwrap();
        assert_eq!(report.applied_count(), 6);

        let json = status_json(&report);
        assert_eq!(json["total"], 6);
        assert_eq!(json["pending"], 0);
        assert_eq!(json["units"][0]["state"], "applied");

        rollback(&config, true).unwrap();
        let report = with_database(&config, |db| Ok(migrator(&config, db)?.status()?)).unwrap();
        assert_eq!(report.pending_count(), 1);
        assert!(!report.tables.contains(&"subtasks".to_string()));
    }

    #[test]
    fn create_and_list_use_the_configured_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = config_in(tmp.path());
        let dir = tmp.path().join("db").join("migrations");
        config.migrations.directory = Some(dir.clone());

        create(&config, "create posts table", Template::CreateTable).unwrap();
        let files = MigrationGenerator::new(&dir).list().unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("_create_posts_table.sql"));
        list(&config).unwrap();

        run(&config).unwrap();
        let tables = with_database(&config, |db| Ok(db.list_tables()?)).unwrap();
        assert!(tables.contains(&"posts".to_string()));
        assert!(!tables.contains(&"users".to_string()));
        assert_eq!(migrations_dir(&config).unwrap(), PathBuf::from(&dir));
    }

    #[test]
    fn create_without_a_directory_is_refused() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config_in(tmp.path());

        let err = create(&config, "create posts table", Template::CreateTable).unwrap_err();
        assert!(format!("{err:#}").contains("--migrations-dir"));

        // The run still uses the built-in schema and nothing else.
        run(&config).unwrap();
        let tables = with_database(&config, |db| Ok(db.list_tables()?)).unwrap();
        assert!(!tables.contains(&"posts".to_string()));
        assert!(tables.contains(&"users".to_string()));
        list(&config).unwrap();
    }

    #[test]
    fn invalid_tracking_table_fails_before_touching_the_store() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = config_in(tmp.path());
        config.migrations.table = "migrations; DROP TABLE users".into();

        let err = run(&config).unwrap_err();
        assert!(format!("{err:#}").contains("invalid migrations table name"));
        let tables = with_database(&config, |db| Ok(db.list_tables()?)).unwrap();
        assert!(tables.is_empty());
    }
}
