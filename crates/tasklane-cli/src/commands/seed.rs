use std::sync::Arc;

use anyhow::{Context, Result};
use tasklane_config::AppConfig;
use tasklane_db::{Database, SeedRunner, seeds};

use super::with_database;
use crate::banner;

fn runner(config: &AppConfig, db: &Arc<Database>) -> Result<SeedRunner> {
    SeedRunner::new(Arc::clone(db), seeds::builtin())
        .with_table(config.seeds.table.clone())
        .context("invalid seeders table name")
}

pub fn run(config: &AppConfig) -> Result<()> {
    with_database(config, |db| {
        banner::print_banner("seed", config, "built-in seeders");

        let result = runner(config, db)?.run_all().context("seeding failed")?;
        for name in &result.skipped {
            println!("  - {name} (already executed)");
        }
        for name in &result.executed {
            println!("  ✓ {name}");
        }
        println!(
            "Seeding finished: {} executed, {} skipped.",
            result.executed.len(),
            result.skipped.len()
        );
        Ok(())
    })
}

pub fn status(config: &AppConfig) -> Result<()> {
    with_database(config, |db| {
        let status = runner(config, db)?
            .status()
            .context("failed to read seeder status")?;

        println!("Seeders:");
        for seeder in status {
            match seeder.executed_at {
                Some(at) => println!(
                    "  [executed] {}  {}  ({})",
                    seeder.name,
                    seeder.description,
                    at.format("%Y-%m-%d %H:%M:%S")
                ),
                None => println!("  [pending]  {}  {}", seeder.name, seeder.description),
            }
        }
        Ok(())
    })
}
