use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use dialoguer::{Input, Select};
use tasklane_config::{AppConfig, Environment};
use tracing::info;

const LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

/// Write a config file to `path`, asking for the main settings when run
/// from a terminal. Non-interactive runs write `base` as-is.
pub fn run_init(path: &Path, base: &AppConfig, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }

    let config = if std::io::stdin().is_terminal() {
        prompt(base)?
    } else {
        println!("Non-interactive environment detected, writing defaults.");
        base.clone()
    };

    write_config(path, &config)?;

    println!();
    println!("  Config written to {}", path.display());
    println!("  Run `tasklane migrate` to create the schema.");
    println!();
    Ok(())
}

fn prompt(base: &AppConfig) -> Result<AppConfig> {
    println!();
    println!("  tasklane setup");
    println!("  --------------");
    println!();

    let environments = [
        Environment::Development,
        Environment::Production,
        Environment::Test,
    ];
    let current = environments
        .iter()
        .position(|e| *e == base.environment)
        .unwrap_or(0);
    let selection = Select::new()
        .with_prompt("Environment")
        .items(&environments)
        .default(current)
        .interact()
        .context("environment selection cancelled")?;

    let database: String = Input::new()
        .with_prompt("Database file")
        .default(base.database_path().display().to_string())
        .interact_text()
        .context("database path input cancelled")?;

    let migrations: String = Input::new()
        .with_prompt("Migrations directory (empty for the built-in schema)")
        .default(
            base.migrations
                .directory
                .as_ref()
                .map(|d| d.display().to_string())
                .unwrap_or_default(),
        )
        .allow_empty(true)
        .interact_text()
        .context("migrations directory input cancelled")?;

    let level = LOG_LEVELS
        .iter()
        .position(|l| l.eq_ignore_ascii_case(&base.log.level))
        .unwrap_or(2);
    let level = Select::new()
        .with_prompt("Log level")
        .items(LOG_LEVELS)
        .default(level)
        .interact()
        .context("log level selection cancelled")?;

    let mut config = base.clone();
    config.environment = environments[selection];
    config.database.path = Some(PathBuf::from(database.trim()));
    config.migrations.directory = Some(migrations.trim())
        .filter(|d| !d.is_empty())
        .map(PathBuf::from);
    config.log.level = LOG_LEVELS[level].to_string();
    Ok(config)
}

fn write_config(path: &Path, config: &AppConfig) -> Result<()> {
    config.validate().context("refusing to write an invalid config")?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let yaml = serde_yaml::to_string(config).context("failed to serialize config")?;
    std::fs::write(path, &yaml).with_context(|| format!("failed to write {}", path.display()))?;

    info!("config written to {}", path.display());
    Ok(())
}
