mod banner;
mod commands;
mod logging;
mod wizard;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tasklane_config::{AppConfig, ConfigLoader};
use tasklane_db::Template;

#[derive(Parser)]
#[command(name = "tasklane")]
#[command(about = "Schema migrations and seed data for the tasklane task backend")]
#[command(version)]
struct Cli {
    /// Config file (YAML or TOML). Defaults to ./tasklane.yml or the user config dir.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database file, overrides the configured path.
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Load migrations from this directory instead of the built-in schema.
    #[arg(long, global = true)]
    migrations_dir: Option<PathBuf>,

    /// error, warn, info, debug or trace.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply, inspect and roll back schema migrations
    Migrate {
        #[command(subcommand)]
        action: Option<MigrateAction>,
    },
    /// Load the default profiles, users and sample data
    Seed {
        #[command(subcommand)]
        action: Option<SeedAction>,
    },
    /// Write a config file
    Init {
        /// Where to write it. Defaults to the user config directory.
        #[arg(long)]
        path: Option<PathBuf>,
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum MigrateAction {
    /// Apply all pending migrations
    Run,
    /// Show applied and pending migrations
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Roll back the most recently applied migration
    Rollback {
        /// Skip the confirmation prompt.
        #[arg(long, short)]
        yes: bool,
    },
    /// Create a new migration file in the configured migrations directory
    Create {
        name: String,
        /// create-table, add-column, modify-column, drop-column or custom.
        #[arg(long, short, default_value_t = Template::Custom)]
        template: Template,
    },
    /// List migration files, or the built-in migrations when no directory is set
    List,
}

#[derive(Subcommand)]
enum SeedAction {
    /// Run every seeder that has not run yet
    Run,
    /// Show which seeders have run
    Status,
}

fn main() {
    // A missing .env is fine.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config =
        ConfigLoader::load(cli.config.as_deref()).context("failed to load configuration")?;
    apply_cli_overrides(&mut config, &cli);
    config.validate().context("invalid configuration")?;

    logging::init_logging(&config.log)?;

    match cli.command {
        Commands::Migrate { action } => match action.unwrap_or(MigrateAction::Run) {
            MigrateAction::Run => commands::migrate::run(&config),
            MigrateAction::Status { json } => commands::migrate::status(&config, json),
            MigrateAction::Rollback { yes } => commands::migrate::rollback(&config, yes),
            MigrateAction::Create { name, template } => {
                commands::migrate::create(&config, &name, template)
            }
            MigrateAction::List => commands::migrate::list(&config),
        },
        Commands::Seed { action } => match action.unwrap_or(SeedAction::Run) {
            SeedAction::Run => commands::seed::run(&config),
            SeedAction::Status => commands::seed::status(&config),
        },
        Commands::Init { path, force } => {
            let path = path.unwrap_or_else(ConfigLoader::default_path);
            wizard::run_init(&path, &config, force)
        }
    }
}

fn apply_cli_overrides(config: &mut AppConfig, cli: &Cli) {
    if let Some(path) = &cli.database {
        config.database.path = Some(path.clone());
    }
    if let Some(dir) = &cli.migrations_dir {
        config.migrations.directory = Some(dir.clone());
    }
    if let Some(level) = &cli.log_level {
        config.log.level = level.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn bare_migrate_means_run() {
        let cli = Cli::try_parse_from(["tasklane", "migrate"]).unwrap();
        assert!(matches!(cli.command, Commands::Migrate { action: None }));
    }

    #[test]
    fn create_parses_template_names() {
        let cli = Cli::try_parse_from([
            "tasklane",
            "migrate",
            "create",
            "add status to tasks",
            "--template",
            "add-column",
        ])
        .unwrap();
        match cli.command {
            Commands::Migrate {
                action: Some(MigrateAction::Create { name, template }),
            } => {
                assert_eq!(name, "add status to tasks");
                assert_eq!(template, Template::AddColumn);
            }
            _ => panic!("expected migrate create"),
        }

        assert!(
            Cli::try_parse_from(["tasklane", "migrate", "create", "x", "-t", "bogus"]).is_err()
        );
    }

    #[test]
    fn log_level_flag_overrides_a_bad_configured_level() {
        let cli = Cli::try_parse_from(["tasklane", "migrate", "--log-level", "info"]).unwrap();
        let mut config = AppConfig::default();
        config.log.level = "chatty".into();
        assert!(config.validate().is_err());

        apply_cli_overrides(&mut config, &cli);
        config.validate().unwrap();
    }

    #[test]
    fn global_flags_override_config() {
        let cli = Cli::try_parse_from([
            "tasklane",
            "seed",
            "status",
            "--database",
            "/tmp/t.db",
            "--migrations-dir",
            "db/migrations",
            "--log-level",
            "debug",
        ])
        .unwrap();

        let mut config = AppConfig::default();
        apply_cli_overrides(&mut config, &cli);
        assert_eq!(config.database.path, Some(PathBuf::from("/tmp/t.db")));
        assert_eq!(
            config.migrations.directory,
            Some(PathBuf::from("db/migrations"))
        );
        assert_eq!(config.log.level, "debug");
    }
}
