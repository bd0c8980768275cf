use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use tasklane_common::{Error, Result};
use tracing::info;

use super::source::MIGRATION_EXTENSION;

static NON_SLUG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("slug regex"));

/// Starting point for a generated migration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Template {
    CreateTable,
    AddColumn,
    ModifyColumn,
    DropColumn,
    #[default]
    Custom,
}

impl Template {
    pub const ALL: [Template; 5] = [
        Template::CreateTable,
        Template::AddColumn,
        Template::ModifyColumn,
        Template::DropColumn,
        Template::Custom,
    ];

    fn body(self, table: &str) -> String {
        let quoted = quote_identifier(table);
        let index = quote_identifier(&format!("idx_{table}_created_at"));
        let rebuilt = quote_identifier(&format!("{table}_new"));
        match self {
            Template::CreateTable => format!(
                "-- up
CREATE TABLE {quoted} (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX {index} ON {quoted} (created_at);

-- down
DROP INDEX IF EXISTS {index};
DROP TABLE IF EXISTS {quoted};
"
            ),
            Template::AddColumn => format!(
                "-- up
-- ALTER TABLE {quoted} ADD COLUMN new_column TEXT;

-- down
-- ALTER TABLE {quoted} DROP COLUMN new_column;
"
            ),
            Template::ModifyColumn => format!(
                "-- up
-- SQLite cannot alter a column in place: rebuild the table.
-- CREATE TABLE {rebuilt} (...);
-- INSERT INTO {rebuilt} SELECT ... FROM {quoted};
-- DROP TABLE {quoted};
-- ALTER TABLE {rebuilt} RENAME TO {quoted};

-- down
-- Rebuild {quoted} with the previous column definition.
"
            ),
            Template::DropColumn => format!(
                "-- up
-- ALTER TABLE {quoted} DROP COLUMN old_column;

-- down
-- ALTER TABLE {quoted} ADD COLUMN old_column TEXT;
"
            ),
            Template::Custom => "-- up
-- Write the forward change here.

-- down
-- Write the statements that undo it here.
"
            .to_string(),
        }
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Template::CreateTable => "create-table",
            Template::AddColumn => "add-column",
            Template::ModifyColumn => "modify-column",
            Template::DropColumn => "drop-column",
            Template::Custom => "custom",
        })
    }
}

impl FromStr for Template {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "create-table" | "create" => Ok(Template::CreateTable),
            "add-column" | "add" => Ok(Template::AddColumn),
            "modify-column" | "modify" => Ok(Template::ModifyColumn),
            "drop-column" | "drop" => Ok(Template::DropColumn),
            "custom" => Ok(Template::Custom),
            other => Err(Error::InvalidInput(format!(
                "unknown template '{other}', expected one of: create-table, add-column, modify-column, drop-column, custom"
            ))),
        }
    }
}

/// Scaffolds new migration files into a directory.
pub struct MigrationGenerator {
    dir: PathBuf,
}

impl MigrationGenerator {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `{timestamp}_{slug}.sql` and return its path.
    pub fn generate(&self, name: &str, template: Template) -> Result<PathBuf> {
        self.generate_at(name, template, Utc::now())
    }

    fn generate_at(&self, name: &str, template: Template, now: DateTime<Utc>) -> Result<PathBuf> {
        let slug = slugify(name);
        if slug.is_empty() {
            return Err(Error::InvalidInput(format!(
                "migration name '{name}' has no usable characters"
            )));
        }

        fs::create_dir_all(&self.dir).map_err(|e| {
            Error::MigrationSource(format!(
                "failed to create migrations directory {}: {e}",
                self.dir.display()
            ))
        })?;

        let id = format!("{}_{slug}", now.format("%Y%m%d%H%M%S"));
        let path = self.dir.join(format!("{id}.{MIGRATION_EXTENSION}"));
        if path.exists() {
            return Err(Error::InvalidInput(format!(
                "migration file {} already exists",
                path.display()
            )));
        }

        let contents = format!(
            "-- description: {}\n-- created: {}\n-- template: {template}\n\n{}",
            slug.replace('_', " "),
            now.format("%Y-%m-%d %H:%M:%S UTC"),
            template.body(&table_name(&slug)),
        );
        fs::write(&path, contents)?;

        info!("created migration {}", path.display());
        Ok(path)
    }

    /// Sorted migration file names. Empty when the directory is absent.
    pub fn list(&self) -> Result<Vec<String>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|x| x == MIGRATION_EXTENSION) {
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

/// Lowercase, runs of anything non-alphanumeric become one `_`.
pub fn slugify(name: &str) -> String {
    NON_SLUG
        .replace_all(&name.trim().to_lowercase(), "_")
        .trim_matches('_')
        .to_string()
}

/// Double-quote a table name so keywords and leading digits stay valid SQL.
fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Best guess at the table a slug is about: `create_posts_table` and
/// `add_status_to_posts` both give `posts`.
fn table_name(slug: &str) -> String {
    if let Some((_, table)) = slug.rsplit_once("_to_").or_else(|| slug.rsplit_once("_from_")) {
        return table.trim_end_matches("_table").to_string();
    }
    let table = slug
        .strip_prefix("create_")
        .unwrap_or(slug)
        .trim_end_matches("_table");
    if table.is_empty() {
        "table_name".to_string()
    } else {
        table.to_string()
    }
}
