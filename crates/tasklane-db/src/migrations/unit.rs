use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use rusqlite::Transaction;
use tasklane_common::{Error, Result};

static MIGRATION_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+_[A-Za-z0-9_\-]+$").expect("migration id regex"));

/// One forward/backward schema change with a stable identity.
///
/// `id` is the sole ordering key: units are applied in ascending
/// lexicographic id order, so ids carry a sortable prefix
/// (`20250827171210_create_users_table`, `0001_create_users`).
pub trait Migration: Send + Sync {
    fn id(&self) -> &str;

    fn description(&self) -> &str;

    /// Apply the change. Runs inside the transaction that also records it.
    fn up(&self, tx: &Transaction<'_>) -> Result<()>;

    /// Undo the change. Runs inside the transaction that also forgets it.
    fn down(&self, tx: &Transaction<'_>) -> Result<()>;
}

impl fmt::Debug for dyn Migration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Migration")
            .field("id", &self.id())
            .field("description", &self.description())
            .finish()
    }
}

/// Check that `id` looks like `{sortable prefix}_{slug}`.
pub fn validate_migration_id(id: &str) -> Result<()> {
    if MIGRATION_ID.is_match(id) {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "migration id '{id}' must look like <digits>_<slug>"
        )))
    }
}

/// Human-readable description derived from an id: drops the numeric prefix
/// and turns underscores into spaces.
pub fn description_from_id(id: &str) -> String {
    let slug = id.split_once('_').map(|(_, rest)| rest).unwrap_or(id);
    slug.replace('_', " ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Preamble,
    Up,
    Down,
}

/// A migration written as plain SQL with `-- up` and `-- down` sections.
///
/// ```sql
/// -- description: create users table
/// -- up
/// CREATE TABLE users (id INTEGER PRIMARY KEY);
/// -- down
/// DROP TABLE users;
/// ```
///
/// `-- migrate:up` / `-- migrate:down` are accepted as marker names too.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlMigration {
    pub id: String,
    pub description: String,
    pub up_sql: String,
    pub down_sql: String,
}

impl SqlMigration {
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        up_sql: impl Into<String>,
        down_sql: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            up_sql: up_sql.into(),
            down_sql: down_sql.into(),
        }
    }

    /// Parse SQL source text for the unit named `id`.
    ///
    /// Fails when the id is malformed or either section marker is missing.
    pub fn parse(id: &str, source: &str) -> Result<Self> {
        validate_migration_id(id)?;

        let mut section = Section::Preamble;
        let mut seen_up = false;
        let mut seen_down = false;
        let mut description = None;
        let mut up = Vec::new();
        let mut down = Vec::new();

        for line in source.lines() {
            let trimmed = line.trim();
            if let Some(marker) = section_marker(trimmed) {
                match marker {
                    Section::Up if seen_up => {
                        return Err(Error::InvalidInput(format!(
                            "{id}: duplicate up section"
                        )));
                    }
                    Section::Down if seen_down => {
                        return Err(Error::InvalidInput(format!(
                            "{id}: duplicate down section"
                        )));
                    }
                    Section::Up => seen_up = true,
                    Section::Down => seen_down = true,
                    Section::Preamble => {}
                }
                section = marker;
                continue;
            }

            match section {
                Section::Preamble => {
                    if let Some(text) = header_value(trimmed, "description") {
                        description = Some(text.to_string());
                    }
                }
                Section::Up => up.push(line),
                Section::Down => down.push(line),
            }
        }

        if !seen_up {
            return Err(Error::InvalidInput(format!("{id}: missing '-- up' section")));
        }
        if !seen_down {
            return Err(Error::InvalidInput(format!(
                "{id}: missing '-- down' section"
            )));
        }

        Ok(Self {
            id: id.to_string(),
            description: description.unwrap_or_else(|| description_from_id(id)),
            up_sql: up.join("\n").trim().to_string(),
            down_sql: down.join("\n").trim().to_string(),
        })
    }
}

impl Migration for SqlMigration {
    fn id(&self) -> &str {
        &self.id
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn up(&self, tx: &Transaction<'_>) -> Result<()> {
        run_batch(tx, &self.up_sql)
    }

    fn down(&self, tx: &Transaction<'_>) -> Result<()> {
        run_batch(tx, &self.down_sql)
    }
}

fn section_marker(line: &str) -> Option<Section> {
    let lower = line.to_ascii_lowercase();
    match lower.as_str() {
        "-- up" | "-- migrate:up" => Some(Section::Up),
        "-- down" | "-- migrate:down" => Some(Section::Down),
        _ => None,
    }
}

fn header_value<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let rest = line.strip_prefix("--")?.trim_start();
    let (name, value) = rest.split_once(':')?;
    if name.trim().eq_ignore_ascii_case(key) {
        Some(value.trim()).filter(|v| !v.is_empty())
    } else {
        None
    }
}

/// True when `sql` holds anything besides blank lines and `--` comments.
fn has_statements(sql: &str) -> bool {
    sql.lines().any(|line| {
        let line = line.trim();
        !line.is_empty() && !line.starts_with("--")
    })
}

fn run_batch(tx: &Transaction<'_>, sql: &str) -> Result<()> {
    if !has_statements(sql) {
        return Ok(());
    }
    tx.execute_batch(sql)
        .map_err(|e| Error::Database(e.to_string()))
}
