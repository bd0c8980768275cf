//! Run-once data loaders, tracked by name in the `seeders` table.

mod lists;
pub mod password;
mod profiles;
mod users;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, Transaction, params};
use serde::Serialize;
use tasklane_common::{Error, Result};
use tracing::info;

use crate::database::{Database, parse_datetime, table_exists, validate_identifier};

pub use lists::ListsTasksSubtasksSeeder;
pub use profiles::ProfilesSeeder;
pub use users::UsersSeeder;

pub const DEFAULT_TABLE: &str = "seeders";

pub trait Seeder: Send + Sync {
    /// Unique name recorded once the seeder has run.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Load the data. Runs in the same transaction that records the seeder.
    fn run(&self, tx: &Transaction<'_>) -> Result<()>;
}

/// Built-in seeders in the order they must run.
pub fn builtin() -> Vec<Box<dyn Seeder>> {
    vec![
        Box::new(ProfilesSeeder),
        Box::new(UsersSeeder::default()),
        Box::new(ListsTasksSubtasksSeeder),
    ]
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeedRecord {
    pub name: String,
    pub description: Option<String>,
    pub executed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SeedStatus {
    pub name: String,
    pub description: String,
    pub executed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct SeedRunResult {
    pub executed: Vec<String>,
    pub skipped: Vec<String>,
}

pub struct SeedRunner {
    db: Arc<Database>,
    seeders: Vec<Box<dyn Seeder>>,
    table: String,
}

impl SeedRunner {
    pub fn new(db: Arc<Database>, seeders: Vec<Box<dyn Seeder>>) -> Self {
        Self {
            db,
            seeders,
            table: DEFAULT_TABLE.to_string(),
        }
    }

    /// Record executions in `table` instead of `seeders`.
    pub fn with_table(mut self, table: impl Into<String>) -> Result<Self> {
        let table = table.into();
        validate_identifier(&table)?;
        self.table = table;
        Ok(self)
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn ensure_table(&self) -> Result<()> {
        self.db.with_connection(|conn| ensure_table(conn, &self.table))
    }

    /// Recorded seeders ordered by execution time.
    pub fn executed(&self) -> Result<Vec<SeedRecord>> {
        self.db.with_connection(|conn| executed(conn, &self.table))
    }

    /// Run every seeder not yet recorded, in registration order.
    pub fn run_all(&self) -> Result<SeedRunResult> {
        self.ensure_table()?;
        let done: Vec<String> = self.executed()?.into_iter().map(|r| r.name).collect();

        let mut result = SeedRunResult::default();
        for seeder in &self.seeders {
            let name = seeder.name();
            if done.iter().any(|n| n == name) {
                info!("seeder {name} has already been executed, skipping");
                result.skipped.push(name.to_string());
                continue;
            }

            info!("running seeder {name} - {}", seeder.description());
            self.db
                .transaction(|tx| {
                    seeder.run(tx)?;
                    tx.execute(
                        &format!(
                            "INSERT INTO {} (name, description) VALUES (?1, ?2)",
                            self.table
                        ),
                        params![name, seeder.description()],
                    )
                    .map_err(|e| Error::Database(format!("failed to record seeder: {e}")))?;
                    Ok(())
                })
                .map_err(|e| Error::Seed {
                    name: name.to_string(),
                    reason: e.to_string(),
                })?;

            info!("seeder {name} completed");
            result.executed.push(name.to_string());
        }
        Ok(result)
    }

    pub fn status(&self) -> Result<Vec<SeedStatus>> {
        let records = self.executed()?;
        Ok(self
            .seeders
            .iter()
            .map(|seeder| SeedStatus {
                name: seeder.name().to_string(),
                description: seeder.description().to_string(),
                executed_at: records
                    .iter()
                    .find(|r| r.name == seeder.name())
                    .map(|r| r.executed_at),
            })
            .collect())
    }
}

fn ensure_table(conn: &Connection, table: &str) -> Result<()> {
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            description TEXT,
            executed_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        );"
    ))
    .map_err(|e| Error::Database(format!("failed to create seeders table {table}: {e}")))
}

fn executed(conn: &Connection, table: &str) -> Result<Vec<SeedRecord>> {
    if !table_exists(conn, table)? {
        return Ok(Vec::new());
    }

    let mut stmt = conn
        .prepare(&format!(
            "SELECT name, description, executed_at FROM {table}
             ORDER BY executed_at ASC, id ASC"
        ))
        .map_err(|e| Error::Database(format!("failed to prepare query: {e}")))?;

    let rows = stmt
        .query_map([], |row| {
            Ok(SeedRecord {
                name: row.get(0)?,
                description: row.get(1)?,
                executed_at: parse_datetime(row.get::<_, String>(2)?),
            })
        })
        .map_err(|e| Error::Database(format!("failed to query seeders: {e}")))?;

    let mut records = Vec::new();
    for row in rows {
        records.push(row.map_err(|e| Error::Database(format!("failed to read seeder row: {e}")))?);
    }
    Ok(records)
}

/// Map a rusqlite failure inside a seeder.
pub(crate) fn db_err(context: &str) -> impl Fn(rusqlite::Error) -> Error + '_ {
    move |e| Error::Database(format!("{context}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::{EmbeddedSource, Migrator};

    struct Notes {
        fail: bool,
    }

    impl Seeder for Notes {
        fn name(&self) -> &str {
            "notes_seeder"
        }

        fn description(&self) -> &str {
            "Insert a note"
        }

        fn run(&self, tx: &Transaction<'_>) -> Result<()> {
            tx.execute_batch("CREATE TABLE IF NOT EXISTS notes (body TEXT)")
                .map_err(db_err("create notes"))?;
            tx.execute("INSERT INTO notes (body) VALUES ('hi')", [])
                .map_err(db_err("insert note"))?;
            if self.fail {
                return Err(Error::Other("out of ink".into()));
            }
            Ok(())
        }
    }

    fn note_count(db: &Database) -> i64 {
        db.with_connection(|conn| {
            conn.query_row("SELECT COUNT(*) FROM notes", [], |row| row.get(0))
                .map_err(db_err("count notes"))
        })
        .unwrap_or(0)
    }

    #[test]
    fn seeders_run_once() {
        let db = Arc::new(Database::in_memory().unwrap());
        let runner = SeedRunner::new(Arc::clone(&db), vec![Box::new(Notes { fail: false })]);

        let first = runner.run_all().unwrap();
        assert_eq!(first.executed, vec!["notes_seeder"]);
        let second = runner.run_all().unwrap();
        assert!(second.executed.is_empty());
        assert_eq!(second.skipped, vec!["notes_seeder"]);

        assert_eq!(note_count(&db), 1);
        assert_eq!(runner.executed().unwrap().len(), 1);
    }

    #[test]
    fn failed_seeder_leaves_no_data_and_no_record() {
        let db = Arc::new(Database::in_memory().unwrap());
        let runner = SeedRunner::new(Arc::clone(&db), vec![Box::new(Notes { fail: true })]);

        let err = runner.run_all().unwrap_err();
        assert!(matches!(err, Error::Seed { ref name, .. } if name == "notes_seeder"));
        assert!(!db.table_exists("notes").unwrap());
        assert!(runner.executed().unwrap().is_empty());
    }

    #[test]
    fn status_without_table_reports_nothing_executed() {
        let db = Arc::new(Database::in_memory().unwrap());
        let runner = SeedRunner::new(Arc::clone(&db), builtin());
        let status = runner.status().unwrap();
        assert_eq!(status.len(), 3);
        assert!(status.iter().all(|s| s.executed_at.is_none()));
        assert!(!db.table_exists(DEFAULT_TABLE).unwrap());
    }

    #[test]
    fn custom_table_is_validated_and_used() {
        let db = Arc::new(Database::in_memory().unwrap());
        assert!(
            SeedRunner::new(Arc::clone(&db), Vec::new())
                .with_table("seeds; DROP TABLE notes")
                .is_err()
        );

        let runner = SeedRunner::new(Arc::clone(&db), vec![Box::new(Notes { fail: false })])
            .with_table("seed_history")
            .unwrap();
        runner.run_all().unwrap();
        assert!(db.table_exists("seed_history").unwrap());
        assert!(!db.table_exists(DEFAULT_TABLE).unwrap());
    }

    #[test]
    fn builtin_seeders_fill_the_task_schema() {
        let db = Arc::new(Database::in_memory().unwrap());
        Migrator::new(Arc::clone(&db), Box::new(EmbeddedSource::builtin()))
            .apply_pending()
            .unwrap();

        let seeders: Vec<Box<dyn Seeder>> = vec![
            Box::new(ProfilesSeeder),
            Box::new(UsersSeeder::default().with_iterations(1)),
            Box::new(ListsTasksSubtasksSeeder),
        ];
        let runner = SeedRunner::new(Arc::clone(&db), seeders);
        let result = runner.run_all().unwrap();
        assert_eq!(
            result.executed,
            vec!["profiles_seeder", "users_seeder", "lists_tasks_subtasks"]
        );

        let count = |table: &str| -> i64 {
            db.with_connection(|conn| {
                conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                    row.get(0)
                })
                .map_err(db_err("count"))
            })
            .unwrap()
        };
        assert_eq!(count("profiles"), 4);
        assert_eq!(count("users"), 4);
        assert_eq!(count("lists"), 4);
        assert_eq!(count("tasks"), 9);
        assert_eq!(count("subtasks"), 34);

        let status = runner.status().unwrap();
        assert!(status.iter().all(|s| s.executed_at.is_some()));
    }
}
