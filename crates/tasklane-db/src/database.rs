use std::path::Path;
use std::sync::{LazyLock, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use regex::Regex;
use rusqlite::{Connection, ToSql, Transaction, params};
use tasklane_common::{Error, Result};
use tracing::{debug, info};

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier regex"));

/// Handle to the backing SQLite store.
///
/// Created once at process start and shared as `Arc<Database>` with the
/// migration engine and seed runner. Every unit of work locks the connection
/// for its own duration only.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(db_path: &Path) -> Result<Self> {
        Self::open_with_timeout(db_path, DEFAULT_BUSY_TIMEOUT)
    }

    pub fn open_with_timeout(db_path: &Path, busy_timeout: Duration) -> Result<Self> {
        info!("opening database at {}", db_path.display());
        let conn = Connection::open(db_path).map_err(|e| {
            Error::Connection(format!(
                "failed to open database {}: {e}",
                db_path.display()
            ))
        })?;
        Self::from_connection(conn, busy_timeout)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Connection(format!("failed to open in-memory database: {e}")))?;
        Self::from_connection(conn, DEFAULT_BUSY_TIMEOUT)
    }

    fn from_connection(conn: Connection, busy_timeout: Duration) -> Result<Self> {
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| Error::Connection(format!("failed to set pragmas: {e}")))?;
        conn.busy_timeout(busy_timeout)
            .map_err(|e| Error::Connection(format!("failed to set busy timeout: {e}")))?;

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.ping()?;
        Ok(db)
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Database("database lock poisoned".into()))
    }

    /// Round-trip a trivial query to prove the store is reachable.
    pub fn ping(&self) -> Result<()> {
        let conn = self.connection()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map_err(|e| Error::Connection(format!("database did not answer: {e}")))?;
        Ok(())
    }

    /// Execute one parameterized statement, returning the affected row count.
    pub fn execute(&self, sql: &str, params: &[&dyn ToSql]) -> Result<usize> {
        let conn = self.connection()?;
        conn.execute(sql, params)
            .map_err(|e| Error::Database(format!("statement failed: {e}")))
    }

    /// Run read-only work against the locked connection.
    pub fn with_connection<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.connection()?;
        f(&conn)
    }

    /// Run `f` inside a transaction. Commits on `Ok`, rolls back on `Err`.
    ///
    /// The error returned by `f` is passed through untouched so callers can
    /// attach their own context.
    pub fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T>,
    {
        let mut conn = self.connection()?;
        let tx = conn
            .transaction()
            .map_err(|e| Error::Database(format!("failed to begin transaction: {e}")))?;

        match f(&tx) {
            Ok(value) => {
                tx.commit()
                    .map_err(|e| Error::Database(format!("failed to commit transaction: {e}")))?;
                Ok(value)
            }
            Err(err) => {
                if let Err(e) = tx.rollback() {
                    debug!("rollback after failure also failed: {e}");
                }
                Err(err)
            }
        }
    }

    /// User tables currently present, sorted by name.
    pub fn list_tables(&self) -> Result<Vec<String>> {
        let conn = self.connection()?;
        list_tables(&conn)
    }

    pub fn table_exists(&self, name: &str) -> Result<bool> {
        let conn = self.connection()?;
        table_exists(&conn, name)
    }

    /// Close the underlying connection, surfacing any error SQLite reports.
    pub fn close(self) -> Result<()> {
        let conn = self
            .conn
            .into_inner()
            .map_err(|_| Error::Database("database lock poisoned".into()))?;
        conn.close()
            .map_err(|(_, e)| Error::Database(format!("failed to close database: {e}")))?;
        info!("database connection closed");
        Ok(())
    }
}

/// Reject anything but a plain SQL identifier. Table names checked here are
/// interpolated into statements.
pub fn validate_identifier(name: &str) -> Result<()> {
    if IDENTIFIER.is_match(name) {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "'{name}' is not a plain SQL identifier"
        )))
    }
}

pub(crate) fn list_tables(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare(
            "SELECT name FROM sqlite_master
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
             ORDER BY name",
        )
        .map_err(|e| Error::Database(format!("failed to prepare query: {e}")))?;

    let rows = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(|e| Error::Database(format!("failed to list tables: {e}")))?;

    let mut tables = Vec::new();
    for row in rows {
        tables.push(row.map_err(|e| Error::Database(format!("failed to read table row: {e}")))?);
    }
    Ok(tables)
}

pub(crate) fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    conn.query_row(
        "SELECT count(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = ?1",
        params![name],
        |row| row.get(0),
    )
    .map_err(|e| Error::Database(format!("failed to check table {name}: {e}")))
}

pub(crate) fn parse_datetime(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| {
            // SQLite datetime('now') produces "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S")
                .map(|naive| naive.and_utc())
                .unwrap_or_else(|_| Utc::now())
        })
}
