//! The tracking store: one row per applied migration.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};
use tasklane_common::{Error, Result};

use crate::database::{parse_datetime, table_exists};

/// Persisted fact that a migration was applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub id: String,
    pub description: String,
    pub executed_at: DateTime<Utc>,
}

/// Create the tracking table if it is absent.
pub fn ensure_table(conn: &Connection, table: &str) -> Result<()> {
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            id TEXT PRIMARY KEY,
            description TEXT NOT NULL,
            executed_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        );"
    ))
    .map_err(|e| Error::Database(format!("failed to create tracking table {table}: {e}")))
}

/// Applied migrations in application order. Empty when the table is absent.
pub fn list(conn: &Connection, table: &str) -> Result<Vec<ExecutionRecord>> {
    if !table_exists(conn, table)? {
        return Ok(Vec::new());
    }

    let mut stmt = conn
        .prepare(&format!(
            "SELECT id, description, executed_at FROM {table}
             ORDER BY executed_at ASC, rowid ASC"
        ))
        .map_err(|e| Error::Database(format!("failed to prepare query: {e}")))?;

    let rows = stmt
        .query_map([], |row| {
            Ok(ExecutionRecord {
                id: row.get(0)?,
                description: row.get(1)?,
                executed_at: parse_datetime(row.get::<_, String>(2)?),
            })
        })
        .map_err(|e| Error::Database(format!("failed to query applied migrations: {e}")))?;

    let mut records = Vec::new();
    for row in rows {
        records.push(
            row.map_err(|e| Error::Database(format!("failed to read migration row: {e}")))?,
        );
    }
    Ok(records)
}

pub fn insert(conn: &Connection, table: &str, id: &str, description: &str) -> Result<()> {
    conn.execute(
        &format!("INSERT INTO {table} (id, description) VALUES (?1, ?2)"),
        params![id, description],
    )
    .map_err(|e| Error::Database(format!("failed to record migration: {e}")))?;
    Ok(())
}

pub fn delete(conn: &Connection, table: &str, id: &str) -> Result<()> {
    let removed = conn
        .execute(&format!("DELETE FROM {table} WHERE id = ?1"), params![id])
        .map_err(|e| Error::Database(format!("failed to remove migration record: {e}")))?;
    if removed == 0 {
        return Err(Error::NotFound(format!("no execution record for {id}")));
    }
    Ok(())
}
