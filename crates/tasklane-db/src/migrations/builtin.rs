//! The task backend schema: profiles, seeders, users, lists, tasks, subtasks.

use std::sync::Arc;

use tracing::warn;

use super::unit::{Migration, SqlMigration};

const BUILTIN: &[(&str, &str)] = &[
    (
        "20250827171210_create_profiles_table",
        include_str!("../../migrations/20250827171210_create_profiles_table.sql"),
    ),
    (
        "20250827171210_create_seeders_table",
        include_str!("../../migrations/20250827171210_create_seeders_table.sql"),
    ),
    (
        "20250827171210_create_users_table",
        include_str!("../../migrations/20250827171210_create_users_table.sql"),
    ),
    (
        "20250827201144_create_lists_table",
        include_str!("../../migrations/20250827201144_create_lists_table.sql"),
    ),
    (
        "20250827201325_create_tasks_table",
        include_str!("../../migrations/20250827201325_create_tasks_table.sql"),
    ),
    (
        "20250827201516_create_subtasks_table",
        include_str!("../../migrations/20250827201516_create_subtasks_table.sql"),
    ),
];

/// Parse the compiled-in SQL files into migration units.
pub fn migrations() -> Vec<Arc<dyn Migration>> {
    let mut units: Vec<Arc<dyn Migration>> = Vec::with_capacity(BUILTIN.len());
    for (id, source) in BUILTIN {
        match SqlMigration::parse(id, source) {
            Ok(migration) => units.push(Arc::new(migration)),
            Err(e) => warn!("skipping built-in migration {id}: {e}"),
        }
    }
    units
}
