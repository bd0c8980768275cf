use rusqlite::{Transaction, params};
use serde_json::json;
use tasklane_common::Result;
use tracing::info;

use super::{Seeder, db_err};

/// The four default access profiles.
pub struct ProfilesSeeder;

impl Seeder for ProfilesSeeder {
    fn name(&self) -> &str {
        "profiles_seeder"
    }

    fn description(&self) -> &str {
        "Create default user profiles"
    }

    fn run(&self, tx: &Transaction<'_>) -> Result<()> {
        let profiles = [
            (
                "admin",
                "Administrator with full system access",
                json!({
                    "users": ["create", "read", "update", "delete"],
                    "profiles": ["create", "read", "update", "delete"],
                    "system": ["manage"]
                }),
            ),
            (
                "editor",
                "Editor with content management permissions",
                json!({
                    "users": ["read", "update"],
                    "content": ["create", "read", "update", "delete"]
                }),
            ),
            (
                "user",
                "Standard user with basic permissions",
                json!({
                    "users": ["read"],
                    "content": ["read"]
                }),
            ),
            (
                "viewer",
                "Read-only access to system",
                json!({ "content": ["read"] }),
            ),
        ];

        for (name, description, permissions) in profiles {
            let inserted = tx
                .execute(
                    "INSERT OR IGNORE INTO profiles (name, description, permissions)
                     VALUES (?1, ?2, ?3)",
                    params![name, description, serde_json::to_string(&permissions)?],
                )
                .map_err(db_err("failed to insert profile"))?;
            if inserted == 0 {
                info!("profile {name} already exists, skipping");
            } else {
                info!("profile {name} created");
            }
        }
        Ok(())
    }
}
