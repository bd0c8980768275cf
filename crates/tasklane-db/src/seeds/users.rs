use rusqlite::{OptionalExtension, Transaction, params};
use tasklane_common::Result;
use tracing::{info, warn};

use super::password::{DEFAULT_ITERATIONS, hash_password};
use super::{Seeder, db_err};

const TEST_USERS: &[(&str, &str, &str)] = &[
    ("admin@test.com", "admin123", "admin"),
    ("editor@test.com", "editor123", "editor"),
    ("user@test.com", "user123", "user"),
    ("viewer@test.com", "viewer123", "viewer"),
];

/// One test account per default profile.
pub struct UsersSeeder {
    iterations: u32,
}

impl Default for UsersSeeder {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
        }
    }
}

impl UsersSeeder {
    /// Override the PBKDF2 work factor.
    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations;
        self
    }
}

impl Seeder for UsersSeeder {
    fn name(&self) -> &str {
        "users_seeder"
    }

    fn description(&self) -> &str {
        "Create default test users with profiles"
    }

    fn run(&self, tx: &Transaction<'_>) -> Result<()> {
        for &(email, password, profile) in TEST_USERS {
            let exists: Option<i64> = tx
                .query_row("SELECT id FROM users WHERE email = ?1", [email], |row| {
                    row.get(0)
                })
                .optional()
                .map_err(db_err("failed to look up user"))?;
            if exists.is_some() {
                info!("user {email} already exists, skipping");
                continue;
            }

            let profile_id: Option<i64> = tx
                .query_row("SELECT id FROM profiles WHERE name = ?1", [profile], |row| {
                    row.get(0)
                })
                .optional()
                .map_err(db_err("failed to look up profile"))?;
            let Some(profile_id) = profile_id else {
                warn!("profile {profile} not found for user {email}, skipping");
                continue;
            };

            let username = email.split('@').next().unwrap_or(email);
            let password_hash = hash_password(password, self.iterations)?;
            tx.execute(
                "INSERT INTO users (email, username, password_hash, profile_id)
                 VALUES (?1, ?2, ?3, ?4)",
                params![email, username, password_hash, profile_id],
            )
            .map_err(db_err("failed to insert user"))?;
            info!("user {email} created");
        }
        Ok(())
    }
}
