use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(String),

    /// The backing store could not be reached or opened.
    #[error("connection error: {0}")]
    Connection(String),

    #[error("migration source error: {0}")]
    MigrationSource(String),

    /// A single unit failed to apply or revert. Its transaction was rolled back.
    #[error("migration {id} failed: {reason}")]
    Migration { id: String, reason: String },

    /// The tracking store references a unit that no longer exists in source.
    #[error("migration drift: {0}")]
    Drift(String),

    #[error("seeder {name} failed: {reason}")]
    Seed { name: String, reason: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Wrap an arbitrary failure as a unit-scoped migration error.
    pub fn migration(id: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Error::Migration {
            id: id.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether this error means tracking state and source disagree.
    pub fn is_drift(&self) -> bool {
        matches!(self, Error::Drift(_))
    }
}

#[cfg(test)]
mod tests {
    use super::Error;

    #[test]
    fn error_display_includes_context() {
        let e = Error::Config("bad yaml".into());
        assert_eq!(e.to_string(), "configuration error: bad yaml");

        let e = Error::Connection("unable to open database file".into());
        assert_eq!(e.to_string(), "connection error: unable to open database file");

        let e = Error::Drift("0001_create_users".into());
        assert_eq!(e.to_string(), "migration drift: 0001_create_users");

        let e = Error::Other("misc".into());
        assert_eq!(e.to_string(), "misc");
    }

    #[test]
    fn migration_error_names_the_unit() {
        let e = Error::migration("0002_add_lists", "near \"CREAT\": syntax error");
        assert_eq!(
            e.to_string(),
            "migration 0002_add_lists failed: near \"CREAT\": syntax error"
        );
        assert!(!e.is_drift());
        assert!(Error::Drift("x".into()).is_drift());
    }
}
