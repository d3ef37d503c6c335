//! Error types for data migrations
//!
//! Naming and version errors are raised by this crate; database and
//! filesystem failures from the collaborators pass through as their own
//! variants so callers can tell them apart.

use std::path::PathBuf;
use thiserror::Error;

use crate::migrations::definitions::MigrationVersion;

/// SQLSTATE reported by Postgres when the target database does not exist
const INVALID_CATALOG_NAME: &str = "3D000";

/// Data migration errors
#[derive(Error, Debug)]
pub enum DataMigrateError {
    #[error("Illegal name for migration file: {}\n\t(only lower case letters, numbers, and '_' allowed)", .path.display())]
    IllegalMigrationName { path: PathBuf },

    #[error("No migration with version number {0}")]
    UnknownMigrationVersion(MigrationVersion),

    #[error("Multiple migrations have the version number {0}")]
    DuplicateMigrationVersion(MigrationVersion),

    #[error("Multiple migrations have the name {0}")]
    DuplicateMigrationName(String),

    #[error("Invalid migration version: {0}")]
    InvalidVersion(String),

    #[error("Database does not exist: {0}")]
    NoDatabase(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Migration error: {0}")]
    Migration(String),
}

/// Result type for data migration operations
pub type DataMigrateResult<T> = Result<T, DataMigrateError>;

impl DataMigrateError {
    /// Whether this error means the database itself is missing
    pub fn is_no_database(&self) -> bool {
        matches!(self, DataMigrateError::NoDatabase(_))
    }
}

// A missing database is surfaced separately so `current_version` can absorb it
impl From<sqlx::Error> for DataMigrateError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.code().as_deref() == Some(INVALID_CATALOG_NAME) {
                return DataMigrateError::NoDatabase(db_err.message().to_string());
            }
        }
        DataMigrateError::Database(err.to_string())
    }
}
