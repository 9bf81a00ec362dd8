//! SQLite service errors

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SqliteError {
    #[error(transparent)]
    Query(#[from] sqlx::Error),

    /// Schema could not be brought to the version this build expects
    #[error("Schema migration to v{version} ({name}) failed: {reason}")]
    Migration {
        version: i32,
        name: String,
        reason: String,
    },

    #[error("Cannot create database directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
}
