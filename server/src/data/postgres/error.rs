//! PostgreSQL service errors

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PostgresError {
    #[error(transparent)]
    Query(#[from] sqlx::Error),

    /// Schema could not be brought to the version this build expects
    #[error("Schema migration to v{version} ({name}) failed: {reason}")]
    Migration {
        version: i32,
        name: String,
        reason: String,
    },

    #[error("Invalid PostgreSQL URL: {0}")]
    Url(String),
}
