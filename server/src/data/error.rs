//! Unified error type for data layer
//!
//! This module provides a unified error type that can represent errors from
//! both transactional backends (SQLite, PostgreSQL).

use thiserror::Error;

use crate::data::postgres::PostgresError;
use crate::data::sqlite::SqliteError;

/// Unified error type for data layer operations
///
/// This error type wraps backend-specific errors while preserving context
/// about which backend generated the error.
#[derive(Error, Debug)]
pub enum DataError {
    /// SQLite database error
    #[error("SQLite error: {0}")]
    Sqlite(sqlx::Error),

    /// PostgreSQL database error
    #[error("PostgreSQL error: {0}")]
    Postgres(sqlx::Error),

    /// Schema migration failed
    #[error("Schema migration to v{version} ({name}) failed on {backend}: {reason}")]
    Migration {
        backend: &'static str,
        version: i32,
        name: String,
        reason: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Local filesystem error
    #[error("IO error: {0}")]
    Io(String),
}

impl DataError {
    /// Check if this is a connection-related error that might be transient
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Sqlite(e) | Self::Postgres(e) => {
                matches!(
                    e,
                    sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)
                )
            }
            _ => false,
        }
    }

    /// Get the backend name that generated this error
    pub fn backend(&self) -> &'static str {
        match self {
            Self::Sqlite(_) => "sqlite",
            Self::Postgres(_) => "postgres",
            Self::Migration { backend, .. } => backend,
            Self::Config(_) | Self::Io(_) => "unknown",
        }
    }
}

impl From<SqliteError> for DataError {
    fn from(e: SqliteError) -> Self {
        match e {
            SqliteError::Query(e) => Self::Sqlite(e),
            SqliteError::Migration {
                version,
                name,
                reason,
            } => Self::Migration {
                backend: "sqlite",
                version,
                name,
                reason,
            },
            e @ SqliteError::CreateDir { .. } => Self::Io(e.to_string()),
        }
    }
}

impl From<PostgresError> for DataError {
    fn from(e: PostgresError) -> Self {
        match e {
            PostgresError::Query(e) => Self::Postgres(e),
            PostgresError::Migration {
                version,
                name,
                reason,
            } => Self::Migration {
                backend: "postgres",
                version,
                name,
                reason,
            },
            e @ PostgresError::Url(_) => Self::Config(e.to_string()),
        }
    }
}
