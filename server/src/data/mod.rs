//! Data storage layer
//!
//! Provides the storage services behind the HTTP handlers:
//! - `sqlite` - Embedded transactional database (default)
//! - `postgres` - Transactional database for shared deployments
//! - `cache` - In-memory and Redis caching of review pages and ratings
//! - `idempotency` - Stored responses for replaying repeated mutations
//! - `events` - Best-effort publication of review changes
//! - `types` - Shared row and input types across backends
//! - `traits` - Repository trait for multi-database support
//! - `error` - Unified error type for all backends
//!
//! ## Backend Support
//!
//! `CatalogRepository` is implemented by both SQLite and PostgreSQL, so the
//! handlers never know which backend they talk to.

pub mod cache;
pub mod error;
pub mod events;
pub mod idempotency;
pub mod postgres;
pub mod sqlite;
pub mod traits;
pub mod types;

// Re-export backend-specific services
pub use postgres::PostgresService;
pub use sqlite::SqliteService;

// Re-export unified error type
pub use error::DataError;

// Re-export repository trait
pub use traits::CatalogRepository;

use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::core::config::{DatabaseConfig, TransactionalBackend};
use crate::core::storage::AppStorage;

/// Transactional database service enum
///
/// Wraps the underlying backend-specific service (SQLite or PostgreSQL).
/// Services are stored as Arc so repositories can hold their own handle.
pub enum TransactionalService {
    /// SQLite backend (default, embedded)
    Sqlite(Arc<SqliteService>),
    /// PostgreSQL backend (for distributed deployments)
    Postgres(Arc<PostgresService>),
}

impl TransactionalService {
    /// Initialize the transactional service based on configuration
    ///
    /// For SQLite, an explicit `sqlite_path` wins over the storage directory.
    /// For PostgreSQL, the postgres section must be present.
    pub async fn init(config: &DatabaseConfig, storage: &AppStorage) -> Result<Self, DataError> {
        match config.transactional {
            TransactionalBackend::Sqlite => {
                let service = SqliteService::init(storage, config.sqlite_path.as_deref()).await?;
                Ok(Self::Sqlite(Arc::new(service)))
            }
            TransactionalBackend::Postgres => {
                let pg = config.postgres.as_ref().ok_or_else(|| {
                    DataError::Config("PostgreSQL configuration required".to_string())
                })?;
                let service = PostgresService::init(pg).await?;
                Ok(Self::Postgres(Arc::new(service)))
            }
        }
    }

    /// Run a WAL checkpoint (SQLite) or equivalent maintenance task
    pub async fn checkpoint(&self) -> Result<(), DataError> {
        match self {
            Self::Sqlite(s) => s.checkpoint().await.map_err(Into::into),
            // PostgreSQL manages its own maintenance via autovacuum
            Self::Postgres(_) => Ok(()),
        }
    }

    /// Close the database connection gracefully
    pub async fn close(&self) {
        match self {
            Self::Sqlite(s) => s.close().await,
            Self::Postgres(p) => p.close().await,
        }
    }

    /// Start the background checkpoint task (SQLite only)
    /// For PostgreSQL, starts a health check task instead.
    pub fn start_checkpoint_task(&self, shutdown_rx: watch::Receiver<bool>) -> JoinHandle<()> {
        match self {
            Self::Sqlite(s) => Arc::clone(s).start_checkpoint_task(shutdown_rx),
            Self::Postgres(p) => Arc::clone(p).start_health_check_task(shutdown_rx),
        }
    }

    /// Get the backend type
    pub fn backend(&self) -> TransactionalBackend {
        match self {
            Self::Sqlite(_) => TransactionalBackend::Sqlite,
            Self::Postgres(_) => TransactionalBackend::Postgres,
        }
    }

    /// Get the repository trait object for product and review operations
    pub fn repository(&self) -> Arc<dyn CatalogRepository> {
        match self {
            Self::Sqlite(s) => Arc::new(Arc::clone(s)),
            Self::Postgres(p) => Arc::new(Arc::clone(p)),
        }
    }
}
