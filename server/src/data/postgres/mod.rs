//! PostgreSQL backend
//!
//! For deployments where several instances share one catalog database.
//! Pool bounds and timeouts come from `database.postgres`; a zero bound or
//! timeout falls back to its default, except `statement_timeout_secs = 0`,
//! which turns the server-side statement timeout off.

pub mod error;
mod migrations;
pub mod repositories;
mod repository_impl;
pub mod schema;

pub use error::PostgresError;
pub use sqlx::PgPool;

use std::sync::Arc;
use std::time::Duration;

use sqlx::ConnectOptions;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::log::LevelFilter;

use crate::core::config::PostgresConfig;
use crate::core::constants::{
    POSTGRES_DEFAULT_ACQUIRE_TIMEOUT_SECS, POSTGRES_DEFAULT_IDLE_TIMEOUT_SECS,
    POSTGRES_DEFAULT_MAX_CONNECTIONS, POSTGRES_DEFAULT_MAX_LIFETIME_SECS,
};

/// Interval between background `SELECT 1` health checks
const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(60);

pub struct PostgresService {
    pool: PgPool,
}

impl PostgresService {
    /// Connect, then bring the schema up to date
    pub async fn init(config: &PostgresConfig) -> Result<Self, PostgresError> {
        let options = pool_options(config);
        let max_connections = options.get_max_connections();
        let min_connections = options.get_min_connections();
        let pool = options
            .connect_with(connect_options(config)?)
            .await?;

        migrations::run_migrations(&pool).await?;

        tracing::debug!(
            max_connections,
            min_connections,
            statement_timeout_secs = config.statement_timeout_secs,
            "PostgresService initialized"
        );
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn ping(&self) -> Result<(), PostgresError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
        tracing::debug!("PostgreSQL pool closed");
    }

    /// Ping the pool periodically until shutdown, logging failures
    pub fn start_health_check_task(
        self: &Arc<Self>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let db = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(HEALTH_CHECK_INTERVAL);
            loop {
                tokio::select! {
                    biased;
                    _ = async { let _ = shutdown_rx.wait_for(|stopping| *stopping).await; } => break,
                    _ = interval.tick() => {
                        if let Err(e) = db.ping().await {
                            tracing::warn!(error = %e, "PostgreSQL health check failed");
                        }
                    }
                }
            }
            tracing::debug!("PostgreSQL health check task stopped");
        })
    }
}

fn nonzero_or<T: Default + PartialEq>(value: T, default: T) -> T {
    if value == T::default() { default } else { value }
}

fn connect_options(config: &PostgresConfig) -> Result<PgConnectOptions, PostgresError> {
    if config.url.is_empty() {
        return Err(PostgresError::Url("URL is required".into()));
    }
    let options = config
        .url
        .parse::<PgConnectOptions>()
        .map_err(|e| PostgresError::Url(e.to_string()))?
        .log_statements(LevelFilter::Trace);

    Ok(match config.statement_timeout_secs {
        0 => options,
        secs => options.options([("statement_timeout", format!("{secs}s"))]),
    })
}

fn pool_options(config: &PostgresConfig) -> PgPoolOptions {
    let secs = |value: u64, default: u64| Duration::from_secs(nonzero_or(value, default));
    PgPoolOptions::new()
        .max_connections(nonzero_or(
            config.max_connections,
            POSTGRES_DEFAULT_MAX_CONNECTIONS,
        ))
        .min_connections(config.min_connections)
        .acquire_timeout(secs(
            config.acquire_timeout_secs,
            POSTGRES_DEFAULT_ACQUIRE_TIMEOUT_SECS,
        ))
        .idle_timeout(secs(
            config.idle_timeout_secs,
            POSTGRES_DEFAULT_IDLE_TIMEOUT_SECS,
        ))
        .max_lifetime(secs(
            config.max_lifetime_secs,
            POSTGRES_DEFAULT_MAX_LIFETIME_SECS,
        ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: &str) -> PostgresConfig {
        PostgresConfig {
            url: url.to_string(),
            max_connections: 0,
            min_connections: 0,
            acquire_timeout_secs: 5,
            idle_timeout_secs: 0,
            max_lifetime_secs: 0,
            statement_timeout_secs: 15,
        }
    }

    #[test]
    fn test_nonzero_or() {
        assert_eq!(nonzero_or(0u32, 20), 20);
        assert_eq!(nonzero_or(4u32, 20), 4);
    }

    #[test]
    fn test_pool_options_fill_zero_bounds() {
        let options = pool_options(&config("postgres://localhost/reviews"));
        assert_eq!(
            options.get_max_connections(),
            POSTGRES_DEFAULT_MAX_CONNECTIONS
        );
        assert_eq!(options.get_min_connections(), 0);
        assert_eq!(options.get_acquire_timeout(), Duration::from_secs(5));
        assert_eq!(
            options.get_idle_timeout(),
            Some(Duration::from_secs(POSTGRES_DEFAULT_IDLE_TIMEOUT_SECS))
        );
    }

    #[test]
    fn test_connect_options_statement_timeout() {
        let options = connect_options(&config("postgres://localhost/reviews")).unwrap();
        assert!(
            options
                .get_options()
                .is_some_and(|o| o.contains("statement_timeout=15s"))
        );

        let disabled = PostgresConfig {
            statement_timeout_secs: 0,
            ..config("postgres://localhost/reviews")
        };
        assert!(connect_options(&disabled).unwrap().get_options().is_none());
    }

    #[test]
    fn test_connect_options_rejects_bad_url() {
        assert!(matches!(
            connect_options(&config("")),
            Err(PostgresError::Url(_))
        ));
        assert!(matches!(
            connect_options(&config("not a url")),
            Err(PostgresError::Url(_))
        ));
    }
}
