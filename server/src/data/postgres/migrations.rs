//! PostgreSQL migration management
//!
//! Handles schema initialization and versioned migrations.

use sqlx::PgPool;

use super::error::PostgresError;
use super::schema::{SCHEMA, SCHEMA_VERSION};
use crate::utils::crypto::sha256_hex;

/// Run all pending migrations
pub async fn run_migrations(pool: &PgPool) -> Result<(), PostgresError> {
    let table_exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS (
            SELECT FROM information_schema.tables
            WHERE table_schema = 'public'
            AND table_name = 'schema_version'
        )
        "#,
    )
    .fetch_one(pool)
    .await?;

    if !table_exists {
        tracing::debug!("Applying initial PostgreSQL schema v{}", SCHEMA_VERSION);
        apply_initial_schema(pool).await?;
        return Ok(());
    }

    let current_version: Option<i32> =
        sqlx::query_scalar("SELECT version FROM schema_version WHERE id = 1")
            .fetch_optional(pool)
            .await?;

    match current_version {
        None => {
            // Table exists but no version row - apply schema
            tracing::debug!("Applying initial PostgreSQL schema v{}", SCHEMA_VERSION);
            apply_initial_schema(pool).await?;
        }
        Some(v) if v < SCHEMA_VERSION => {
            // No incremental migrations exist yet
            return Err(PostgresError::Migration {
                version: v + 1,
                name: "unknown".to_string(),
                reason: format!("No migration defined for version {}", v + 1),
            });
        }
        Some(v) if v > SCHEMA_VERSION => {
            tracing::warn!(
                "PostgreSQL schema version {} is newer than application version {}. This may cause issues.",
                v,
                SCHEMA_VERSION
            );
        }
        _ => {
            tracing::debug!("PostgreSQL schema is up to date (v{})", SCHEMA_VERSION);
        }
    }

    Ok(())
}

/// Apply the initial schema
///
/// The schema holds several statements, so it goes through `raw_sql`, which
/// uses the simple query protocol.
async fn apply_initial_schema(pool: &PgPool) -> Result<(), PostgresError> {
    let start = std::time::Instant::now();
    let now = chrono::Utc::now().timestamp();

    let mut tx = pool.begin().await?;

    sqlx::raw_sql(SCHEMA)
        .execute(&mut *tx)
        .await
        .map_err(|e| PostgresError::Migration {
            version: SCHEMA_VERSION,
            name: "initial_schema".to_string(),
            reason: e.to_string(),
        })?;

    sqlx::query(
        "INSERT INTO schema_version (id, version, applied_at, description)
         VALUES (1, $1, $2, 'Initial schema')
         ON CONFLICT (id) DO UPDATE SET version = $1, applied_at = $2",
    )
    .bind(SCHEMA_VERSION)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    let elapsed_ms = start.elapsed().as_millis() as i32;
    sqlx::query(
        "INSERT INTO schema_migrations (version, name, applied_at, checksum, execution_time_ms, success)
         VALUES ($1, $2, $3, $4, $5, TRUE)
         ON CONFLICT (version) DO NOTHING",
    )
    .bind(SCHEMA_VERSION)
    .bind("initial_schema")
    .bind(now)
    .bind(sha256_hex(SCHEMA))
    .bind(elapsed_ms)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::debug!("PostgreSQL schema v{} applied successfully", SCHEMA_VERSION);
    Ok(())
}
