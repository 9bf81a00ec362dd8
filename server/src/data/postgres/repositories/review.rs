//! Review repository for PostgreSQL operations

use sqlx::{PgPool, Postgres, Transaction};

use crate::data::postgres::PostgresError;
use crate::data::types::{ReviewInput, ReviewRow};

type ReviewTuple = (i64, i64, String, String, i32, Option<String>, i64, i64);

const REVIEW_COLUMNS: &str =
    "id, product_id, first_name, last_name, rating, comment, created_at, updated_at";

fn to_row(
    (id, product_id, first_name, last_name, rating, comment, created_at, updated_at): ReviewTuple,
) -> ReviewRow {
    ReviewRow {
        id,
        product_id,
        first_name,
        last_name,
        rating,
        comment,
        created_at,
        updated_at,
    }
}

/// Shared lock on the product row: it cannot be deleted until commit
async fn lock_product(
    tx: &mut Transaction<'_, Postgres>,
    product_id: i64,
) -> Result<bool, PostgresError> {
    let row: Option<i64> =
        sqlx::query_scalar("SELECT id FROM products WHERE id = $1 FOR SHARE")
            .bind(product_id)
            .fetch_optional(&mut **tx)
            .await?;
    Ok(row.is_some())
}

pub async fn create_review(
    pool: &PgPool,
    product_id: i64,
    input: &ReviewInput,
) -> Result<Option<ReviewRow>, PostgresError> {
    let now = chrono::Utc::now().timestamp();
    let mut tx = pool.begin().await?;

    if !lock_product(&mut tx, product_id).await? {
        return Ok(None);
    }

    let row = sqlx::query_as::<_, ReviewTuple>(&format!(
        "INSERT INTO reviews (product_id, first_name, last_name, rating, comment, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $6) RETURNING {REVIEW_COLUMNS}"
    ))
    .bind(product_id)
    .bind(&input.first_name)
    .bind(&input.last_name)
    .bind(input.rating)
    .bind(&input.comment)
    .bind(now)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(Some(to_row(row)))
}

pub async fn list_reviews(
    pool: &PgPool,
    product_id: i64,
    limit: i64,
    offset: i64,
) -> Result<Option<Vec<ReviewRow>>, PostgresError> {
    let mut tx = pool.begin().await?;

    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM products WHERE id = $1)")
        .bind(product_id)
        .fetch_one(&mut *tx)
        .await?;
    if !exists {
        return Ok(None);
    }

    let rows = sqlx::query_as::<_, ReviewTuple>(&format!(
        "SELECT {REVIEW_COLUMNS} FROM reviews WHERE product_id = $1 ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3"
    ))
    .bind(product_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(Some(rows.into_iter().map(to_row).collect()))
}

pub async fn update_review(
    pool: &PgPool,
    product_id: i64,
    review_id: i64,
    input: &ReviewInput,
) -> Result<Option<ReviewRow>, PostgresError> {
    let now = chrono::Utc::now().timestamp();
    let mut tx = pool.begin().await?;

    let row = sqlx::query_as::<_, ReviewTuple>(&format!(
        "UPDATE reviews SET first_name = $1, last_name = $2, rating = $3, comment = $4, updated_at = $5 \
         WHERE id = $6 AND product_id = $7 RETURNING {REVIEW_COLUMNS}"
    ))
    .bind(&input.first_name)
    .bind(&input.last_name)
    .bind(input.rating)
    .bind(&input.comment)
    .bind(now)
    .bind(review_id)
    .bind(product_id)
    .fetch_optional(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(row.map(to_row))
}

pub async fn delete_review(
    pool: &PgPool,
    product_id: i64,
    review_id: i64,
) -> Result<bool, PostgresError> {
    let mut tx = pool.begin().await?;

    let result = sqlx::query("DELETE FROM reviews WHERE id = $1 AND product_id = $2")
        .bind(review_id)
        .bind(product_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(result.rows_affected() > 0)
}
