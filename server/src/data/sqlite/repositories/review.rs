//! Review repository for SQLite operations
//!
//! Reviews are always addressed through their product: an update or delete
//! with a mismatched product ID behaves as if the review does not exist.

use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::data::sqlite::SqliteError;
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

async fn product_exists(
    tx: &mut Transaction<'_, Sqlite>,
    product_id: i64,
) -> Result<bool, SqliteError> {
    let exists = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM products WHERE id = ?)")
        .bind(product_id)
        .fetch_one(&mut **tx)
        .await?;
    Ok(exists)
}

/// Create a review, returning `None` if the product does not exist
pub async fn create_review(
    pool: &SqlitePool,
    product_id: i64,
    input: &ReviewInput,
) -> Result<Option<ReviewRow>, SqliteError> {
    let now = chrono::Utc::now().timestamp();
    let mut tx = pool.begin().await?;

    if !product_exists(&mut tx, product_id).await? {
        return Ok(None);
    }

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO reviews (product_id, first_name, last_name, rating, comment, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(product_id)
    .bind(&input.first_name)
    .bind(&input.last_name)
    .bind(input.rating)
    .bind(&input.comment)
    .bind(now)
    .bind(now)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(Some(ReviewRow {
        id,
        product_id,
        first_name: input.first_name.clone(),
        last_name: input.last_name.clone(),
        rating: input.rating,
        comment: input.comment.clone(),
        created_at: now,
        updated_at: now,
    }))
}

/// List a product's reviews newest first, `None` if the product does not exist
pub async fn list_reviews(
    pool: &SqlitePool,
    product_id: i64,
    limit: i64,
    offset: i64,
) -> Result<Option<Vec<ReviewRow>>, SqliteError> {
    let mut tx = pool.begin().await?;

    if !product_exists(&mut tx, product_id).await? {
        return Ok(None);
    }

    let rows = sqlx::query_as::<_, ReviewTuple>(&format!(
        "SELECT {REVIEW_COLUMNS} FROM reviews WHERE product_id = ? ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
    ))
    .bind(product_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(Some(rows.into_iter().map(to_row).collect()))
}

/// Replace a review's fields, `None` if no such review belongs to the product
pub async fn update_review(
    pool: &SqlitePool,
    product_id: i64,
    review_id: i64,
    input: &ReviewInput,
) -> Result<Option<ReviewRow>, SqliteError> {
    let now = chrono::Utc::now().timestamp();
    let mut tx = pool.begin().await?;

    let row = sqlx::query_as::<_, ReviewTuple>(&format!(
        "UPDATE reviews SET first_name = ?, last_name = ?, rating = ?, comment = ?, updated_at = ? \
         WHERE id = ? AND product_id = ? RETURNING {REVIEW_COLUMNS}"
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

/// Delete a review, returning whether it existed under the product
pub async fn delete_review(
    pool: &SqlitePool,
    product_id: i64,
    review_id: i64,
) -> Result<bool, SqliteError> {
    let mut tx = pool.begin().await?;

    let result = sqlx::query("DELETE FROM reviews WHERE id = ? AND product_id = ?")
        .bind(review_id)
        .bind(product_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(result.rows_affected() > 0)
}
