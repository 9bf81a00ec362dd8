//! Product repository for PostgreSQL operations

use sqlx::{PgPool, Postgres, Transaction};

use crate::data::postgres::PostgresError;
use crate::data::types::{DeleteProductOutcome, ProductInput, ProductRow};

type ProductTuple = (i64, String, String, f64, Option<f64>, i64, i64);

// AVG over INTEGER is NUMERIC in PostgreSQL; cast so it decodes as f64
const SELECT_PRODUCT: &str = "SELECT p.id, p.name, p.description, p.price, AVG(r.rating)::FLOAT8 AS average_rating, p.created_at, p.updated_at \
     FROM products p LEFT JOIN reviews r ON r.product_id = p.id";

fn to_row(
    (id, name, description, price, average_rating, created_at, updated_at): ProductTuple,
) -> ProductRow {
    ProductRow {
        id,
        name,
        description,
        price,
        average_rating,
        created_at,
        updated_at,
    }
}

pub async fn create_product(
    pool: &PgPool,
    input: &ProductInput,
) -> Result<ProductRow, PostgresError> {
    let now = chrono::Utc::now().timestamp();
    let mut tx = pool.begin().await?;

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO products (name, description, price, created_at, updated_at) VALUES ($1, $2, $3, $4, $4) RETURNING id",
    )
    .bind(&input.name)
    .bind(&input.description)
    .bind(input.price)
    .bind(now)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(ProductRow {
        id,
        name: input.name.clone(),
        description: input.description.clone(),
        price: input.price,
        average_rating: None,
        created_at: now,
        updated_at: now,
    })
}

async fn fetch_product(
    tx: &mut Transaction<'_, Postgres>,
    id: i64,
) -> Result<Option<ProductRow>, PostgresError> {
    let row = sqlx::query_as::<_, ProductTuple>(&format!(
        "{SELECT_PRODUCT} WHERE p.id = $1 GROUP BY p.id"
    ))
    .bind(id)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(row.map(to_row))
}

pub async fn get_product(pool: &PgPool, id: i64) -> Result<Option<ProductRow>, PostgresError> {
    let mut tx = pool.begin().await?;
    let product = fetch_product(&mut tx, id).await?;
    tx.commit().await?;
    Ok(product)
}

pub async fn list_products(
    pool: &PgPool,
    limit: i64,
    offset: i64,
) -> Result<Vec<ProductRow>, PostgresError> {
    let mut tx = pool.begin().await?;

    let rows = sqlx::query_as::<_, ProductTuple>(&format!(
        "{SELECT_PRODUCT} GROUP BY p.id ORDER BY p.created_at DESC, p.id DESC LIMIT $1 OFFSET $2"
    ))
    .bind(limit)
    .bind(offset)
    .fetch_all(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(rows.into_iter().map(to_row).collect())
}

pub async fn update_product(
    pool: &PgPool,
    id: i64,
    input: &ProductInput,
) -> Result<Option<ProductRow>, PostgresError> {
    let now = chrono::Utc::now().timestamp();
    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        "UPDATE products SET name = $1, description = $2, price = $3, updated_at = $4 WHERE id = $5",
    )
    .bind(&input.name)
    .bind(&input.description)
    .bind(input.price)
    .bind(now)
    .bind(id)
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }

    let product = fetch_product(&mut tx, id).await?;
    tx.commit().await?;
    Ok(product)
}

/// Delete a product unless it still has reviews
///
/// The product row is locked first so a concurrent review insert cannot slip
/// in between the review check and the delete.
pub async fn delete_product(
    pool: &PgPool,
    id: i64,
) -> Result<DeleteProductOutcome, PostgresError> {
    let mut tx = pool.begin().await?;

    let locked: Option<i64> = sqlx::query_scalar("SELECT id FROM products WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
    if locked.is_none() {
        return Ok(DeleteProductOutcome::NotFound);
    }

    let has_reviews: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM reviews WHERE product_id = $1)")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
    if has_reviews {
        return Ok(DeleteProductOutcome::HasReviews);
    }

    sqlx::query("DELETE FROM products WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(DeleteProductOutcome::Deleted)
}
