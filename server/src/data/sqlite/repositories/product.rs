//! Product repository for SQLite operations

use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::data::sqlite::SqliteError;
use crate::data::types::{DeleteProductOutcome, ProductInput, ProductRow};

type ProductTuple = (i64, String, String, f64, Option<f64>, i64, i64);

const SELECT_PRODUCT: &str = "SELECT p.id, p.name, p.description, p.price, AVG(r.rating) AS average_rating, p.created_at, p.updated_at \
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

/// Create a new product
pub async fn create_product(
    pool: &SqlitePool,
    input: &ProductInput,
) -> Result<ProductRow, SqliteError> {
    let now = chrono::Utc::now().timestamp();
    let mut tx = pool.begin().await?;

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO products (name, description, price, created_at, updated_at) VALUES (?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(&input.name)
    .bind(&input.description)
    .bind(input.price)
    .bind(now)
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
    tx: &mut Transaction<'_, Sqlite>,
    id: i64,
) -> Result<Option<ProductRow>, SqliteError> {
    let row = sqlx::query_as::<_, ProductTuple>(&format!(
        "{SELECT_PRODUCT} WHERE p.id = ? GROUP BY p.id"
    ))
    .bind(id)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(row.map(to_row))
}

/// Get a product by ID with its average rating
pub async fn get_product(pool: &SqlitePool, id: i64) -> Result<Option<ProductRow>, SqliteError> {
    let mut tx = pool.begin().await?;
    let product = fetch_product(&mut tx, id).await?;
    tx.commit().await?;
    Ok(product)
}

/// List products with their average ratings, newest first
pub async fn list_products(
    pool: &SqlitePool,
    limit: i64,
    offset: i64,
) -> Result<Vec<ProductRow>, SqliteError> {
    let mut tx = pool.begin().await?;

    let rows = sqlx::query_as::<_, ProductTuple>(&format!(
        "{SELECT_PRODUCT} GROUP BY p.id ORDER BY p.created_at DESC, p.id DESC LIMIT ? OFFSET ?"
    ))
    .bind(limit)
    .bind(offset)
    .fetch_all(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(rows.into_iter().map(to_row).collect())
}

/// Replace a product's fields, returning `None` if it does not exist
pub async fn update_product(
    pool: &SqlitePool,
    id: i64,
    input: &ProductInput,
) -> Result<Option<ProductRow>, SqliteError> {
    let now = chrono::Utc::now().timestamp();
    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        "UPDATE products SET name = ?, description = ?, price = ?, updated_at = ? WHERE id = ?",
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
pub async fn delete_product(
    pool: &SqlitePool,
    id: i64,
) -> Result<DeleteProductOutcome, SqliteError> {
    let mut tx = pool.begin().await?;

    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM products WHERE id = ?)")
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
    if !exists {
        return Ok(DeleteProductOutcome::NotFound);
    }

    let has_reviews: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM reviews WHERE product_id = ?)")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
    if has_reviews {
        return Ok(DeleteProductOutcome::HasReviews);
    }

    sqlx::query("DELETE FROM products WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(DeleteProductOutcome::Deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sqlite::SqliteService;
    use crate::data::sqlite::repositories::review::create_review;
    use crate::data::types::ReviewInput;

    fn input(name: &str, price: f64) -> ProductInput {
        ProductInput {
            name: name.to_string(),
            description: "A product".to_string(),
            price,
        }
    }

    fn rating(value: i32) -> ReviewInput {
        ReviewInput {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            rating: value,
            comment: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_product() {
        let db = SqliteService::in_memory().await.unwrap();
        let created = create_product(db.pool(), &input("Lamp", 19.5)).await.unwrap();

        assert!(created.id > 0);
        assert_eq!(created.created_at, created.updated_at);

        let fetched = get_product(db.pool(), created.id).await.unwrap().unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.average_rating, None);
    }

    #[tokio::test]
    async fn test_get_missing_product() {
        let db = SqliteService::in_memory().await.unwrap();
        assert!(get_product(db.pool(), 404).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_average_rating() {
        let db = SqliteService::in_memory().await.unwrap();
        let product = create_product(db.pool(), &input("Lamp", 19.5)).await.unwrap();

        create_review(db.pool(), product.id, &rating(5)).await.unwrap();
        create_review(db.pool(), product.id, &rating(4)).await.unwrap();

        let fetched = get_product(db.pool(), product.id).await.unwrap().unwrap();
        assert_eq!(fetched.average_rating, Some(4.5));
    }

    #[tokio::test]
    async fn test_list_products_pagination() {
        let db = SqliteService::in_memory().await.unwrap();
        for i in 0..3 {
            create_product(db.pool(), &input(&format!("P{i}"), 1.0))
                .await
                .unwrap();
        }

        let all = list_products(db.pool(), 10, 0).await.unwrap();
        assert_eq!(all.len(), 3);
        // Same-second inserts fall back to id order, newest first
        assert_eq!(all[0].name, "P2");

        let page = list_products(db.pool(), 2, 2).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].name, "P0");
    }

    #[tokio::test]
    async fn test_update_product() {
        let db = SqliteService::in_memory().await.unwrap();
        let product = create_product(db.pool(), &input("Lamp", 19.5)).await.unwrap();

        let updated = update_product(db.pool(), product.id, &input("Desk lamp", 24.0))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.name, "Desk lamp");
        assert_eq!(updated.price, 24.0);

        assert!(
            update_product(db.pool(), 999, &input("Ghost", 1.0))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_delete_product_outcomes() {
        let db = SqliteService::in_memory().await.unwrap();
        let bare = create_product(db.pool(), &input("Bare", 1.0)).await.unwrap();
        let reviewed = create_product(db.pool(), &input("Reviewed", 1.0)).await.unwrap();
        create_review(db.pool(), reviewed.id, &rating(3)).await.unwrap();

        assert_eq!(
            delete_product(db.pool(), bare.id).await.unwrap(),
            DeleteProductOutcome::Deleted
        );
        assert_eq!(
            delete_product(db.pool(), bare.id).await.unwrap(),
            DeleteProductOutcome::NotFound
        );
        assert_eq!(
            delete_product(db.pool(), reviewed.id).await.unwrap(),
            DeleteProductOutcome::HasReviews
        );
        assert!(get_product(db.pool(), reviewed.id).await.unwrap().is_some());
    }
}
