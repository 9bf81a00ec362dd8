//! Repository traits for database backends
//!
//! `CatalogRepository` is the single interface the HTTP handlers use for
//! products and reviews. SQLite and PostgreSQL each implement it with their
//! own SQL; every method is one transaction.

use async_trait::async_trait;

use crate::data::error::DataError;
use crate::data::types::{DeleteProductOutcome, ProductInput, ProductRow, ReviewInput, ReviewRow};

/// Repository trait for product and review operations
///
/// Implemented by SQLite and PostgreSQL backends.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Check the database connection
    async fn ping(&self) -> Result<(), DataError>;

    // ==================== Product Operations ====================

    async fn create_product(&self, input: &ProductInput) -> Result<ProductRow, DataError>;

    /// Get a product with its average rating
    async fn get_product(&self, id: i64) -> Result<Option<ProductRow>, DataError>;

    /// List products newest first
    async fn list_products(&self, limit: i64, offset: i64) -> Result<Vec<ProductRow>, DataError>;

    async fn update_product(
        &self,
        id: i64,
        input: &ProductInput,
    ) -> Result<Option<ProductRow>, DataError>;

    /// Delete a product that has no reviews
    async fn delete_product(&self, id: i64) -> Result<DeleteProductOutcome, DataError>;

    // ==================== Review Operations ====================

    /// Create a review; `None` when the product does not exist
    async fn create_review(
        &self,
        product_id: i64,
        input: &ReviewInput,
    ) -> Result<Option<ReviewRow>, DataError>;

    /// List a product's reviews newest first; `None` when the product does not exist
    async fn list_reviews(
        &self,
        product_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Option<Vec<ReviewRow>>, DataError>;

    async fn update_review(
        &self,
        product_id: i64,
        review_id: i64,
        input: &ReviewInput,
    ) -> Result<Option<ReviewRow>, DataError>;

    async fn delete_review(&self, product_id: i64, review_id: i64) -> Result<bool, DataError>;
}
