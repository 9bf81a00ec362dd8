//! CatalogRepository trait implementation for SQLite
//!
//! This module implements the CatalogRepository trait for Arc<SqliteService>,
//! providing a unified interface for all product and review operations.

use std::sync::Arc;

use async_trait::async_trait;

use crate::data::error::DataError;
use crate::data::traits::CatalogRepository;
use crate::data::types::{DeleteProductOutcome, ProductInput, ProductRow, ReviewInput, ReviewRow};

use super::SqliteService;
use super::repositories::{product, review};

#[async_trait]
impl CatalogRepository for Arc<SqliteService> {
    async fn ping(&self) -> Result<(), DataError> {
        SqliteService::ping(self).await.map_err(Into::into)
    }

    // ==================== Product Operations ====================

    async fn create_product(&self, input: &ProductInput) -> Result<ProductRow, DataError> {
        product::create_product(self.pool(), input)
            .await
            .map_err(Into::into)
    }

    async fn get_product(&self, id: i64) -> Result<Option<ProductRow>, DataError> {
        product::get_product(self.pool(), id)
            .await
            .map_err(Into::into)
    }

    async fn list_products(&self, limit: i64, offset: i64) -> Result<Vec<ProductRow>, DataError> {
        product::list_products(self.pool(), limit, offset)
            .await
            .map_err(Into::into)
    }

    async fn update_product(
        &self,
        id: i64,
        input: &ProductInput,
    ) -> Result<Option<ProductRow>, DataError> {
        product::update_product(self.pool(), id, input)
            .await
            .map_err(Into::into)
    }

    async fn delete_product(&self, id: i64) -> Result<DeleteProductOutcome, DataError> {
        product::delete_product(self.pool(), id)
            .await
            .map_err(Into::into)
    }

    // ==================== Review Operations ====================

    async fn create_review(
        &self,
        product_id: i64,
        input: &ReviewInput,
    ) -> Result<Option<ReviewRow>, DataError> {
        review::create_review(self.pool(), product_id, input)
            .await
            .map_err(Into::into)
    }

    async fn list_reviews(
        &self,
        product_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Option<Vec<ReviewRow>>, DataError> {
        review::list_reviews(self.pool(), product_id, limit, offset)
            .await
            .map_err(Into::into)
    }

    async fn update_review(
        &self,
        product_id: i64,
        review_id: i64,
        input: &ReviewInput,
    ) -> Result<Option<ReviewRow>, DataError> {
        review::update_review(self.pool(), product_id, review_id, input)
            .await
            .map_err(Into::into)
    }

    async fn delete_review(&self, product_id: i64, review_id: i64) -> Result<bool, DataError> {
        review::delete_review(self.pool(), product_id, review_id)
            .await
            .map_err(Into::into)
    }
}
