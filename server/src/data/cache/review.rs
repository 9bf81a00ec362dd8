//! Cache-aside access for review pages and product ratings
//!
//! Nothing here returns an error. Store failures and undecodable payloads are
//! logged and reported as misses, so callers always fall back to the database.

use std::sync::Arc;
use std::time::Duration;

use super::{CacheKey, CacheService};
use crate::data::types::ReviewRow;

/// Outcome of a rating lookup
///
/// A product with no reviews has a cached rating of `Cached(None)`, which is
/// different from the rating not being cached at all.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RatingLookup {
    Miss,
    Cached(Option<f64>),
}

#[derive(Clone)]
pub struct ReviewCache {
    cache: Arc<CacheService>,
    ttl: Duration,
}

impl ReviewCache {
    pub fn new(cache: Arc<CacheService>, ttl: Duration) -> Self {
        Self { cache, ttl }
    }

    /// Cached page of a product's reviews, `None` on miss
    pub async fn get_reviews(
        &self,
        product_id: i64,
        limit: i64,
        offset: i64,
    ) -> Option<Vec<ReviewRow>> {
        let key = CacheKey::reviews_page(product_id, limit, offset);
        match self.cache.get::<Vec<ReviewRow>>(&key).await {
            Ok(Some(reviews)) => {
                tracing::trace!(product_id, limit, offset, "Reviews cache hit");
                Some(reviews)
            }
            Ok(None) => {
                tracing::trace!(product_id, limit, offset, "Reviews cache miss");
                None
            }
            Err(e) => {
                tracing::warn!(%key, error = %e, "Cache get error");
                None
            }
        }
    }

    pub async fn set_reviews(
        &self,
        product_id: i64,
        limit: i64,
        offset: i64,
        reviews: &[ReviewRow],
    ) {
        let key = CacheKey::reviews_page(product_id, limit, offset);
        if let Err(e) = self.cache.set(&key, &reviews, Some(self.ttl)).await {
            tracing::warn!(%key, error = %e, "Cache set error");
        }
    }

    pub async fn get_rating(&self, product_id: i64) -> RatingLookup {
        let key = CacheKey::rating(product_id);
        match self.cache.get::<Option<f64>>(&key).await {
            Ok(Some(rating)) => {
                tracing::trace!(product_id, "Rating cache hit");
                RatingLookup::Cached(rating)
            }
            Ok(None) => RatingLookup::Miss,
            Err(e) => {
                tracing::warn!(%key, error = %e, "Cache get error");
                RatingLookup::Miss
            }
        }
    }

    /// Cache a product's average rating
    ///
    /// `None` is stored as an explicit nil so a later read yields
    /// `RatingLookup::Cached(None)` instead of a miss.
    pub async fn set_rating(&self, product_id: i64, rating: Option<f64>) {
        let key = CacheKey::rating(product_id);
        if let Err(e) = self.cache.set(&key, &rating, Some(self.ttl)).await {
            tracing::warn!(%key, error = %e, "Cache set error");
        }
    }

    /// Drop the rating and every cached review page of a product
    pub async fn invalidate_product(&self, product_id: i64) {
        self.cache
            .invalidate_key(&CacheKey::rating(product_id))
            .await;

        match self
            .cache
            .delete_pattern(&CacheKey::reviews_pattern(product_id))
            .await
        {
            Ok(deleted) => tracing::debug!(product_id, deleted, "Review cache invalidated"),
            Err(e) => {
                tracing::warn!(product_id, error = %e, "Review cache invalidation failed")
            }
        }
    }
}
