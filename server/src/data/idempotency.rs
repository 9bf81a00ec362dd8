//! Stored responses for idempotent request replay
//!
//! Records share the cache backend but live under the `idempotency:` key
//! namespace, so review invalidation never touches them.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::cache::{CacheError, CacheKey, CacheService};

/// A captured HTTP response, replayed verbatim for a repeated token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredResponse {
    pub status: u16,
    /// Header values are kept as raw bytes; not every value is valid UTF-8
    pub headers: Vec<(String, Vec<u8>)>,
    pub body: Vec<u8>,
}

#[derive(Clone)]
pub struct IdempotencyStore {
    cache: Arc<CacheService>,
    ttl: Duration,
}

impl IdempotencyStore {
    pub fn new(cache: Arc<CacheService>, ttl: Duration) -> Self {
        Self { cache, ttl }
    }

    /// Previously stored response for `token`, if any
    pub async fn lookup(&self, token: &[u8]) -> Result<Option<StoredResponse>, CacheError> {
        self.cache.get(&CacheKey::idempotency(token)).await
    }

    /// Remember a response for the configured TTL, overwriting any previous one
    pub async fn save(&self, token: &[u8], response: &StoredResponse) -> Result<(), CacheError> {
        self.cache
            .set(&CacheKey::idempotency(token), response, Some(self.ttl))
            .await
    }
}
