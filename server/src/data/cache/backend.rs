//! Cache backend trait definition

use std::time::Duration;

use async_trait::async_trait;

use super::error::CacheError;

/// Cache backend trait
///
/// The narrow key-value surface the cache and idempotency layers need.
/// In-memory, Redis and no-op backends implement it.
///
/// # Consistency Notes
///
/// Operations on individual keys are atomic. `scan` gives no snapshot
/// guarantee: keys written during an iteration may or may not be returned.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Get a value from the cache
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Set a value in the cache with optional TTL, overwriting any previous value
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>)
    -> Result<(), CacheError>;

    /// Delete keys, returning how many existed
    async fn delete(&self, keys: &[String]) -> Result<u64, CacheError>;

    /// One step of a cursor-driven key scan
    ///
    /// Start with cursor `0`; iteration is complete when the returned cursor
    /// is `0` again. `count` is a hint for the page size. Patterns use glob
    /// syntax with a trailing `*`.
    async fn scan(
        &self,
        pattern: &str,
        cursor: u64,
        count: usize,
    ) -> Result<(u64, Vec<String>), CacheError>;

    /// Get the TTL remaining for a key
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, CacheError>;

    /// Health check (validates connection)
    async fn health_check(&self) -> Result<(), CacheError>;

    /// Backend name for debugging/logging
    fn backend_name(&self) -> &'static str;
}
