//! In-memory cache implementation using moka
//!
//! Uses moka for the main cache with TinyLFU eviction and per-entry TTLs.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::Expiry;
use moka::future::Cache;

use super::backend::CacheBackend;
use super::error::CacheError;
use crate::core::config::CacheConfig;

/// Cache entry with data and metadata
#[derive(Clone)]
struct CacheEntry {
    data: Vec<u8>,
    ttl: Option<Duration>,
    created_at: Instant,
}

/// Per-entry expiry tracking for variable TTLs
struct VariableTtlExpiry;

impl Expiry<String, CacheEntry> for VariableTtlExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CacheEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        value.ttl
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CacheEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        value.ttl
    }

    fn expire_after_read(
        &self,
        _key: &String,
        _value: &CacheEntry,
        _read_at: Instant,
        duration_until_expiry: Option<Duration>,
        _last_modified_at: Instant,
    ) -> Option<Duration> {
        duration_until_expiry
    }
}

/// In-memory cache implementation
pub struct InMemoryCache {
    cache: Cache<String, CacheEntry>,
}

impl InMemoryCache {
    /// Bounded by `max_entries`; moka evicts with TinyLFU once full
    pub fn new(config: &CacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_entries)
            .initial_capacity((config.max_entries as usize / 4).min(10_000))
            .expire_after(VariableTtlExpiry)
            .build();

        Self { cache }
    }
}

#[async_trait]
impl CacheBackend for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(self.cache.get(key).await.map(|entry| entry.data))
    }

    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        let entry = CacheEntry {
            data: value,
            ttl,
            created_at: Instant::now(),
        };
        self.cache.insert(key.to_string(), entry).await;
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<u64, CacheError> {
        let mut deleted = 0u64;
        for key in keys {
            if self.cache.remove(key).await.is_some() {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    async fn scan(
        &self,
        pattern: &str,
        _cursor: u64,
        _count: usize,
    ) -> Result<(u64, Vec<String>), CacheError> {
        // Whole match set in one page; cursor and count are ignored
        let prefix = pattern.trim_end_matches('*');

        // moka iter yields Arc<String> keys
        let keys: Vec<String> = self
            .cache
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| (*k).clone())
            .collect();

        Ok((0, keys))
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, CacheError> {
        let Some(entry) = self.cache.get(key).await else {
            return Ok(None);
        };
        Ok(entry
            .ttl
            .and_then(|ttl| ttl.checked_sub(entry.created_at.elapsed()))
            .filter(|remaining| *remaining > Duration::ZERO))
    }

    async fn health_check(&self) -> Result<(), CacheError> {
        // In-memory is always healthy
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> CacheConfig {
        CacheConfig {
            backend: crate::core::config::CacheBackendType::Memory,
            max_entries: 1000,
            redis_url: None,
        }
    }

    #[tokio::test]
    async fn test_set_get_roundtrip() {
        let cache = InMemoryCache::new(&test_config());

        cache.set("key1", b"value1".to_vec(), None).await.unwrap();
        let result = cache.get("key1").await.unwrap();
        assert_eq!(result, Some(b"value1".to_vec()));
    }

    #[tokio::test]
    async fn test_get_nonexistent() {
        let cache = InMemoryCache::new(&test_config());
        assert_eq!(cache.get("nonexistent").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_overwrites() {
        let cache = InMemoryCache::new(&test_config());

        cache.set("key1", b"old".to_vec(), None).await.unwrap();
        cache.set("key1", b"new".to_vec(), None).await.unwrap();
        assert_eq!(cache.get("key1").await.unwrap(), Some(b"new".to_vec()));
    }

    #[tokio::test]
    async fn test_delete_counts_existing_keys() {
        let cache = InMemoryCache::new(&test_config());

        cache.set("a", b"1".to_vec(), None).await.unwrap();
        cache.set("b", b"2".to_vec(), None).await.unwrap();

        let keys = vec!["a".to_string(), "b".to_string(), "missing".to_string()];
        assert_eq!(cache.delete(&keys).await.unwrap(), 2);
        assert_eq!(cache.get("a").await.unwrap(), None);
        assert_eq!(cache.delete(&keys).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_scan_matches_prefix() {
        let cache = InMemoryCache::new(&test_config());

        cache.set("v1:reviews:product:1:limit:10:offset:0", b"a".to_vec(), None).await.unwrap();
        cache.set("v1:reviews:product:1:limit:5:offset:5", b"b".to_vec(), None).await.unwrap();
        cache.set("v1:reviews:product:12:limit:10:offset:0", b"c".to_vec(), None).await.unwrap();
        cache.cache.run_pending_tasks().await;

        let (cursor, mut keys) = cache
            .scan("v1:reviews:product:1:*", 0, 100)
            .await
            .unwrap();
        keys.sort();

        assert_eq!(cursor, 0);
        assert_eq!(
            keys,
            vec![
                "v1:reviews:product:1:limit:10:offset:0".to_string(),
                "v1:reviews:product:1:limit:5:offset:5".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_ttl_expiration() {
        let cache = InMemoryCache::new(&test_config());

        cache
            .set("key1", b"value1".to_vec(), Some(Duration::from_millis(50)))
            .await
            .unwrap();
        assert!(cache.get("key1").await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(100)).await;

        // Force cache cleanup by running sync
        cache.cache.run_pending_tasks().await;

        assert_eq!(cache.get("key1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_ttl_for_cache_entry() {
        let cache = InMemoryCache::new(&test_config());

        cache
            .set("key1", b"value1".to_vec(), Some(Duration::from_secs(60)))
            .await
            .unwrap();

        let ttl_secs = cache.ttl("key1").await.unwrap().unwrap().as_secs();
        assert!((58..=60).contains(&ttl_secs));
    }

    #[tokio::test]
    async fn test_ttl_for_infinite_and_missing_entry() {
        let cache = InMemoryCache::new(&test_config());

        cache.set("key1", b"value1".to_vec(), None).await.unwrap();
        assert!(cache.ttl("key1").await.unwrap().is_none());
        assert!(cache.ttl("nonexistent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_backend_name() {
        let cache = InMemoryCache::new(&test_config());
        assert_eq!(cache.backend_name(), "memory");
        assert!(cache.health_check().await.is_ok());
    }
}
