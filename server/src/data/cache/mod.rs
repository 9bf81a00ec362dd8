//! Cache module
//!
//! Provides caching infrastructure with pluggable backends:
//! - In-memory (default) - uses moka
//! - Redis - uses deadpool-redis
//! - None - disabled, every read misses
//!
//! `ReviewCache` sits on top and implements the cache-aside reads and coarse
//! per-product invalidation used by the review handlers. The idempotency store
//! shares the same backend under its own key namespace.

mod backend;
mod error;
mod key;
mod memory;
mod noop;
mod redis;
mod review;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

pub use backend::CacheBackend;
pub use error::CacheError;
pub use key::CacheKey;
pub use review::{RatingLookup, ReviewCache};

pub use redis::RedisStore;

use memory::InMemoryCache;
use noop::NoopCache;

use crate::core::config::{CacheBackendType, CacheConfig};
use crate::core::constants::{CACHE_SCAN_BATCH, REDIS_CACHE_POOL_SIZE};

/// Cache service providing typed access to cache backend
///
/// Wraps the underlying cache backend and provides:
/// - Raw bytes API for flexibility
/// - Typed API using MessagePack serialization
/// - Pattern deletion driven by a SCAN cursor
pub struct CacheService {
    backend: Arc<dyn CacheBackend>,
}

impl std::fmt::Debug for CacheService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheService")
            .field("backend", &self.backend.backend_name())
            .finish()
    }
}

impl CacheService {
    /// Create a new cache service from configuration
    pub async fn new(config: &CacheConfig) -> Result<Self, CacheError> {
        let backend: Arc<dyn CacheBackend> = match config.backend {
            CacheBackendType::Memory => {
                tracing::debug!(max_entries = config.max_entries, "Initializing in-memory cache");
                Arc::new(InMemoryCache::new(config))
            }
            CacheBackendType::Redis => {
                let url = config.redis_url.as_ref().ok_or_else(|| {
                    CacheError::Config("redis_url required for Redis backend".into())
                })?;
                let store = RedisStore::connect(url, REDIS_CACHE_POOL_SIZE).await?;
                Arc::new(redis::RedisCache::new(store))
            }
            CacheBackendType::None => {
                tracing::debug!("Cache disabled");
                Arc::new(NoopCache)
            }
        };

        Ok(Self { backend })
    }

    /// Wrap an already constructed backend
    pub fn from_backend(backend: Arc<dyn CacheBackend>) -> Self {
        Self { backend }
    }

    /// Get the backend name
    pub fn backend_name(&self) -> &'static str {
        self.backend.backend_name()
    }

    // =========================================================================
    // Raw bytes API
    // =========================================================================

    /// Get raw bytes from cache
    pub async fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        self.backend.get(key).await
    }

    /// Set raw bytes in cache
    pub async fn set_raw(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        self.backend.set(key, value, ttl).await
    }

    // =========================================================================
    // Typed API (serde)
    // =========================================================================

    /// Get a typed value from cache
    ///
    /// Uses MessagePack for compact, fast deserialization. A payload that no
    /// longer decodes into `T` is reported as `CacheError::Serialization`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        match self.get_raw(key).await? {
            Some(bytes) => {
                let value = rmp_serde::from_slice(&bytes)
                    .map_err(|e| CacheError::Serialization(e.to_string()))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Set a typed value in cache
    ///
    /// Uses MessagePack for compact, fast serialization.
    pub async fn set<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        let bytes =
            rmp_serde::to_vec(value).map_err(|e| CacheError::Serialization(e.to_string()))?;
        self.set_raw(key, bytes, ttl).await
    }

    // =========================================================================
    // Other operations
    // =========================================================================

    /// Delete a key from cache, returning whether it existed
    pub async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let deleted = self.backend.delete(&[key.to_string()]).await?;
        Ok(deleted > 0)
    }

    /// Delete a key from cache with automatic error logging.
    ///
    /// This is a convenience method for cache invalidation where errors
    /// should be logged but not propagated (cache misses are acceptable).
    pub async fn invalidate_key(&self, key: &str) {
        if let Err(e) = self.delete(key).await {
            tracing::warn!(key = %key, error = %e, "Cache invalidation failed");
        }
    }

    /// Delete every key matching a glob pattern
    ///
    /// Follows the backend's scan cursor until it returns to 0, asking for
    /// `CACHE_SCAN_BATCH` keys per page and deleting each page as it arrives.
    /// Redis honours the page size, so no single call blocks the store; the
    /// in-memory backend answers with every match in one page. Returns the
    /// number of keys removed.
    pub async fn delete_pattern(&self, pattern: &str) -> Result<u64, CacheError> {
        let mut cursor = 0u64;
        let mut deleted = 0u64;

        loop {
            let (next, keys) = self
                .backend
                .scan(pattern, cursor, CACHE_SCAN_BATCH)
                .await?;
            if !keys.is_empty() {
                deleted += self.backend.delete(&keys).await?;
            }
            if next == 0 {
                break;
            }
            cursor = next;
        }

        tracing::trace!(pattern, deleted, "Pattern invalidated");
        Ok(deleted)
    }

    /// Get TTL remaining for a key
    pub async fn ttl(&self, key: &str) -> Result<Option<Duration>, CacheError> {
        self.backend.ttl(key).await
    }

    /// Health check
    pub async fn health_check(&self) -> Result<(), CacheError> {
        self.backend.health_check().await
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Backends for exercising cache failure and paging paths

    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    /// Backend whose every operation fails, as an unreachable Redis would
    pub struct FailingCache;

    fn down() -> CacheError {
        CacheError::Connection("connection refused".to_string())
    }

    #[async_trait]
    impl CacheBackend for FailingCache {
        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, CacheError> {
            Err(down())
        }

        async fn set(
            &self,
            _key: &str,
            _value: Vec<u8>,
            _ttl: Option<Duration>,
        ) -> Result<(), CacheError> {
            Err(down())
        }

        async fn delete(&self, _keys: &[String]) -> Result<u64, CacheError> {
            Err(down())
        }

        async fn scan(
            &self,
            _pattern: &str,
            _cursor: u64,
            _count: usize,
        ) -> Result<(u64, Vec<String>), CacheError> {
            Err(down())
        }

        async fn ttl(&self, _key: &str) -> Result<Option<Duration>, CacheError> {
            Err(down())
        }

        async fn health_check(&self) -> Result<(), CacheError> {
            Err(down())
        }

        fn backend_name(&self) -> &'static str {
            "failing"
        }
    }

    /// Minimal RESP server that completes the connection handshake and then
    /// never answers a data command, like a wedged Redis
    pub async fn stalled_redis() -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut pending = Vec::new();
                    let mut chunk = [0u8; 4096];
                    loop {
                        let n = match socket.read(&mut chunk).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => n,
                        };
                        pending.extend_from_slice(&chunk[..n]);
                        while let Some((args, used)) = parse_resp_command(&pending) {
                            pending.drain(..used);
                            let reply = match args.first().map(|a| a.to_ascii_uppercase()) {
                                Some(name) if name == b"PING" => match args.get(1) {
                                    Some(echo) => {
                                        let mut reply = format!("${}\r\n", echo.len()).into_bytes();
                                        reply.extend_from_slice(echo);
                                        reply.extend_from_slice(b"\r\n");
                                        reply
                                    }
                                    None => b"+PONG\r\n".to_vec(),
                                },
                                Some(name) if name == b"CLIENT" || name == b"SELECT" => {
                                    b"+OK\r\n".to_vec()
                                }
                                // Everything else hangs
                                _ => continue,
                            };
                            if socket.write_all(&reply).await.is_err() {
                                return;
                            }
                        }
                    }
                });
            }
        });

        format!("redis://{addr}")
    }

    /// Split one `*N` array of bulk strings off the front of `buf`
    fn parse_resp_command(buf: &[u8]) -> Option<(Vec<Vec<u8>>, usize)> {
        fn line(buf: &[u8], from: usize) -> Option<(&[u8], usize)> {
            let end = buf[from..].windows(2).position(|w| w == b"\r\n")? + from;
            Some((&buf[from..end], end + 2))
        }

        let (header, mut pos) = line(buf, 0)?;
        let count: usize = std::str::from_utf8(header.strip_prefix(b"*")?).ok()?.parse().ok()?;
        let mut args = Vec::with_capacity(count);
        for _ in 0..count {
            let (len_line, next) = line(buf, pos)?;
            let len: usize = std::str::from_utf8(len_line.strip_prefix(b"$")?).ok()?.parse().ok()?;
            if buf.len() < next + len + 2 {
                return None;
            }
            args.push(buf[next..next + len].to_vec());
            pos = next + len + 2;
        }
        Some((args, pos))
    }

    /// Sorted key list that pages through SCAN `count` keys at a time,
    /// returning cursors the way Redis does
    #[derive(Default)]
    pub struct PagedCache {
        pub keys: Mutex<Vec<String>>,
        pub scans: Mutex<u32>,
    }

    #[async_trait]
    impl CacheBackend for PagedCache {
        async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
            let keys = self.keys.lock().unwrap();
            Ok(keys.iter().any(|k| k == key).then(|| b"x".to_vec()))
        }

        async fn set(
            &self,
            key: &str,
            _value: Vec<u8>,
            _ttl: Option<Duration>,
        ) -> Result<(), CacheError> {
            let mut keys = self.keys.lock().unwrap();
            if !keys.iter().any(|k| k == key) {
                keys.push(key.to_string());
                keys.sort();
            }
            Ok(())
        }

        async fn delete(&self, keys: &[String]) -> Result<u64, CacheError> {
            let mut stored = self.keys.lock().unwrap();
            let before = stored.len();
            stored.retain(|k| !keys.contains(k));
            Ok((before - stored.len()) as u64)
        }

        async fn scan(
            &self,
            pattern: &str,
            cursor: u64,
            count: usize,
        ) -> Result<(u64, Vec<String>), CacheError> {
            *self.scans.lock().unwrap() += 1;
            let prefix = pattern.trim_end_matches('*');
            let stored = self.keys.lock().unwrap();
            // Cursor is a position in the full sorted keyspace, like a Redis
            // hash-table slot: deletions behind it never skip later keys.
            let start = stored
                .iter()
                .position(|k| k.as_str() >= format!("{cursor:020}").as_str())
                .unwrap_or(stored.len());
            let page: Vec<String> = stored[start..].iter().take(count).cloned().collect();
            let next = stored
                .get(start + page.len())
                .and_then(|k| k.get(..20))
                .and_then(|p| p.parse::<u64>().ok())
                .unwrap_or(0);
            let matched = page.into_iter().filter(|k| k.starts_with(prefix)).collect();
            Ok((next, matched))
        }

        async fn ttl(&self, _key: &str) -> Result<Option<Duration>, CacheError> {
            Ok(None)
        }

        async fn health_check(&self) -> Result<(), CacheError> {
            Ok(())
        }

        fn backend_name(&self) -> &'static str {
            "paged"
        }
    }
}
