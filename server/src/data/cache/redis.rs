//! Redis-backed cache store using deadpool-redis
//!
//! `RedisStore` is the connection the cache backend and the event publisher
//! share. Every command, including the pool checkout, runs under a single
//! deadline so a server that accepts connections but stops answering turns
//! into `CacheError::Timeout` instead of a hung request.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::redis::{RedisError, cmd};
use deadpool_redis::{Config, Connection, Pool, PoolConfig, Runtime, Timeouts};

use super::backend::CacheBackend;
use super::error::CacheError;
use crate::core::constants::{REDIS_COMMAND_TIMEOUT_MS, REDIS_POOL_TIMEOUT_SECS};

/// Pooled Redis connection with a per-command deadline
#[derive(Clone)]
pub struct RedisStore {
    pool: Pool,
    command_timeout: Duration,
}

impl RedisStore {
    /// Connect with the default command deadline
    pub async fn connect(redis_url: &str, max_size: usize) -> Result<Self, CacheError> {
        Self::connect_with_timeout(
            redis_url,
            max_size,
            Duration::from_millis(REDIS_COMMAND_TIMEOUT_MS),
        )
        .await
    }

    /// Build the pool and PING once so a bad URL fails at startup
    pub async fn connect_with_timeout(
        redis_url: &str,
        max_size: usize,
        command_timeout: Duration,
    ) -> Result<Self, CacheError> {
        let url = sanitize_redis_url(redis_url);
        let pool_timeout = Some(Duration::from_secs(REDIS_POOL_TIMEOUT_SECS));

        let mut config = Config::from_url(redis_url);
        config.pool = Some(PoolConfig {
            max_size,
            timeouts: Timeouts {
                wait: pool_timeout,
                create: pool_timeout,
                recycle: pool_timeout,
            },
            ..Default::default()
        });
        let pool = config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| CacheError::Connection(format!("Redis pool for {url}: {e}")))?;

        let store = Self {
            pool,
            command_timeout,
        };
        store
            .run("PING", |mut conn| async move {
                cmd("PING").query_async::<String>(&mut conn).await
            })
            .await
            .map_err(|e| CacheError::Connection(format!("{url}: {e}")))?;

        tracing::debug!(%url, timeout_ms = command_timeout.as_millis() as u64, "Redis connected");
        Ok(store)
    }

    /// Check out a connection and run one command under the deadline
    pub async fn run<T, F, Fut>(&self, op: &'static str, command: F) -> Result<T, CacheError>
    where
        F: FnOnce(Connection) -> Fut,
        Fut: Future<Output = Result<T, RedisError>>,
    {
        let attempt = async {
            let conn = self.pool.get().await?;
            Ok::<T, CacheError>(command(conn).await?)
        };

        match tokio::time::timeout(self.command_timeout, attempt).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Timeout {
                op,
                millis: self.command_timeout.as_millis() as u64,
            }),
        }
    }
}

/// Mask the password in a Redis URL before it reaches a log line
///
/// `rfind('@')` keeps passwords that themselves contain `@` hidden.
fn sanitize_redis_url(url: &str) -> String {
    let Some(at) = url.rfind('@') else {
        return url.to_string();
    };
    let scheme_end = url.find("://").map_or(0, |i| i + 3);
    match url[scheme_end..at].find(':') {
        Some(colon) => format!("{}***{}", &url[..scheme_end + colon + 1], &url[at..]),
        None => url.to_string(),
    }
}

/// Cache backend over a `RedisStore`
pub struct RedisCache {
    store: RedisStore,
}

impl RedisCache {
    pub fn new(store: RedisStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl CacheBackend for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        self.store
            .run("GET", |mut conn| async move {
                cmd("GET")
                    .arg(key)
                    .query_async::<Option<Vec<u8>>>(&mut conn)
                    .await
            })
            .await
    }

    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        self.store
            .run("SET", |mut conn| async move {
                match ttl {
                    // Milliseconds, so a sub-second TTL never rounds to "no expiry"
                    Some(ttl) => {
                        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
                        cmd("PSETEX")
                            .arg(key)
                            .arg(ttl_ms)
                            .arg(value)
                            .query_async::<()>(&mut conn)
                            .await
                    }
                    None => {
                        cmd("SET")
                            .arg(key)
                            .arg(value)
                            .query_async::<()>(&mut conn)
                            .await
                    }
                }
            })
            .await
    }

    async fn delete(&self, keys: &[String]) -> Result<u64, CacheError> {
        if keys.is_empty() {
            return Ok(0);
        }
        self.store
            .run("DEL", |mut conn| async move {
                cmd("DEL").arg(keys).query_async::<u64>(&mut conn).await
            })
            .await
    }

    async fn scan(
        &self,
        pattern: &str,
        cursor: u64,
        count: usize,
    ) -> Result<(u64, Vec<String>), CacheError> {
        self.store
            .run("SCAN", |mut conn| async move {
                cmd("SCAN")
                    .arg(cursor)
                    .arg("MATCH")
                    .arg(pattern)
                    .arg("COUNT")
                    .arg(count)
                    .query_async::<(u64, Vec<String>)>(&mut conn)
                    .await
            })
            .await
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, CacheError> {
        let ttl_ms = self
            .store
            .run("PTTL", |mut conn| async move {
                cmd("PTTL").arg(key).query_async::<i64>(&mut conn).await
            })
            .await?;

        // -2 missing key, -1 no expiry
        Ok(u64::try_from(ttl_ms)
            .ok()
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis))
    }

    async fn health_check(&self) -> Result<(), CacheError> {
        self.store
            .run("PING", |mut conn| async move {
                cmd("PING").query_async::<String>(&mut conn).await
            })
            .await
            .map(|_| ())
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
