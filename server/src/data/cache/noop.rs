//! Disabled cache backend
//!
//! Selected with `database.cache = "none"`. Every read misses and every
//! write is dropped, so the service runs straight against the database.

use std::time::Duration;

use async_trait::async_trait;

use super::backend::CacheBackend;
use super::error::CacheError;

pub struct NoopCache;

#[async_trait]
impl CacheBackend for NoopCache {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(None)
    }

    async fn set(
        &self,
        _key: &str,
        _value: Vec<u8>,
        _ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        Ok(())
    }

    async fn delete(&self, _keys: &[String]) -> Result<u64, CacheError> {
        Ok(0)
    }

    async fn scan(
        &self,
        _pattern: &str,
        _cursor: u64,
        _count: usize,
    ) -> Result<(u64, Vec<String>), CacheError> {
        Ok((0, Vec::new()))
    }

    async fn ttl(&self, _key: &str) -> Result<Option<Duration>, CacheError> {
        Ok(None)
    }

    async fn health_check(&self) -> Result<(), CacheError> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "none"
    }
}
