//! Cache error types
//!
//! Callers on the request path never surface these; they are logged and the
//! operation degrades to a miss or a no-op.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache configuration error: {0}")]
    Config(String),

    #[error("Cache connection error: {0}")]
    Connection(String),

    /// The store did not answer within the command deadline
    #[error("Cache {op} timed out after {millis}ms")]
    Timeout { op: &'static str, millis: u64 },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Redis error: {0}")]
    Redis(#[from] deadpool_redis::redis::RedisError),

    #[error("Redis pool error: {0}")]
    Pool(#[from] deadpool_redis::PoolError),
}

impl CacheError {
    /// Whether the store itself is unavailable, as opposed to a bad payload
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            CacheError::Connection(_) | CacheError::Timeout { .. } | CacheError::Pool(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_display() {
        let err = CacheError::Timeout {
            op: "GET",
            millis: 250,
        };
        assert_eq!(err.to_string(), "Cache GET timed out after 250ms");
    }

    #[test]
    fn test_unavailable_classification() {
        assert!(CacheError::Connection("refused".into()).is_unavailable());
        assert!(
            CacheError::Timeout {
                op: "SCAN",
                millis: 10
            }
            .is_unavailable()
        );
        assert!(!CacheError::Serialization("bad msgpack".into()).is_unavailable());
        assert!(!CacheError::Config("redis_url required".into()).is_unavailable());
    }
}
