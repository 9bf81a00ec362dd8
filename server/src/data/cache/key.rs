//! Type-safe cache key builder with versioning

use crate::core::constants::{CACHE_KEY_VERSION, IDEMPOTENCY_KEY_PREFIX};

/// Type-safe cache key builder
///
/// Query-result keys are prefixed with a version (e.g., "v1:") to allow
/// invalidating all cached data on schema changes. Idempotency keys live in
/// their own unversioned namespace so a version bump never replays or drops
/// an in-flight client retry.
pub struct CacheKey;

impl CacheKey {
    // =========================================================================
    // Reviews
    // =========================================================================

    /// Cache key for one page of a product's reviews
    pub fn reviews_page(product_id: i64, limit: i64, offset: i64) -> String {
        format!(
            "{}:reviews:product:{}:limit:{}:offset:{}",
            CACHE_KEY_VERSION, product_id, limit, offset
        )
    }

    /// Glob matching every cached review page of a product
    pub fn reviews_pattern(product_id: i64) -> String {
        format!("{}:reviews:product:{}:*", CACHE_KEY_VERSION, product_id)
    }

    /// Cache key for a product's average rating
    pub fn rating(product_id: i64) -> String {
        format!("{}:rating:product:{}", CACHE_KEY_VERSION, product_id)
    }

    // =========================================================================
    // Idempotency
    // =========================================================================

    /// Stored response for a client-supplied idempotency token
    ///
    /// The raw header bytes are hex-encoded, so tokens that are not valid
    /// UTF-8 still get a key of their own.
    pub fn idempotency(token: &[u8]) -> String {
        format!("{}:{}", IDEMPOTENCY_KEY_PREFIX, hex::encode(token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reviews_page_key() {
        assert_eq!(
            CacheKey::reviews_page(7, 10, 20),
            "v1:reviews:product:7:limit:10:offset:20"
        );
    }

    #[test]
    fn test_keys_are_deterministic() {
        assert_eq!(
            CacheKey::reviews_page(1, 10, 0),
            CacheKey::reviews_page(1, 10, 0)
        );
        assert_ne!(
            CacheKey::reviews_page(1, 10, 0),
            CacheKey::reviews_page(1, 10, 10)
        );
        assert_ne!(CacheKey::rating(1), CacheKey::rating(2));
    }

    #[test]
    fn test_pattern_covers_pages_of_one_product_only() {
        let pattern = CacheKey::reviews_pattern(4);
        let prefix = pattern.trim_end_matches('*');
        assert!(CacheKey::reviews_page(4, 10, 0).starts_with(prefix));
        assert!(!CacheKey::reviews_page(42, 10, 0).starts_with(prefix));
        assert!(!CacheKey::rating(4).starts_with(prefix));
    }

    #[test]
    fn test_rating_key() {
        assert_eq!(CacheKey::rating(42), "v1:rating:product:42");
    }

    #[test]
    fn test_idempotency_key_namespace() {
        assert_eq!(CacheKey::idempotency(b"abc-1"), "idempotency:6162632d31");
        assert_eq!(CacheKey::idempotency(b"caf\xe9"), "idempotency:636166e9");
        assert_ne!(
            CacheKey::idempotency(b"caf\xe9"),
            CacheKey::idempotency("café".as_bytes())
        );
    }
}
