//! Event publisher error types

use thiserror::Error;

use crate::data::cache::CacheError;

/// Error type for event publication
#[derive(Error, Debug)]
pub enum EventError {
    /// Backend missing, misconfigured or not answering
    #[error("event backend unavailable: {0}")]
    Unavailable(String),

    #[error("event encoding failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The store answered but rejected the publish
    #[error("publish failed: {0}")]
    Publish(String),
}

impl From<CacheError> for EventError {
    fn from(err: CacheError) -> Self {
        if err.is_unavailable() {
            EventError::Unavailable(err.to_string())
        } else {
            EventError::Publish(err.to_string())
        }
    }
}
