//! Review event publication
//!
//! After a review mutation commits, the handler publishes a `ReviewEvent`.
//! Publication is best effort: failures are logged and never retried, and
//! they never change the HTTP response.
//!
//! ## Backends
//!
//! - `none` (default) - events are dropped
//! - `memory` - in-process broadcast channel
//! - `redis` - Redis Pub/Sub, channel `{prefix}:{event_type}`

mod error;
mod memory;
mod redis;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

pub use error::EventError;
use memory::MemoryPublisher;
use redis::RedisPublisher;

use crate::core::config::{EventsBackend, EventsConfig};
use crate::core::constants::EVENTS_MEMORY_CAPACITY;

// ============================================================================
// EVENT TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "review.created")]
    ReviewCreated,
    #[serde(rename = "review.updated")]
    ReviewUpdated,
    #[serde(rename = "review.deleted")]
    ReviewDeleted,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::ReviewCreated => "review.created",
            EventType::ReviewUpdated => "review.updated",
            EventType::ReviewDeleted => "review.deleted",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn is_zero(rating: &i32) -> bool {
    *rating == 0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewEventData {
    pub review_id: String,
    pub product_id: String,
    /// Zero (and omitted on the wire) for deletes
    #[serde(default, skip_serializing_if = "is_zero")]
    pub rating: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewEvent {
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    pub data: ReviewEventData,
}

impl ReviewEvent {
    /// Build an event stamped with the current time
    pub fn new(event_type: EventType, review_id: i64, product_id: i64, rating: i32) -> Self {
        Self {
            event_type,
            timestamp: Utc::now(),
            data: ReviewEventData {
                review_id: review_id.to_string(),
                product_id: product_id.to_string(),
                rating,
            },
        }
    }
}

// ============================================================================
// PUBLISHER TRAIT
// ============================================================================

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &ReviewEvent) -> Result<(), EventError>;

    /// In-process subscription, for backends that support one
    fn subscribe(&self) -> Option<broadcast::Receiver<ReviewEvent>> {
        None
    }

    fn backend_name(&self) -> &'static str;
}

/// Publisher for `events.backend = "none"`
pub struct NoopPublisher;

#[async_trait]
impl EventPublisher for NoopPublisher {
    async fn publish(&self, _event: &ReviewEvent) -> Result<(), EventError> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "none"
    }
}

// ============================================================================
// EVENT SERVICE
// ============================================================================

/// Shared handle the HTTP handlers publish through
#[derive(Clone)]
pub struct EventService {
    publisher: Arc<dyn EventPublisher>,
}

impl EventService {
    /// Create the publisher selected by configuration
    pub async fn init(config: &EventsConfig) -> Result<Self, EventError> {
        let publisher: Arc<dyn EventPublisher> = match config.backend {
            EventsBackend::None => Arc::new(NoopPublisher),
            EventsBackend::Memory => Arc::new(MemoryPublisher::new(EVENTS_MEMORY_CAPACITY)),
            EventsBackend::Redis => {
                let url = config.redis_url.as_deref().ok_or_else(|| {
                    EventError::Unavailable("events.redis_url required for Redis backend".into())
                })?;
                Arc::new(RedisPublisher::new(url, &config.channel_prefix).await?)
            }
        };

        tracing::debug!(backend = publisher.backend_name(), "Event publisher initialized");
        Ok(Self { publisher })
    }

    pub fn from_publisher(publisher: Arc<dyn EventPublisher>) -> Self {
        Self { publisher }
    }

    /// Event publication that drops events
    pub fn disabled() -> Self {
        Self::from_publisher(Arc::new(NoopPublisher))
    }

    /// In-memory publisher, so callers can subscribe
    pub fn memory() -> Self {
        Self::from_publisher(Arc::new(MemoryPublisher::new(EVENTS_MEMORY_CAPACITY)))
    }

    pub fn backend_name(&self) -> &'static str {
        self.publisher.backend_name()
    }

    pub fn subscribe(&self) -> Option<broadcast::Receiver<ReviewEvent>> {
        self.publisher.subscribe()
    }

    /// Publish an event, logging instead of returning failures
    pub async fn publish(&self, event: ReviewEvent) {
        if let Err(e) = self.publisher.publish(&event).await {
            tracing::warn!(
                event_type = %event.event_type,
                review_id = %event.data.review_id,
                product_id = %event.data.product_id,
                error = %e,
                "Failed to publish review event"
            );
        }
    }
}
