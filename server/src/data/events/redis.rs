//! Redis Pub/Sub event publisher
//!
//! Each event is JSON-encoded and sent with `PUBLISH` to
//! `{channel_prefix}:{event_type}`, e.g. `reviewhub:events:review.created`.
//! Delivery is at-most-once: subscribers that are not connected miss it.
//! The publish shares the cache's command deadline, so a stalled server
//! delays a mutation response by at most that long.

use async_trait::async_trait;
use deadpool_redis::redis::cmd;

use super::error::EventError;
use super::{EventPublisher, ReviewEvent};
use crate::core::constants::REDIS_EVENTS_POOL_SIZE;
use crate::data::cache::RedisStore;

pub struct RedisPublisher {
    store: RedisStore,
    channel_prefix: String,
}

impl RedisPublisher {
    pub async fn new(redis_url: &str, channel_prefix: &str) -> Result<Self, EventError> {
        let store = RedisStore::connect(redis_url, REDIS_EVENTS_POOL_SIZE).await?;
        Ok(Self::from_store(store, channel_prefix))
    }

    pub fn from_store(store: RedisStore, channel_prefix: &str) -> Self {
        tracing::debug!(channel_prefix, "Redis event publisher ready");
        Self {
            store,
            channel_prefix: channel_prefix.to_string(),
        }
    }
}

fn channel_name(prefix: &str, event: &ReviewEvent) -> String {
    format!("{}:{}", prefix, event.event_type)
}

#[async_trait]
impl EventPublisher for RedisPublisher {
    async fn publish(&self, event: &ReviewEvent) -> Result<(), EventError> {
        let payload = serde_json::to_vec(event)?;
        let channel = channel_name(&self.channel_prefix, event);

        let receivers = self
            .store
            .run("PUBLISH", |mut conn| {
                let channel = channel.clone();
                async move {
                    cmd("PUBLISH")
                        .arg(channel)
                        .arg(payload)
                        .query_async::<i64>(&mut conn)
                        .await
                }
            })
            .await?;

        tracing::trace!(%channel, receivers, "Event published");
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
