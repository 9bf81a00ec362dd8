//! In-process event publisher
//!
//! Events go to a tokio broadcast channel. Subscribers that fall behind by
//! more than the channel capacity miss events; with no subscribers, events
//! are dropped.

use async_trait::async_trait;
use tokio::sync::broadcast;

use super::error::EventError;
use super::{EventPublisher, ReviewEvent};

pub struct MemoryPublisher {
    sender: broadcast::Sender<ReviewEvent>,
}

impl MemoryPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }
}

#[async_trait]
impl EventPublisher for MemoryPublisher {
    async fn publish(&self, event: &ReviewEvent) -> Result<(), EventError> {
        // send only fails when nobody is listening
        let receivers = self.sender.send(event.clone()).unwrap_or(0);
        tracing::trace!(event_type = %event.event_type, receivers, "Event broadcast");
        Ok(())
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<ReviewEvent>> {
        Some(self.sender.subscribe())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
