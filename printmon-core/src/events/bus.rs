//! Event bus for monitor notifications
//!
//! Tokio broadcast pub/sub. Publishing with nobody listening is not an
//! error: notifications are fire-and-forget.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

use super::types::MonitorEvent;

/// Channel capacity for broadcast
const CHANNEL_CAPACITY: usize = 64;

/// Shared reference to EventBus
pub type SharedEventBus = Arc<EventBus>;

pub struct EventBus {
    sender: broadcast::Sender<MonitorEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Create a shared reference to this event bus
    pub fn shared(self) -> SharedEventBus {
        Arc::new(self)
    }

    /// Publish an event; returns how many subscribers received it.
    pub fn publish(&self, event: MonitorEvent) -> usize {
        let event_name = event.event_name();
        match self.sender.send(event) {
            Ok(count) => {
                debug!(event = event_name, receivers = count, "Event published");
                count
            }
            Err(_) => {
                debug!(event = event_name, "Event published (no receivers)");
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let bus = EventBus::new();
        assert_eq!(bus.publish(MonitorEvent::error("nobody home")), 0);
    }

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let bus = EventBus::new().shared();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        assert_eq!(bus.publish(MonitorEvent::error("disabled")), 2);

        let a = rx1.recv().await.unwrap();
        let b = rx2.recv().await.unwrap();
        assert_eq!(a, MonitorEvent::error("disabled"));
        assert_eq!(a, b);
    }
}
