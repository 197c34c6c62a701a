//! Sentry Events - in-process publish/subscribe fan-out (C15 Event
//! Broadcaster).
//!
//! Publishers enqueue `{topic, payload, timestamp}` records; subscribers
//! register by topic prefix. Delivery order is preserved per topic;
//! delivery is best-effort — the broadcaster is not a durability layer, it
//! exists for UI and audit fan-out. Built directly on
//! `tokio::sync::broadcast`, following the same `Lagged`-tolerant receive
//! loop as a single fixed-topic event bus, generalized here so every
//! component (Approval Queue, Execution/Undo Manager, Trust Monitor, GC
//! Scheduler) can publish onto one bus under distinct topics.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::sync::Arc;
use sentry_core::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

/// Default channel capacity for the event bus.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// A single event published onto the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Dot-separated topic, e.g. `approval.created`, `trust.signal_stop`.
    pub topic: String,
    /// Arbitrary JSON payload.
    pub payload: Value,
    /// When this event was published.
    pub timestamp: Timestamp,
}

impl Event {
    /// Build a new event with the current timestamp.
    pub fn new(topic: impl Into<String>, payload: Value) -> Self {
        Self { topic: topic.into(), payload, timestamp: Timestamp::now() }
    }
}

/// Broadcasts events to all subscribers, filtered by topic prefix at the
/// receiver.
#[derive(Debug)]
pub struct EventBus {
    sender: broadcast::Sender<Arc<Event>>,
    capacity: usize,
}

impl EventBus {
    /// Create a new bus with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new bus with the given channel capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender, capacity }
    }

    /// Publish an event. Returns the number of subscribers it was
    /// delivered to (0 if none, which is a normal outcome, not an error).
    pub fn publish(&self, topic: impl Into<String>, payload: Value) -> usize {
        let event = Arc::new(Event::new(topic, payload));
        trace!(topic = %event.topic, "publishing event");
        match self.sender.send(Arc::clone(&event)) {
            Ok(count) => {
                debug!(topic = %event.topic, receivers = count, "event published");
                count
            },
            Err(_) => {
                trace!(topic = %event.topic, "no subscribers for event");
                0
            },
        }
    }

    /// Subscribe to every event whose topic starts with `prefix` (an empty
    /// prefix subscribes to everything).
    #[must_use]
    pub fn subscribe(&self, prefix: impl Into<String>) -> EventReceiver {
        EventReceiver { receiver: self.sender.subscribe(), prefix: prefix.into() }
    }

    /// Current subscriber count (across all prefixes — the broadcast
    /// channel itself is not prefix-aware).
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Channel capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self { sender: self.sender.clone(), capacity: self.capacity }
    }
}

/// A subscription to events whose topic matches a prefix.
pub struct EventReceiver {
    receiver: broadcast::Receiver<Arc<Event>>,
    prefix: String,
}

impl EventReceiver {
    /// Receive the next matching event, skipping events that don't match
    /// this subscription's prefix. Returns `None` once the bus is closed.
    pub async fn recv(&mut self) -> Option<Arc<Event>> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if event.topic.starts_with(&self.prefix) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    warn!(skipped = count, "event receiver lagged, events dropped");
                },
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking receive of the next matching event.
    pub fn try_recv(&mut self) -> Option<Arc<Event>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if event.topic.starts_with(&self.prefix) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Lagged(count)) => {
                    warn!(skipped = count, "event receiver lagged, events dropped");
                },
                Err(broadcast::error::TryRecvError::Empty | broadcast::error::TryRecvError::Closed) => {
                    return None;
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn publish_and_receive_matching_topic() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe("approval.");

        let count = bus.publish("approval.created", json!({"id": "req:1"}));
        assert_eq!(count, 1);

        let event = sub.recv().await.unwrap();
        assert_eq!(event.topic, "approval.created");
    }

    #[tokio::test]
    async fn subscriber_does_not_see_other_topics() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe("approval.");

        bus.publish("trust.signal_stop", json!({}));
        bus.publish("approval.approved", json!({"id": "req:2"}));

        let event = sub.recv().await.unwrap();
        assert_eq!(event.topic, "approval.approved");
    }

    #[tokio::test]
    async fn no_subscribers_is_not_an_error() {
        let bus = EventBus::new();
        assert_eq!(bus.publish("gc.run", json!({})), 0);
    }

    #[tokio::test]
    async fn try_recv_is_non_blocking() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe("");
        assert!(sub.try_recv().is_none());
        bus.publish("x.y", json!(1));
        assert!(sub.try_recv().is_some());
    }

    #[tokio::test]
    async fn multiple_subscribers_each_get_a_copy() {
        let bus = EventBus::new();
        let mut sub_a = bus.subscribe("");
        let mut sub_b = bus.subscribe("");
        bus.publish("x", json!(1));
        assert!(sub_a.recv().await.is_some());
        assert!(sub_b.recv().await.is_some());
    }
}
