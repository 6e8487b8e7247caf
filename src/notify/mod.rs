//! Notification sink
//!
//! The relay reports producer joins, departures and value updates to an
//! [`EventSink`]. Delivery is best-effort and fire-and-forget: publishing
//! never blocks and never fails the caller.
//!
//! [`EventHub`] is the in-process implementation. It fans events out over a
//! `tokio::sync::broadcast` channel; slow subscribers lag and skip events
//! rather than holding anyone up.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::broadcast;

/// Default number of events buffered per subscriber
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Event published by the relay core
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayEvent {
    /// A producer started streaming
    ProducerJoined {
        producer_id: String,
        timestamp: DateTime<Utc>,
    },
    /// A producer's stream ended
    ProducerLeft {
        producer_id: String,
        timestamp: DateTime<Utc>,
    },
    /// A producer recorded a new value
    ValueUpdated {
        producer_id: String,
        value: Decimal,
        timestamp: DateTime<Utc>,
        aux_label: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        range_min: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        range_max: Option<String>,
    },
}

impl RelayEvent {
    pub fn joined(producer_id: impl Into<String>) -> Self {
        RelayEvent::ProducerJoined {
            producer_id: producer_id.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn left(producer_id: impl Into<String>) -> Self {
        RelayEvent::ProducerLeft {
            producer_id: producer_id.into(),
            timestamp: Utc::now(),
        }
    }

    /// Producer the event is about
    pub fn producer_id(&self) -> &str {
        match self {
            RelayEvent::ProducerJoined { producer_id, .. }
            | RelayEvent::ProducerLeft { producer_id, .. }
            | RelayEvent::ValueUpdated { producer_id, .. } => producer_id,
        }
    }
}

/// Destination for relay events
pub trait EventSink: Send + Sync {
    /// Publish an event; must not block
    fn publish(&self, event: RelayEvent);
}

/// Sink that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn publish(&self, _event: RelayEvent) {}
}

/// Broadcast hub for relay events
pub struct EventHub {
    tx: broadcast::Sender<RelayEvent>,
    published: AtomicU64,
}

impl EventHub {
    /// Create a hub with the default per-subscriber buffer
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    /// Create a hub with a custom per-subscriber buffer
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            published: AtomicU64::new(0),
        }
    }

    /// Subscribe to events published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<RelayEvent> {
        self.tx.subscribe()
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Total events published
    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for EventHub {
    fn publish(&self, event: RelayEvent) {
        self.published.fetch_add(1, Ordering::Relaxed);
        // Err only means nobody is listening
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hub_fan_out() {
        let hub = EventHub::new();
        let mut rx1 = hub.subscribe();
        let mut rx2 = hub.subscribe();

        hub.publish(RelayEvent::joined("p1"));

        assert_eq!(rx1.recv().await.unwrap().producer_id(), "p1");
        assert_eq!(rx2.recv().await.unwrap().producer_id(), "p1");
        assert_eq!(hub.subscriber_count(), 2);
        assert_eq!(hub.published_count(), 1);
    }

    #[test]
    fn test_publish_without_subscribers() {
        let hub = EventHub::new();
        hub.publish(RelayEvent::left("p1"));
        assert_eq!(hub.published_count(), 1);
    }

    #[test]
    fn test_event_json_shape() {
        let event = RelayEvent::ValueUpdated {
            producer_id: "p1".into(),
            value: Decimal::new(25, 2),
            timestamp: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            aux_label: "sine".into(),
            range_min: None,
            range_max: Some("1".into()),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "value_updated");
        assert_eq!(json["producer_id"], "p1");
        assert_eq!(json["value"], "0.25");
        assert_eq!(json["aux_label"], "sine");
        assert_eq!(json["range_max"], "1");
        assert!(json.get("range_min").is_none());

        let json = serde_json::to_value(RelayEvent::joined("p2")).unwrap();
        assert_eq!(json["type"], "producer_joined");
    }
}
