//! Relay core
//!
//! Bundles the shared state every session works against: the connection
//! registry, the presence tracker, the series store and the event sink.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::codec::StreamItem;
use crate::notify::{EventSink, NullSink, RelayEvent};
use crate::presence::PresenceTracker;
use crate::registry::{ConnectionRegistry, RegistryConfig};
use crate::stats::RelayStats;
use crate::store::{DataPoint, SeriesStore, StoreConfig};

/// Health status reported to operators
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthStatus {
    /// Always "healthy" while the process answers
    pub status: String,
    /// Identifier of this relay instance
    pub server_instance_id: String,
    /// Time of the check (unix seconds)
    pub timestamp_unix_seconds: i64,
    /// Currently registered connections
    pub connected_peer_count: usize,
}

/// Shared relay state
pub struct Relay {
    instance_id: String,
    registry: ConnectionRegistry,
    presence: PresenceTracker,
    store: Arc<SeriesStore>,
    sink: Arc<dyn EventSink>,
    stats: RelayStats,
}

impl Relay {
    /// Create a relay with default configuration and no event sink
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default(), StoreConfig::default(), Arc::new(NullSink))
    }

    /// Create a relay with custom configuration and event sink
    pub fn with_config(
        registry_config: RegistryConfig,
        store_config: StoreConfig,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let instance_id = instance_id();
        tracing::info!(instance = %instance_id, "Relay created");

        Self {
            instance_id,
            registry: ConnectionRegistry::with_config(registry_config),
            presence: PresenceTracker::new(),
            store: Arc::new(SeriesStore::with_config(store_config)),
            sink,
            stats: RelayStats::new(),
        }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn presence(&self) -> &PresenceTracker {
        &self.presence
    }

    pub fn store(&self) -> &SeriesStore {
        &self.store
    }

    pub fn stats(&self) -> &RelayStats {
        &self.stats
    }

    /// Start the periodic purge of expired series
    pub fn spawn_cleanup_task(&self) -> tokio::task::JoinHandle<()> {
        self.store.spawn_cleanup_task()
    }

    /// Publish an event to the configured sink
    pub fn publish(&self, event: RelayEvent) {
        self.sink.publish(event);
    }

    /// Current health
    pub fn health(&self) -> HealthStatus {
        let status = HealthStatus {
            status: "healthy".to_string(),
            server_instance_id: self.instance_id.clone(),
            timestamp_unix_seconds: Utc::now().timestamp(),
            connected_peer_count: self.registry.len(),
        };

        tracing::debug!(
            connections = status.connected_peer_count,
            producers = self.presence.len(),
            "Health check"
        );

        status
    }

    /// Latest value of every producer
    pub fn latest_snapshot(&self) -> HashMap<String, Decimal> {
        self.store.latest_snapshot()
    }

    /// Windowed history of every producer
    pub fn history_snapshot(&self) -> HashMap<String, Vec<DataPoint>> {
        self.store.history_snapshot()
    }

    /// Item sent to a connection before anything else
    pub fn welcome_item(&self) -> StreamItem {
        StreamItem::system(format!(
            "Welcome to the relay! Server ID: {}. Connected clients: {}",
            self.instance_id,
            self.registry.len()
        ))
    }
}

impl Default for Relay {
    fn default() -> Self {
        Self::new()
    }
}

fn instance_id() -> String {
    let host = std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.trim().is_empty())
        .unwrap_or_else(|| "relay".to_string());
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}_{}", host, &suffix[..8])
}
