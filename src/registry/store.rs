//! Connection registry implementation
//!
//! The central registry that tracks every connected stream and fans items
//! out to them.

use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use dashmap::DashMap;
use futures_util::future::join_all;
use tokio::sync::mpsc;

use super::config::RegistryConfig;
use super::handle::{ConnectionHandle, ConnectionId};

/// Result of one broadcast
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastOutcome {
    /// Number of peers the frame was queued to
    pub delivered: usize,
    /// Peers evicted because their write failed
    pub evicted: Vec<ConnectionId>,
}

/// Central registry for all connected streams
///
/// Membership lives in a sharded map. Broadcasting copies the membership
/// first and writes outside any map lock.
pub struct ConnectionRegistry {
    /// Map of connection id to its handle
    connections: DashMap<ConnectionId, ConnectionHandle>,

    /// Next connection id to hand out
    next_id: AtomicU64,

    /// Total peers evicted after a failed write
    evictions: AtomicU64,

    /// Configuration
    config: RegistryConfig,
}

impl ConnectionRegistry {
    /// Create a new registry with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a new registry with custom configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            connections: DashMap::new(),
            next_id: AtomicU64::new(1),
            evictions: AtomicU64::new(0),
            config,
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Allocate a fresh connection id
    pub fn next_connection_id(&self) -> ConnectionId {
        ConnectionId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Allocate an id, create its outbound queue and register it
    ///
    /// Returns the id and the receiving end the connection must drain.
    pub fn open(&self, peer: impl Into<String>) -> (ConnectionId, mpsc::Receiver<Bytes>) {
        let id = self.next_connection_id();
        let (handle, rx) = ConnectionHandle::channel(id, peer, self.config.outbound_capacity);
        self.register(handle);
        (id, rx)
    }

    /// Register a connection handle
    ///
    /// Registering an id twice replaces the earlier handle.
    pub fn register(&self, handle: ConnectionHandle) {
        let id = handle.id();
        let peer = handle.peer().to_owned();

        if self.connections.insert(id, handle).is_some() {
            tracing::warn!(connection = %id, "Connection handle replaced");
        }

        tracing::info!(
            connection = %id,
            peer = %peer,
            connections = self.connections.len(),
            "Connection registered"
        );
    }

    /// Unregister a connection
    ///
    /// Idempotent: returns `false` if the id was already absent.
    pub fn unregister(&self, id: ConnectionId) -> bool {
        match self.connections.remove(&id) {
            Some((_, handle)) => {
                tracing::info!(
                    connection = %id,
                    peer = %handle.peer(),
                    connected_secs = handle.connected_at().elapsed().as_secs(),
                    connections = self.connections.len(),
                    "Connection unregistered"
                );
                true
            }
            None => false,
        }
    }

    /// Check if a connection is registered
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    /// Ids of all registered connections, ascending
    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<ConnectionId> = self.connections.iter().map(|e| *e.key()).collect();
        ids.sort_unstable();
        ids
    }

    /// Number of registered connections
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Total peers evicted since startup
    pub fn eviction_count(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Broadcast a frame to every registered connection except `exclude`
    ///
    /// Writes to different peers proceed concurrently and independently.
    /// A peer whose write fails or times out is unregistered immediately;
    /// the others are unaffected.
    pub async fn broadcast(&self, frame: Bytes, exclude: Option<ConnectionId>) -> BroadcastOutcome {
        // Point-in-time copy; no map lock is held while writing
        let targets: Vec<ConnectionHandle> = self
            .connections
            .iter()
            .filter(|entry| Some(*entry.key()) != exclude)
            .map(|entry| entry.value().clone())
            .collect();

        if targets.is_empty() {
            return BroadcastOutcome::default();
        }

        let timeout = self.config.write_timeout;
        let results = join_all(targets.iter().map(|handle| {
            let frame = frame.clone();
            async move {
                match handle.send(frame, timeout).await {
                    Ok(()) => None,
                    Err(_) => {
                        self.evict(handle);
                        Some(handle.id())
                    }
                }
            }
        }))
        .await;

        let mut outcome = BroadcastOutcome::default();
        for result in results {
            match result {
                None => outcome.delivered += 1,
                Some(id) => outcome.evicted.push(id),
            }
        }
        outcome
    }

    fn evict(&self, handle: &ConnectionHandle) {
        if self.unregister(handle.id()) {
            self.evictions.fetch_add(1, Ordering::Relaxed);
            handle.signal_evicted();
            tracing::warn!(
                connection = %handle.id(),
                peer = %handle.peer(),
                "Evicted connection after failed write"
            );
        }
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
