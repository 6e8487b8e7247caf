//! Presence tracker implementation

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::registry::ConnectionId;

/// Presence state of one producer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceEntry {
    /// Connection currently owning the producer id
    pub connection_id: ConnectionId,
    /// When the producer became present
    pub joined_at: DateTime<Utc>,
}

/// Set of currently streaming producers
///
/// Backed by a sharded map; test-and-set and removal are atomic per key.
#[derive(Debug, Default)]
pub struct PresenceTracker {
    producers: DashMap<String, PresenceEntry>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the first numeric item of `producer_id` on `connection_id`
    ///
    /// Returns `true` only on the absent to present transition. If the id is
    /// already present, ownership moves to `connection_id` and `false` is
    /// returned.
    pub fn observe_first_message(&self, producer_id: &str, connection_id: ConnectionId) -> bool {
        match self.producers.entry(producer_id.to_owned()) {
            Entry::Vacant(vacant) => {
                vacant.insert(PresenceEntry {
                    connection_id,
                    joined_at: Utc::now(),
                });
                true
            }
            Entry::Occupied(mut occupied) => {
                if occupied.get().connection_id != connection_id {
                    tracing::debug!(
                        producer = %producer_id,
                        previous = %occupied.get().connection_id,
                        current = %connection_id,
                        "Producer id claimed by another connection"
                    );
                    occupied.get_mut().connection_id = connection_id;
                }
                false
            }
        }
    }

    /// Record that `connection_id` stopped streaming as `producer_id`
    ///
    /// Returns `true` only if the id was present and owned by this
    /// connection.
    pub fn mark_departed(&self, producer_id: &str, connection_id: ConnectionId) -> bool {
        self.producers
            .remove_if(producer_id, |_, entry| entry.connection_id == connection_id)
            .is_some()
    }

    /// Check whether a producer is currently present
    pub fn is_present(&self, producer_id: &str) -> bool {
        self.producers.contains_key(producer_id)
    }

    /// Presence entry of one producer
    pub fn get(&self, producer_id: &str) -> Option<PresenceEntry> {
        self.producers.get(producer_id).map(|entry| entry.clone())
    }

    /// Ids of all present producers
    pub fn producers(&self) -> Vec<String> {
        self.producers.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.producers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.producers.is_empty()
    }
}
