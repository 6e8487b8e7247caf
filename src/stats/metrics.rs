//! Statistics for relay sessions

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

/// Session-level statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Frames read from the stream
    pub frames_received: u64,
    /// Frames that could not be parsed as items
    pub malformed_frames: u64,
    /// Items carrying a decodable numeric payload
    pub numeric_items: u64,
    /// Numeric values rejected by the store's domain
    pub out_of_range: u64,
    /// Peers reached by this session's broadcasts (summed)
    pub deliveries: u64,
    /// Connection duration
    pub duration: Duration,
}

impl SessionStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Items that made it through parsing
    pub fn items_received(&self) -> u64 {
        self.frames_received.saturating_sub(self.malformed_frames)
    }
}

/// Relay-wide counters, shared by all sessions
#[derive(Debug, Default)]
pub struct RelayStats {
    total_connections: AtomicU64,
    items_relayed: AtomicU64,
    malformed_frames: AtomicU64,
    out_of_range: AtomicU64,
}

impl RelayStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_connection(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_relayed(&self) {
        self.items_relayed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed(&self) {
        self.malformed_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_out_of_range(&self) {
        self.out_of_range.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of the counters
    pub fn snapshot(&self) -> RelayStatsSnapshot {
        RelayStatsSnapshot {
            total_connections: self.total_connections.load(Ordering::Relaxed),
            items_relayed: self.items_relayed.load(Ordering::Relaxed),
            malformed_frames: self.malformed_frames.load(Ordering::Relaxed),
            out_of_range: self.out_of_range.load(Ordering::Relaxed),
        }
    }
}

/// Copy of [`RelayStats`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RelayStatsSnapshot {
    /// Connections accepted since startup
    pub total_connections: u64,
    /// Items broadcast since startup
    pub items_relayed: u64,
    /// Frames dropped as unparseable
    pub malformed_frames: u64,
    /// Values rejected by the store's domain
    pub out_of_range: u64,
}
