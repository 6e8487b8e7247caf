//! Session state machine
//!
//! Tracks one connection from registration to teardown.
//!
//! ```text
//!   Connecting ──► Active ──► Closing ──► Closed
//!        │                       ▲
//!        └───────────────────────┘
//! ```

use std::time::{Duration, Instant};

use crate::registry::ConnectionId;
use crate::stats::SessionStats;

/// Session lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Accepted, not yet registered
    Connecting,
    /// Registered and relaying items
    Active,
    /// Teardown in progress
    Closing,
    /// Terminal
    Closed,
}

/// Complete session state
#[derive(Debug)]
pub struct SessionState {
    /// Connection id
    pub id: ConnectionId,

    /// Remote peer label
    pub peer: String,

    /// Current phase
    pub phase: SessionPhase,

    /// Connection start time
    pub connected_at: Instant,

    /// Producer id claimed by the first numeric item
    pub producer_id: Option<String>,

    /// Per-session counters
    pub stats: SessionStats,
}

impl SessionState {
    /// Create a new session state
    pub fn new(id: ConnectionId, peer: impl Into<String>) -> Self {
        Self {
            id,
            peer: peer.into(),
            phase: SessionPhase::Connecting,
            connected_at: Instant::now(),
            producer_id: None,
            stats: SessionStats::new(),
        }
    }

    /// Connecting -> Active
    pub fn activate(&mut self) -> bool {
        if self.phase == SessionPhase::Connecting {
            self.phase = SessionPhase::Active;
            true
        } else {
            false
        }
    }

    /// Connecting | Active -> Closing
    ///
    /// Returns `false` if teardown already started.
    pub fn begin_close(&mut self) -> bool {
        match self.phase {
            SessionPhase::Connecting | SessionPhase::Active => {
                self.phase = SessionPhase::Closing;
                true
            }
            SessionPhase::Closing | SessionPhase::Closed => false,
        }
    }

    /// Closing -> Closed
    pub fn close(&mut self) {
        if self.phase == SessionPhase::Closing {
            self.phase = SessionPhase::Closed;
            self.stats.duration = self.duration();
        }
    }

    /// Record the producer id for this connection
    ///
    /// Only the first claim sticks; returns `true` if this call set it.
    pub fn claim_producer(&mut self, producer_id: &str) -> bool {
        if self.producer_id.is_some() {
            return false;
        }
        self.producer_id = Some(producer_id.to_owned());
        true
    }

    /// Check if session is active
    pub fn is_active(&self) -> bool {
        self.phase == SessionPhase::Active
    }

    /// Get session duration
    pub fn duration(&self) -> Duration {
        self.connected_at.elapsed()
    }
}
