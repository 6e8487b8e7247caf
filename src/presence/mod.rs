//! Producer presence tracking
//!
//! Presence is derived from stream lifecycle alone: a producer is present
//! from the first numeric item seen on a connection until that connection's
//! stream ends. The tracker only reports transitions; publishing join/leave
//! notifications is the session's job.
//!
//! When two connections claim the same producer id, the most recent claim
//! owns the entry. Only the owning connection's departure removes it.

pub mod tracker;

pub use tracker::{PresenceEntry, PresenceTracker};
