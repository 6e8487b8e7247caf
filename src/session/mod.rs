//! Per-connection session handling
//!
//! A [`Session`] owns one connection from registration to teardown. It
//! registers with the connection registry, sends a welcome item, then relays
//! every inbound item into the presence tracker, the series store and the
//! broadcaster until the stream ends in either direction.
//!
//! Teardown (unregister, presence departure, `ProducerLeft`) runs exactly
//! once, from `Drop`, so it also happens when the session task is aborted.

pub mod handler;
pub mod state;

pub use handler::{CloseReason, Session};
pub use state::{SessionPhase, SessionState};
