//! Connection registry and broadcaster
//!
//! The registry holds every connected stream and fans inbound items out to
//! them. Each connection is represented by a [`ConnectionHandle`]: the send
//! half of a bounded outbound queue that the connection's own task drains
//! onto its socket.
//!
//! # Architecture
//!
//! ```text
//!                       Arc<ConnectionRegistry>
//!                  ┌──────────────────────────────┐
//!                  │ connections: DashMap<Id,     │
//!                  │   ConnectionHandle {         │
//!                  │     tx: mpsc::Sender<Bytes>, │
//!                  │   }                          │
//!                  │ >                            │
//!                  └──────────────┬───────────────┘
//!                                 │ point-in-time copy
//!         ┌───────────────────────┼───────────────────────┐
//!         ▼                       ▼                       ▼
//!    send_timeout()          send_timeout()          send_timeout()
//!         │                       │                       │
//!    [Session B]             [Session C]             [Session D]
//!    rx.recv() ──► TCP       rx.recv() ──► TCP       (closed: evicted)
//! ```
//!
//! # Isolation
//!
//! Writes to different peers run concurrently and each is bounded by the
//! configured write timeout, so one stalled peer delays nobody else. A peer
//! whose write fails is unregistered on the spot and its eviction signal
//! fires, which ends that peer's session even while its own socket write is
//! stuck.
//!
//! Frames are `bytes::Bytes`, so every peer shares one encoded allocation.

pub mod config;
pub mod handle;
pub mod store;

pub use config::{EchoMode, RegistryConfig};
pub use handle::{ConnectionHandle, ConnectionId};
pub use store::{BroadcastOutcome, ConnectionRegistry};
