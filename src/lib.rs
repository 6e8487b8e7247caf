//! Real-time telemetry/chat relay
//!
//! Producers push timestamped values (or chat text) over a persistent
//! bidirectional stream. The relay fans every inbound item out to the other
//! connected streams, tracks which producers are currently streaming, and
//! keeps a bounded, time-windowed history per producer for late joiners.
//!
//! # Architecture
//!
//! ```text
//!   [Producer A]      [Consumer B]      [Consumer C]
//!        │                 ▲                 ▲
//!        ▼                 │                 │
//!   Session A ──► ConnectionRegistry::broadcast() ──► outbound queues
//!        │
//!        ├──► PresenceTracker (join / leave transitions)
//!        ├──► SeriesStore     (windowed history, latest value)
//!        └──► EventSink       (ProducerJoined / ValueUpdated / ProducerLeft)
//! ```
//!
//! # Example
//!
//! ```no_run
//! use telemetry_relay::{RelayServer, ServerConfig};
//!
//! # async fn example() -> telemetry_relay::Result<()> {
//! let server = RelayServer::new(ServerConfig::default());
//! server.run_until(async { let _ = tokio::signal::ctrl_c().await; }).await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod codec;
pub mod error;
pub mod notify;
pub mod presence;
pub mod registry;
pub mod relay;
pub mod server;
pub mod session;
pub mod stats;
pub mod store;

pub use codec::{DecimalDomain, Payload, StreamItem};
pub use error::{Error, Result};
pub use notify::{EventHub, EventSink, RelayEvent};
pub use relay::{HealthStatus, Relay};
pub use server::{RelayServer, ServerConfig};
