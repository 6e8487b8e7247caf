//! Relay client implementation
//!
//! Provides the producer/consumer side of the stream protocol:
//! - [`RelayConnector`]: raw item stream to and from a relay
//! - [`Publisher`]: numeric producer that encodes values for one producer id

pub mod connector;
pub mod publisher;

pub use connector::{RelayConnector, RelayReceiver, RelaySender};
pub use publisher::{PublishEvent, Publisher};
