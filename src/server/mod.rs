//! Relay server
//!
//! Accepts stream connections, runs one [`Session`](crate::session::Session)
//! per connection and optionally serves the HTTP admin surface.

pub mod admin;
pub mod config;
pub mod listener;

pub use config::ServerConfig;
pub use listener::RelayServer;
