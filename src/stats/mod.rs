//! Session and relay statistics

pub mod metrics;

pub use metrics::{RelayStats, RelayStatsSnapshot, SessionStats};
