//! Registry configuration

use std::str::FromStr;
use std::time::Duration;

/// Whether a sender receives its own items back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EchoMode {
    /// Broadcast to every registered connection, sender included
    #[default]
    All,
    /// Broadcast to every registered connection except the sender
    ExcludeSender,
}

impl FromStr for EchoMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" | "echo" => Ok(EchoMode::All),
            "exclude-sender" | "exclude_sender" | "others" => Ok(EchoMode::ExcludeSender),
            other => Err(format!("unknown echo mode: {}", other)),
        }
    }
}

/// Connection registry configuration
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Capacity of each connection's outbound queue (in frames)
    pub outbound_capacity: usize,

    /// How long a broadcast waits on one peer before evicting it
    pub write_timeout: Duration,

    /// Echo behaviour for the sender's own items
    pub echo_mode: EchoMode,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            outbound_capacity: 256,
            write_timeout: Duration::from_secs(5),
            echo_mode: EchoMode::All,
        }
    }
}

impl RegistryConfig {
    /// Set outbound queue capacity (at least 1)
    pub fn outbound_capacity(mut self, capacity: usize) -> Self {
        self.outbound_capacity = capacity.max(1);
        self
    }

    /// Set per-peer write timeout
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Set echo mode
    pub fn echo_mode(mut self, mode: EchoMode) -> Self {
        self.echo_mode = mode;
        self
    }
}
