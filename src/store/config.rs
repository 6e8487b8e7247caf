//! Store configuration

use std::time::Duration;

use crate::codec::DecimalDomain;

/// Series store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Maximum age of a retained point
    pub retention: Duration,

    /// Maximum number of points retained per series
    pub capacity: usize,

    /// Domain values must fall in to be stored
    pub domain: DecimalDomain,

    /// How often expired series are purged
    pub cleanup_interval: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            retention: Duration::from_secs(5 * 60),
            capacity: 3000,
            domain: DecimalDomain::Unbounded,
            cleanup_interval: Duration::from_secs(30),
        }
    }
}

impl StoreConfig {
    /// Set the retention window
    pub fn retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Set the per-series capacity cap (at least 1)
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Restrict stored values to a domain
    pub fn domain(mut self, domain: DecimalDomain) -> Self {
        self.domain = domain;
        self
    }

    /// Set the purge interval
    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }
}
