//! Server configuration

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::codec::frame::DEFAULT_MAX_FRAME_LEN;
use crate::codec::DecimalDomain;
use crate::error::{Error, Result};
use crate::registry::{EchoMode, RegistryConfig};
use crate::store::StoreConfig;

/// Default stream listener port
pub const DEFAULT_PORT: u16 = 5000;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the stream listener binds to
    pub bind_addr: SocketAddr,

    /// Address of the HTTP admin surface (None = disabled)
    pub admin_addr: Option<SocketAddr>,

    /// Maximum concurrent connections (0 = unlimited)
    pub max_connections: usize,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,

    /// Longest accepted inbound frame in bytes
    pub max_frame_len: usize,

    /// Broadcaster settings
    pub registry: RegistryConfig,

    /// Series store settings
    pub store: StoreConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            admin_addr: None,
            max_connections: 0,
            tcp_nodelay: true,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            registry: RegistryConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Build a config from `RELAY_*` environment variables
    ///
    /// Unset variables keep their defaults; a set but unparseable variable
    /// is an error.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = var("RELAY_BIND") {
            config.bind_addr = parse("RELAY_BIND", &v)?;
        }
        if let Some(v) = var("RELAY_ADMIN_BIND") {
            config.admin_addr = Some(parse("RELAY_ADMIN_BIND", &v)?);
        }
        if let Some(v) = var("RELAY_MAX_CONNECTIONS") {
            config.max_connections = parse("RELAY_MAX_CONNECTIONS", &v)?;
        }
        if let Some(v) = var("RELAY_TCP_NODELAY") {
            config.tcp_nodelay = parse("RELAY_TCP_NODELAY", &v)?;
        }
        if let Some(v) = var("RELAY_MAX_FRAME_LEN") {
            config.max_frame_len = parse("RELAY_MAX_FRAME_LEN", &v)?;
        }

        if let Some(v) = var("RELAY_ECHO_MODE") {
            config.registry.echo_mode = parse::<EchoMode>("RELAY_ECHO_MODE", &v)?;
        }
        if let Some(v) = var("RELAY_OUTBOUND_CAPACITY") {
            config.registry.outbound_capacity = parse("RELAY_OUTBOUND_CAPACITY", &v)?;
        }
        if let Some(v) = var("RELAY_WRITE_TIMEOUT_MS") {
            config.registry.write_timeout =
                Duration::from_millis(parse("RELAY_WRITE_TIMEOUT_MS", &v)?);
        }

        if let Some(v) = var("RELAY_RETENTION_SECS") {
            config.store.retention = Duration::from_secs(parse("RELAY_RETENTION_SECS", &v)?);
        }
        if let Some(v) = var("RELAY_CAPACITY") {
            config.store.capacity = parse("RELAY_CAPACITY", &v)?;
        }
        if let Some(v) = var("RELAY_UNIT_INTERVAL") {
            if parse::<bool>("RELAY_UNIT_INTERVAL", &v)? {
                config.store.domain = DecimalDomain::UnitInterval;
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the relay cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.registry.outbound_capacity == 0 {
            return Err(Error::Config("outbound capacity must be positive".into()));
        }
        if self.store.capacity == 0 {
            return Err(Error::Config("store capacity must be positive".into()));
        }
        if self.max_frame_len == 0 {
            return Err(Error::Config("max frame length must be positive".into()));
        }
        Ok(())
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Enable the HTTP admin surface on `addr`
    pub fn admin(mut self, addr: SocketAddr) -> Self {
        self.admin_addr = Some(addr);
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set maximum inbound frame length
    pub fn max_frame_len(mut self, len: usize) -> Self {
        self.max_frame_len = len;
        self
    }

    /// Set broadcaster settings
    pub fn registry(mut self, registry: RegistryConfig) -> Self {
        self.registry = registry;
        self
    }

    /// Set store settings
    pub fn store(mut self, store: StoreConfig) -> Self {
        self.store = store;
        self
    }
}

fn parse<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| Error::Config(format!("{key}={value}: {e}")))
}
