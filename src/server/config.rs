//! Server configuration

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Default port for the telemetry server
pub const DEFAULT_PORT: u16 = 5050;

/// Server configuration options
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Maximum concurrent connections (0 = unlimited)
    pub max_connections: usize,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,

    /// Shared secret expected as `Authorization: Bearer <token>`
    pub auth_token: Option<String>,

    /// Directory served for paths outside `/api` and the WebSocket path
    pub static_dir: Option<PathBuf>,

    /// Path accepting WebSocket upgrades
    pub ws_path: String,

    /// Outbound envelopes buffered per streaming client
    pub client_queue_capacity: usize,

    /// Page size used when a request gives no usable `limit`
    pub default_page_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT)),
            max_connections: 0, // Unlimited
            tcp_nodelay: true,
            auth_token: None,
            static_dir: None,
            ws_path: "/ws".to_owned(),
            client_queue_capacity: 256,
            default_page_limit: 100,
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

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    pub fn tcp_nodelay(mut self, enabled: bool) -> Self {
        self.tcp_nodelay = enabled;
        self
    }

    /// Require a bearer token on every request except the WebSocket upgrade
    pub fn auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Serve static assets from `dir`
    pub fn static_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.static_dir = Some(dir.into());
        self
    }

    /// Set the WebSocket upgrade path
    pub fn ws_path(mut self, path: impl Into<String>) -> Self {
        self.ws_path = path.into();
        self
    }

    /// Set the per-client outbound queue size (minimum 1)
    pub fn client_queue_capacity(mut self, capacity: usize) -> Self {
        self.client_queue_capacity = capacity.max(1);
        self
    }

    pub fn default_page_limit(mut self, limit: usize) -> Self {
        self.default_page_limit = limit;
        self
    }

    /// The configured token, if any non-empty one is set
    pub(crate) fn bearer_token(&self) -> Option<&str> {
        self.auth_token.as_deref().filter(|t| !t.is_empty())
    }

    /// Check values that the builders cannot enforce (deserialized configs)
    pub fn validate(&self) -> Result<()> {
        if !self.ws_path.starts_with('/') {
            return Err(Error::InvalidConfig(format!(
                "ws_path must start with '/', got {:?}",
                self.ws_path
            )));
        }
        if self.ws_path.starts_with("/api/") || self.ws_path == "/api" {
            return Err(Error::InvalidConfig(
                "ws_path must not live under /api".to_owned(),
            ));
        }
        if self.client_queue_capacity == 0 {
            return Err(Error::InvalidConfig(
                "client_queue_capacity must be at least 1".to_owned(),
            ));
        }
        Ok(())
    }
}
