//! Backend abstraction.
//!
//! # Responsibilities
//! - Represent a single backend server of the static pool
//! - Build forwarding URLs for HTTP and WebSocket traffic
//!
//! Live counters (in-flight requests, failure score) are owned by the
//! registry in `pool.rs`, not by the backend itself.

use std::fmt;
use url::Url;

use crate::load_balancer::RegistryError;

/// A single backend server.
#[derive(Debug)]
pub struct Backend {
    /// Position in the pool; stable for the process lifetime.
    pub id: usize,
    /// Backend authority (`host:port`).
    pub address: String,
    /// Pre-calculated base URL for performance.
    pub base_url: Url,
}

impl Backend {
    /// Create a new backend from a `host:port` authority.
    pub fn new(id: usize, address: impl Into<String>) -> Result<Self, RegistryError> {
        let address = address.into();
        let base_url = Url::parse(&format!("http://{}", address)).map_err(|source| {
            RegistryError::InvalidAddress {
                address: address.clone(),
                source,
            }
        })?;
        Ok(Self {
            id,
            address,
            base_url,
        })
    }

    /// `http://<address><path>[?<query>]`
    pub fn http_url(&self, path: &str, query: Option<&str>) -> String {
        forward_url("http", &self.address, path, query)
    }

    /// `ws://<address><path>[?<query>]`
    pub fn ws_url(&self, path: &str, query: Option<&str>) -> String {
        forward_url("ws", &self.address, path, query)
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address)
    }
}

fn forward_url(scheme: &str, address: &str, path: &str, query: Option<&str>) -> String {
    match query {
        Some(q) if !q.is_empty() => format!("{}://{}{}?{}", scheme, address, path, q),
        _ => format!("{}://{}{}", scheme, address, path),
    }
}
