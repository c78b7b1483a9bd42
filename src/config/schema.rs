//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the proxy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, runtime threads).
    pub listener: ListenerConfig,

    /// The static backend pool.
    pub backends: Vec<BackendConfig>,

    /// Failure score tuning.
    pub scoring: ScoringConfig,

    /// Session cookie handling.
    pub affinity: AffinityConfig,

    /// WebSocket relay settings.
    pub websocket: WebSocketConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Body size limits.
    pub limits: LimitsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Read-only status listener.
    pub admin: AdminConfig,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            backends: default_backends(),
            scoring: ScoringConfig::default(),
            affinity: AffinityConfig::default(),
            websocket: WebSocketConfig::default(),
            timeouts: TimeoutConfig::default(),
            limits: LimitsConfig::default(),
            observability: ObservabilityConfig::default(),
            admin: AdminConfig::default(),
        }
    }
}

impl ProxyConfig {
    /// Replace the backend pool with the given addresses.
    pub fn with_backends<I, S>(mut self, addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.backends = addresses
            .into_iter()
            .map(|address| BackendConfig { address: address.into() })
            .collect();
        self
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "127.0.0.1:8000").
    pub bind_address: String,

    /// Runtime worker threads. `1` runs every handler on a single thread.
    pub worker_threads: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8000".to_string(),
            worker_threads: 1,
        }
    }
}

/// A single backend in the pool.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct BackendConfig {
    /// Backend authority, `host:port` (e.g., "localhost:8080").
    pub address: String,
}

fn default_backends() -> Vec<BackendConfig> {
    (8080..=8083)
        .map(|port| BackendConfig {
            address: format!("localhost:{}", port),
        })
        .collect()
}

/// Failure score tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Added to a backend's failure score when an attempt fails.
    pub failure_penalty: u32,

    /// Subtracted from every backend's failure score after each attempt.
    pub decay_per_attempt: u32,

    /// Score 4xx responses as backend failures. When false, 4xx responses
    /// are returned to the caller without failover.
    pub client_errors_are_failures: bool,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            failure_penalty: 10,
            decay_per_attempt: 1,
            client_errors_are_failures: true,
        }
    }
}

/// Session cookie handling.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AffinityConfig {
    /// Cookie entry carrying the session identifier.
    pub cookie_name: String,
}

impl Default for AffinityConfig {
    fn default() -> Self {
        Self {
            cookie_name: "session".to_string(),
        }
    }
}

/// WebSocket relay settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WebSocketConfig {
    /// Paths under this prefix are eligible for WebSocket upgrades.
    pub mount_prefix: String,

    /// Halt a relay after this many seconds without a frame from either side.
    pub idle_timeout_secs: Option<u64>,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            mount_prefix: "/_nicegui_ws".to_string(),
            idle_timeout_secs: None,
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Backend connection establishment timeout in seconds. Also bounds the
    /// upstream WebSocket handshake.
    pub connect_secs: u64,

    /// Time allowed for a single backend attempt, body included.
    pub upstream_secs: u64,

    /// Deadline for an inbound HTTP request: body upload and every attempt.
    /// Candidates not reached before it are skipped.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            upstream_secs: 10,
            request_secs: 60,
        }
    }
}

/// Body size limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Largest inbound request body buffered for forwarding.
    pub max_request_body_bytes: usize,

    /// Largest backend response body relayed to the caller.
    pub max_response_body_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_request_body_bytes: 2 * 1024 * 1024,   // 2MB
            max_response_body_bytes: 16 * 1024 * 1024, // 16MB
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Status listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the status listener.
    pub enabled: bool,

    /// Status listener bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind_address: "127.0.0.1:8001".to_string(),
        }
    }
}
