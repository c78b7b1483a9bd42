//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate backend addresses and detect duplicates
//! - Validate value ranges (penalty > 0, threads >= 1)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;
use url::Url;

use crate::config::schema::ProxyConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("no backends configured")]
    NoBackends,
    #[error("invalid backend address `{address}`: {reason}")]
    InvalidBackend { address: String, reason: String },
    #[error("duplicate backend address `{0}`")]
    DuplicateBackend(String),
    #[error("invalid {field} `{value}`: expected ip:port")]
    InvalidSocketAddr { field: &'static str, value: String },
    #[error("listener.worker_threads must be at least 1")]
    NoWorkerThreads,
    #[error("scoring.failure_penalty must be greater than 0")]
    ZeroPenalty,
    #[error("websocket.mount_prefix `{0}` must start with `/` and not end with `/`")]
    InvalidMountPrefix(String),
    #[error("websocket.idle_timeout_secs must be greater than 0 when set")]
    ZeroIdleTimeout,
    #[error("{0} must be greater than 0")]
    ZeroTimeout(&'static str),
    #[error("affinity.cookie_name must not be empty")]
    EmptyCookieName,
}

/// Check a backend authority and return why it is unusable, if it is.
pub fn check_backend_address(address: &str) -> Result<(), String> {
    if address.contains('/') {
        return Err("expected host:port without scheme or path".to_string());
    }
    let url = Url::parse(&format!("http://{}", address)).map_err(|e| e.to_string())?;
    if url.host_str().map_or(true, str::is_empty) {
        return Err("missing host".to_string());
    }
    if url.port().is_none() {
        // `Url` drops default ports, so `host:80` is still accepted.
        if !address.ends_with(":80") {
            return Err("missing port".to_string());
        }
    }
    Ok(())
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.backends.is_empty() {
        errors.push(ValidationError::NoBackends);
    }

    let mut seen = HashSet::new();
    for backend in &config.backends {
        if let Err(reason) = check_backend_address(&backend.address) {
            errors.push(ValidationError::InvalidBackend {
                address: backend.address.clone(),
                reason,
            });
        }
        if !seen.insert(backend.address.to_ascii_lowercase()) {
            errors.push(ValidationError::DuplicateBackend(backend.address.clone()));
        }
    }

    check_socket_addr(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.observability.metrics_enabled {
        check_socket_addr(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }
    if config.admin.enabled {
        check_socket_addr(&mut errors, "admin.bind_address", &config.admin.bind_address);
    }

    if config.listener.worker_threads == 0 {
        errors.push(ValidationError::NoWorkerThreads);
    }
    if config.scoring.failure_penalty == 0 {
        errors.push(ValidationError::ZeroPenalty);
    }

    let prefix = &config.websocket.mount_prefix;
    if !prefix.starts_with('/') || prefix.ends_with('/') {
        errors.push(ValidationError::InvalidMountPrefix(prefix.clone()));
    }
    if config.websocket.idle_timeout_secs == Some(0) {
        errors.push(ValidationError::ZeroIdleTimeout);
    }
    for (field, secs) in [
        ("timeouts.connect_secs", config.timeouts.connect_secs),
        ("timeouts.upstream_secs", config.timeouts.upstream_secs),
        ("timeouts.request_secs", config.timeouts.request_secs),
    ] {
        if secs == 0 {
            errors.push(ValidationError::ZeroTimeout(field));
        }
    }
    if config.affinity.cookie_name.trim().is_empty() {
        errors.push(ValidationError::EmptyCookieName);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_socket_addr(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidSocketAddr {
            field,
            value: value.to_string(),
        });
    }
}
