//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse a configuration from TOML text without validating it.
pub fn parse_config(content: &str) -> Result<ProxyConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Load a configuration from a TOML file without validating it.
///
/// Callers that apply overrides (CLI flags) validate afterwards with
/// [`validate_config`].
pub fn read_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let config = read_config(path)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config = parse_config(
            r#"
            [listener]
            bind_address = "0.0.0.0:9000"

            [[backends]]
            address = "10.0.0.1:8080"

            [[backends]]
            address = "10.0.0.2:8080"

            [websocket]
            idle_timeout_secs = 120
            "#,
        )
        .unwrap();

        assert_eq!(config.listener.bind_address, "0.0.0.0:9000");
        assert_eq!(config.listener.worker_threads, 1);
        assert_eq!(config.backends.len(), 2);
        assert_eq!(config.backends[1].address, "10.0.0.2:8080");
        assert_eq!(config.scoring.failure_penalty, 10);
        assert_eq!(config.websocket.mount_prefix, "/_nicegui_ws");
        assert_eq!(config.websocket.idle_timeout_secs, Some(120));
    }

    #[test]
    fn empty_file_is_default_pool() {
        let config = parse_config("").unwrap();
        let addresses: Vec<_> = config.backends.iter().map(|b| b.address.as_str()).collect();
        assert_eq!(
            addresses,
            ["localhost:8080", "localhost:8081", "localhost:8082", "localhost:8083"]
        );
    }

    #[test]
    fn bad_toml_is_parse_error() {
        assert!(matches!(parse_config("[listener"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn load_rejects_invalid_file() {
        let path = std::env::temp_dir().join(format!("affinity-proxy-{}.toml", uuid::Uuid::new_v4()));
        fs::write(&path, "backends = []\n").unwrap();
        let result = load_config(&path);
        let _ = fs::remove_file(&path);
        assert!(matches!(result, Err(ConfigError::Validation(errors)) if errors == vec![ValidationError::NoBackends]));
    }

    #[test]
    fn missing_file_is_io_error() {
        let result = load_config(Path::new("/definitely/not/here.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
