//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::DaemonConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
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

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<DaemonConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<DaemonConfig, ConfigError> {
    let config: DaemonConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.listener.https_port, 8443);
        assert_eq!(config.listener.http_port, 8080);
        assert!(config.listener.internal_ip.is_none());
        assert!(!config.daemon.init);
    }

    #[test]
    fn sections_override_defaults() {
        let config = parse_config(
            r#"
            [daemon]
            work_dir = "/tmp/hostd"
            init = true

            [listener]
            https_port = 9443
            http_port = 9080
            internal_ip = "127.0.0.1"

            [timeouts]
            drain_secs = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.daemon.work_dir.to_str(), Some("/tmp/hostd"));
        assert!(config.daemon.init);
        assert_eq!(config.listener.https_port, 9443);
        assert_eq!(config.listener.internal_ip.as_deref(), Some("127.0.0.1"));
        assert_eq!(config.timeouts.drain_secs, 5);
        assert_eq!(config.timeouts.listener_shutdown_secs, 10);
    }

    #[test]
    fn invalid_values_are_reported_together() {
        let err = parse_config(
            r#"
            [listener]
            https_port = 8080
            http_port = 8080
            internal_ip = "not-an-ip"
            "#,
        )
        .unwrap_err();

        match err {
            ConfigError::Validation(errors) => assert_eq!(errors.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        assert!(matches!(parse_config("[listener"), Err(ConfigError::Parse(_))));
    }
}
