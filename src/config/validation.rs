//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, ports distinct)
//! - Validate addresses parse before any listener is built
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: DaemonConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::{IpAddr, SocketAddr};

use thiserror::Error;

use crate::config::schema::DaemonConfig;

/// A single semantic problem found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.https_port and listener.http_port must differ (both {0})")]
    PortConflict(u16),

    #[error("listener.internal_ip '{0}' is not an IP address")]
    InvalidInternalIp(String),

    #[error("observability.metrics_address '{0}' is not a socket address")]
    InvalidMetricsAddress(String),

    #[error("daemon.work_dir must not be empty")]
    EmptyWorkDir,

    #[error("timeouts.{0} must be greater than zero")]
    ZeroTimeout(&'static str),
}

/// Check a parsed configuration for semantic errors.
pub fn validate_config(config: &DaemonConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let listener = &config.listener;
    // Port 0 asks the OS for an ephemeral port, so two zeros never collide.
    if listener.https_port != 0 && listener.https_port == listener.http_port {
        errors.push(ValidationError::PortConflict(listener.https_port));
    }

    if let Some(ip) = &listener.internal_ip {
        if ip.parse::<IpAddr>().is_err() {
            errors.push(ValidationError::InvalidInternalIp(ip.clone()));
        }
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if config.daemon.work_dir.as_os_str().is_empty() {
        errors.push(ValidationError::EmptyWorkDir);
    }

    let timeouts = &config.timeouts;
    for (name, value) in [
        ("listener_shutdown_secs", timeouts.listener_shutdown_secs),
        ("drain_secs", timeouts.drain_secs),
        ("bootstrap_request_secs", timeouts.bootstrap_request_secs),
    ] {
        if value == 0 {
            errors.push(ValidationError::ZeroTimeout(name));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
