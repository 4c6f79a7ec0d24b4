//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the daemon.
//! All types derive Serde traits for deserialization from config files.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the daemon.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct DaemonConfig {
    /// Process-level settings (work directory, init mode).
    pub daemon: DaemonSection,

    /// Listener ports and bind addresses.
    pub listener: ListenerConfig,

    /// Location of the TLS material consumed by the secure listener.
    pub tls: TlsConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl DaemonConfig {
    /// Version of the running daemon.
    pub fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    /// Absolute path of the certificate file.
    pub fn cert_path(&self) -> PathBuf {
        self.resolve(&self.tls.cert_path)
    }

    /// Absolute path of the private key file.
    pub fn key_path(&self) -> PathBuf {
        self.resolve(&self.tls.key_path)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.daemon.work_dir.join(path)
        }
    }
}

/// Process-level settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DaemonSection {
    /// Directory holding persisted state and TLS material.
    pub work_dir: PathBuf,

    /// Force bootstrap mode even if persisted state exists.
    pub init: bool,

    /// Running inside a container (affects platform integration).
    pub in_container: bool,
}

impl Default for DaemonSection {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("/opt/hostd"),
            init: false,
            in_container: false,
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Port of the externally reachable TLS listener.
    pub https_port: u16,

    /// Port of the plaintext internal listeners (and the bootstrap listener).
    pub http_port: u16,

    /// Fixed internal bind address. Local interfaces are detected when unset.
    pub internal_ip: Option<String>,

    /// Serve UI assets from this directory instead of the embedded bundle.
    pub static_assets: Option<PathBuf>,

    /// Maximum request body size in bytes.
    pub max_body_size: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            https_port: 8443,
            http_port: 8080,
            internal_ip: None,
            static_assets: None,
            max_body_size: 1024 * 1024, // 1MB
        }
    }
}

/// TLS material locations, relative paths resolve against the work directory.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: PathBuf,

    /// Path to private key file (PEM).
    pub key_path: PathBuf,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            cert_path: PathBuf::from("tls/cert.pem"),
            key_path: PathBuf::from("tls/key.pem"),
        }
    }
}

/// Timeout configuration for lifecycle operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Graceful shutdown deadline given to every listener.
    pub listener_shutdown_secs: u64,

    /// Overall time the orchestrator waits for subsystems while draining.
    pub drain_secs: u64,

    /// Request timeout of the bootstrap listener.
    pub bootstrap_request_secs: u64,
}

impl TimeoutConfig {
    pub fn listener_shutdown(&self) -> Duration {
        Duration::from_secs(self.listener_shutdown_secs)
    }

    pub fn drain(&self) -> Duration {
        Duration::from_secs(self.drain_secs)
    }

    pub fn bootstrap_request(&self) -> Duration {
        Duration::from_secs(self.bootstrap_request_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            listener_shutdown_secs: 10,
            drain_secs: 30,
            bootstrap_request_secs: 10,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
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
