//! Transport manager: one TLS listener plus plaintext listeners on local addresses.
//!
//! # Responsibilities
//! - Build the TLS configuration before anything is bound
//! - Bind every listener, keep going when a single bind fails
//! - Stop all listeners concurrently with one shared deadline
//!
//! # Design Decisions
//! - Binds are synchronous; serving happens in one task per listener
//! - Every listener serves a clone of the same router
//! - Zero listeners bound is the only fatal bind outcome

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use axum::Router;
use futures_util::future::join_all;
use thiserror::Error;

use crate::lifecycle::shutdown::ShutdownTimeoutError;
use crate::net::listener::{self, BindError, ListenerInfo, ListenerKind, RunningListener};
use crate::net::tls::{server_config, Certificate, CertificateError};
use crate::observability::metrics;

/// Time allowed past the graceful deadline before a listener task is aborted.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum TransportError {
    #[error(transparent)]
    Certificate(#[from] CertificateError),

    #[error("no listener could be bound ({} failed)", .0.len())]
    NoListeners(Vec<BindError>),

    #[error("listener setup failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Where the secure transport listens.
#[derive(Debug, Clone)]
pub struct TransportSettings {
    pub external_port: u16,
    pub internal_port: u16,
    /// Plaintext bind addresses; empty means every local non-loopback address.
    pub bind_addresses: Vec<IpAddr>,
}

/// Result of stopping a transport.
#[derive(Debug, Default)]
pub struct ShutdownReport {
    pub stopped: Vec<ListenerInfo>,
    pub aborted: Vec<ShutdownTimeoutError>,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.aborted.is_empty()
    }
}

/// The listeners of one running transport.
pub struct TransportHandle {
    listeners: Vec<RunningListener>,
    bind_failures: Vec<BindError>,
}

impl TransportHandle {
    pub fn listeners(&self) -> Vec<ListenerInfo> {
        self.listeners.iter().map(RunningListener::info).collect()
    }

    pub fn bind_failures(&self) -> &[BindError] {
        &self.bind_failures
    }

    /// Address of the TLS listener, if one is running.
    pub fn secure_addr(&self) -> Option<SocketAddr> {
        self.listeners
            .iter()
            .map(RunningListener::info)
            .find(|l| l.kind == ListenerKind::Secure)
            .map(|l| l.local_addr)
    }

    /// Stop every listener concurrently. Returns no later than
    /// `deadline` plus [`SHUTDOWN_GRACE`].
    pub async fn shutdown(self, deadline: Duration) -> ShutdownReport {
        tracing::info!(
            listeners = self.listeners.len(),
            deadline_ms = deadline.as_millis() as u64,
            "Stopping listeners"
        );
        let results = join_all(
            self.listeners
                .into_iter()
                .map(|l| l.stop(deadline, SHUTDOWN_GRACE)),
        )
        .await;

        let mut report = ShutdownReport::default();
        for result in results {
            match result {
                Ok(info) => report.stopped.push(info),
                Err(timeout) => report.aborted.push(timeout),
            }
        }
        report
    }
}

fn record(failures: &mut Vec<BindError>, err: BindError) {
    tracing::warn!(error = %err, "Listener bind failed");
    metrics::record_bind_failure(match err.kind {
        ListenerKind::Secure => "tls",
        ListenerKind::Plain => "plain",
    });
    failures.push(err);
}

/// Start the TLS listener and the plaintext listeners. Must be called from
/// within a tokio runtime; returns once every listener task is spawned.
pub fn start_secure(
    router: Router,
    certificate: &Certificate,
    settings: &TransportSettings,
) -> Result<TransportHandle, TransportError> {
    let tls = server_config(certificate)?;

    let addresses = if settings.bind_addresses.is_empty() {
        listener::local_addresses()
    } else {
        settings.bind_addresses.clone()
    };
    if addresses.is_empty() {
        tracing::warn!("No local addresses found, serving TLS only");
    }

    let mut listeners = Vec::with_capacity(addresses.len() + 1);
    let mut failures = Vec::new();

    for ip in addresses {
        let addr = SocketAddr::new(ip, settings.internal_port);
        match listener::bind(ListenerKind::Plain, addr) {
            Ok(socket) => listeners.push(RunningListener::spawn_plain(socket, router.clone())?),
            Err(e) => record(&mut failures, e),
        }
    }

    let tls_addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), settings.external_port);
    match listener::bind(ListenerKind::Secure, tls_addr) {
        Ok(socket) => listeners.push(RunningListener::spawn_secure(socket, router, tls)?),
        Err(e) => record(&mut failures, e),
    }

    if listeners.is_empty() {
        return Err(TransportError::NoListeners(failures));
    }

    Ok(TransportHandle {
        listeners,
        bind_failures: failures,
    })
}

/// Start a single plaintext listener. Failing to bind it is fatal.
pub fn start_plain(router: Router, addr: SocketAddr) -> Result<TransportHandle, TransportError> {
    let socket = listener::bind(ListenerKind::Plain, addr)
        .map_err(|e| TransportError::NoListeners(vec![e]))?;
    Ok(TransportHandle {
        listeners: vec![RunningListener::spawn_plain(socket, router)?],
        bind_failures: Vec::new(),
    })
}
