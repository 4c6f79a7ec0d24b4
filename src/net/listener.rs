//! Listener binding and per-listener serve tasks.
//!
//! # Responsibilities
//! - Bind plaintext and TLS sockets synchronously so failures surface at start
//! - Enumerate the host's local addresses for the plaintext listeners
//! - Run each listener as its own task with a graceful-shutdown handle

use std::fmt;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum_server::tls_rustls::{self, RustlsConfig};
use axum_server::Handle;
use rustls::ServerConfig;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::lifecycle::shutdown::ShutdownTimeoutError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerKind {
    Secure,
    Plain,
}

impl fmt::Display for ListenerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ListenerKind::Secure => "tls",
            ListenerKind::Plain => "plain",
        })
    }
}

/// A listener that could not be bound. Non-fatal on its own.
#[derive(Debug, Error)]
#[error("failed to bind {kind} listener on {addr}: {source}")]
pub struct BindError {
    pub kind: ListenerKind,
    pub addr: SocketAddr,
    #[source]
    pub source: io::Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerInfo {
    pub kind: ListenerKind,
    pub local_addr: SocketAddr,
}

impl fmt::Display for ListenerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.kind, self.local_addr)
    }
}

/// Bind a socket ready to hand to the serve task.
pub fn bind(kind: ListenerKind, addr: SocketAddr) -> Result<std::net::TcpListener, BindError> {
    let err = |source: io::Error| BindError { kind, addr, source };
    let listener = std::net::TcpListener::bind(addr).map_err(err)?;
    listener.set_nonblocking(true).map_err(err)?;
    Ok(listener)
}

/// Non-loopback IPv4 addresses of the host, resolved at call time.
pub fn local_addresses() -> Vec<IpAddr> {
    match if_addrs::get_if_addrs() {
        Ok(interfaces) => interfaces
            .into_iter()
            .filter(|iface| !iface.is_loopback())
            .map(|iface| iface.ip())
            .filter(IpAddr::is_ipv4)
            .collect(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to enumerate local interfaces");
            Vec::new()
        }
    }
}

/// A listener serving in its own task.
pub struct RunningListener {
    info: ListenerInfo,
    handle: Handle,
    task: JoinHandle<io::Result<()>>,
}

impl RunningListener {
    pub fn spawn_plain(listener: std::net::TcpListener, router: Router) -> io::Result<Self> {
        let local_addr = listener.local_addr()?;
        let handle = Handle::new();
        let server = axum_server::from_tcp(listener).handle(handle.clone());
        let task = tokio::spawn(async move { server.serve(router.into_make_service()).await });
        Ok(Self::started(ListenerKind::Plain, local_addr, handle, task))
    }

    pub fn spawn_secure(
        listener: std::net::TcpListener,
        router: Router,
        tls: Arc<ServerConfig>,
    ) -> io::Result<Self> {
        let local_addr = listener.local_addr()?;
        let handle = Handle::new();
        let server = tls_rustls::from_tcp_rustls(listener, RustlsConfig::from_config(tls))
            .handle(handle.clone());
        let task = tokio::spawn(async move { server.serve(router.into_make_service()).await });
        Ok(Self::started(ListenerKind::Secure, local_addr, handle, task))
    }

    fn started(
        kind: ListenerKind,
        local_addr: SocketAddr,
        handle: Handle,
        task: JoinHandle<io::Result<()>>,
    ) -> Self {
        let info = ListenerInfo { kind, local_addr };
        tracing::info!(listener = %info, "Listener started");
        Self { info, handle, task }
    }

    pub fn info(&self) -> ListenerInfo {
        self.info
    }

    /// Stop accepting, let in-flight requests finish within `deadline`, then
    /// abort whatever is left once `grace` has also elapsed.
    pub async fn stop(mut self, deadline: Duration, grace: Duration) -> Result<ListenerInfo, ShutdownTimeoutError> {
        self.handle.graceful_shutdown(Some(deadline));
        match tokio::time::timeout(deadline + grace, &mut self.task).await {
            Ok(Ok(Ok(()))) => {
                tracing::info!(listener = %self.info, "Listener stopped");
                Ok(self.info)
            }
            Ok(Ok(Err(e))) => {
                tracing::error!(listener = %self.info, error = %e, "Listener failed while serving");
                Ok(self.info)
            }
            Ok(Err(e)) => {
                tracing::error!(listener = %self.info, error = %e, "Listener task panicked");
                Ok(self.info)
            }
            Err(_) => {
                self.task.abort();
                tracing::warn!(listener = %self.info, "Listener did not drain in time, aborted");
                Err(ShutdownTimeoutError {
                    subsystem: self.info.to_string(),
                    waited: deadline + grace,
                })
            }
        }
    }
}
