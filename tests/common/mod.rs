//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use tokio::task::JoinHandle;

use hostd::auth::MemoryIdentityStore;
use hostd::config::DaemonConfig;
use hostd::lifecycle::{MemoryStateStore, RunSummary, StartupError};
use hostd::net::{Certificate, CertificateSource, FileCertificateSource, ListenerInfo, ListenerKind};
use hostd::resources::ResourceService;
use hostd::{Collaborators, Orchestrator, OrchestratorHandle};

pub fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

pub fn test_certificate() -> Certificate {
    FileCertificateSource::new(fixture("cert.pem"), fixture("key.pem"))
        .fetch()
        .unwrap()
}

pub fn mismatched_certificate() -> Certificate {
    FileCertificateSource::new(fixture("cert.pem"), fixture("other_key.pem"))
        .fetch()
        .unwrap()
}

/// Client for plaintext and self-signed TLS listeners. No pooling, no proxy.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .danger_accept_invalid_certs(true)
        .pool_max_idle_per_host(0)
        .no_proxy()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}

/// Minimal router for transport tests.
pub fn echo_router() -> Router {
    Router::new()
        .route("/ping", get(|| async { "pong" }))
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_millis(300)).await;
                "done"
            }),
        )
        .route(
            "/hang",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                "too late"
            }),
        )
}

/// Config on ephemeral ports with short deadlines.
pub fn test_config(work_dir: &Path) -> DaemonConfig {
    let mut config = DaemonConfig::default();
    config.daemon.work_dir = work_dir.to_path_buf();
    config.listener.http_port = 0;
    config.listener.https_port = 0;
    config.listener.internal_ip = Some("127.0.0.1".into());
    config.timeouts.listener_shutdown_secs = 1;
    config.timeouts.drain_secs = 3;
    config
}

/// Run an orchestrator in the background without the signal bridge.
pub fn spawn_daemon(
    config: DaemonConfig,
    collaborators: Collaborators,
) -> (OrchestratorHandle, JoinHandle<Result<RunSummary, StartupError>>) {
    let orchestrator = Orchestrator::new(Arc::new(config), collaborators).without_signal_bridge();
    let handle = orchestrator.handle();
    (handle, tokio::spawn(orchestrator.run()))
}

/// Loopback URL of the first listener of `kind`.
pub fn listener_url(handle: &OrchestratorHandle, kind: ListenerKind) -> String {
    let listener: ListenerInfo = handle
        .status()
        .listeners
        .into_iter()
        .find(|l| l.kind == kind)
        .expect("no listener of that kind");
    let addr = SocketAddr::from(([127, 0, 0, 1], listener.local_addr.port()));
    match kind {
        ListenerKind::Plain => format!("http://{addr}"),
        ListenerKind::Secure => format!("https://{addr}"),
    }
}

/// A daemon running in the background with handles on its collaborators.
pub struct TestDaemon {
    pub handle: OrchestratorHandle,
    pub run: JoinHandle<Result<RunSummary, StartupError>>,
    pub identities: Arc<MemoryIdentityStore>,
    pub resources: Arc<dyn ResourceService>,
    pub state: Arc<MemoryStateStore>,
    _work_dir: tempfile::TempDir,
}

impl TestDaemon {
    /// Start a daemon; `initialized` selects normal mode instead of bootstrap.
    pub fn start(initialized: bool) -> Self {
        let work_dir = tempfile::tempdir().unwrap();
        let config = test_config(work_dir.path());

        let identities = Arc::new(MemoryIdentityStore::new());
        let state = Arc::new(MemoryStateStore::new(initialized));
        let mut collaborators = Collaborators::standard(&config);
        collaborators.identities = identities.clone();
        collaborators.certificates = Arc::new(test_certificate());
        collaborators.state = state.clone();
        let resources = collaborators.resources.clone();

        let (handle, run) = spawn_daemon(config, collaborators);

        Self {
            handle,
            run,
            identities,
            resources,
            state,
            _work_dir: work_dir,
        }
    }

    pub fn url(&self, kind: ListenerKind) -> String {
        listener_url(&self.handle, kind)
    }

    pub async fn stop(self) -> RunSummary {
        self.handle.request_shutdown();
        tokio::time::timeout(Duration::from_secs(10), self.run)
            .await
            .expect("daemon did not stop")
            .unwrap()
            .unwrap()
    }
}
