//! Startup orchestration.
//!
//! # Responsibilities
//! - Prepare the work directory and pick the operating mode
//! - Initialize collaborators in dependency order
//! - Serve bootstrap until initialization completes or a signal arrives
//! - Start the secure transport as the `webserver` subsystem
//! - Drain every subsystem before returning
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal, but whatever already runs is drained
//! - Subsystems initialize in order, not concurrently
//! - Listeners start last (traffic only when ready)
//! - State is published on a watch channel so callers can follow progress

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::api::{self, ApiState, AssetSource, CAPABILITY_POLICY};
use crate::auth::{CapabilityStore, FileIdentityStore, IdentityStore, MemoryCapabilityStore};
use crate::config::DaemonConfig;
use crate::http::middleware::Gate;
use crate::http::websocket::{ConnectionManager, Notifier};
use crate::http::{build_router, ServerSettings};
use crate::lifecycle::banner;
use crate::lifecycle::init::{InitError, InitSequence, PlatformIntegration, RuntimeReady};
use crate::lifecycle::shutdown::{DrainReport, SubsystemRegistry};
use crate::lifecycle::signals;
use crate::lifecycle::state::{FileStateStore, StateStore};
use crate::lifecycle::{DaemonState, InitSignal, OperatingMode};
use crate::net::{
    self, CertificateError, CertificateSource, FileCertificateSource, ListenerInfo,
    TransportError, TransportSettings,
};
use crate::resources::{
    MemoryResourceService, ProviderRegistry, ResourceService, ResourceTypeRegistry,
};
use crate::routing::ConfigurationError;

/// Fatal failure before or while bringing the daemon up.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to prepare work directory {path}: {source}")]
    WorkDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Init(#[from] InitError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Certificate(#[from] CertificateError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("failed to persist daemon state: {0}")]
    State(#[source] io::Error),

    #[error("invalid internal address '{0}'")]
    InternalAddress(String),
}

/// Everything the orchestrator talks to.
pub struct Collaborators {
    pub capabilities: Arc<dyn CapabilityStore>,
    pub identities: Arc<dyn IdentityStore>,
    pub resources: Arc<dyn ResourceService>,
    pub certificates: Arc<dyn CertificateSource>,
    pub state: Arc<dyn StateStore>,
    pub init: InitSequence,
}

impl Collaborators {
    /// The collaborators the daemon binary runs with.
    pub fn standard(config: &DaemonConfig) -> Self {
        let capabilities = Arc::new(MemoryCapabilityStore::new(CAPABILITY_POLICY.iter().copied()));
        let identities = Arc::new(FileIdentityStore::new(&config.daemon.work_dir));
        let resources = Arc::new(MemoryResourceService::new());
        Self {
            capabilities: capabilities.clone(),
            identities: identities.clone(),
            resources: resources.clone(),
            certificates: Arc::new(FileCertificateSource::new(config.cert_path(), config.key_path())),
            state: Arc::new(FileStateStore::new(&config.daemon.work_dir)),
            init: InitSequence {
                capability_store: capabilities,
                identity_store: identities,
                platform: Arc::new(PlatformIntegration::new(config.daemon.in_container)),
                resource_types: Arc::new(ResourceTypeRegistry(resources.clone())),
                providers: Arc::new(ProviderRegistry(resources)),
                applications: Arc::new(RuntimeReady::applications()),
                tasks: Arc::new(RuntimeReady::tasks()),
            },
        }
    }
}

/// Snapshot published on every state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonStatus {
    pub state: DaemonState,
    pub mode: Option<OperatingMode>,
    pub listeners: Vec<ListenerInfo>,
}

/// Control surface usable while [`Orchestrator::run`] is in progress.
#[derive(Clone)]
pub struct OrchestratorHandle {
    shutdown: CancellationToken,
    status: watch::Receiver<DaemonStatus>,
}

impl OrchestratorHandle {
    /// Begin draining, as a signal would.
    pub fn request_shutdown(&self) {
        tracing::info!("Shutdown requested");
        self.shutdown.cancel();
    }

    pub fn status(&self) -> DaemonStatus {
        self.status.borrow().clone()
    }

    /// Wait until the daemon reaches `state`. None if it stopped first.
    pub async fn wait_for_state(&self, state: DaemonState) -> Option<DaemonStatus> {
        let mut rx = self.status.clone();
        let reached = rx
            .wait_for(|s| s.state == state || s.state == DaemonState::Stopped)
            .await
            .ok()
            .map(|s| s.clone());
        reached.filter(|s| s.state == state)
    }
}

/// How a run ended.
#[derive(Debug)]
pub struct RunSummary {
    /// Last mode the daemon served in.
    pub mode: OperatingMode,
    pub drain: DrainReport,
}

pub struct Orchestrator {
    config: Arc<DaemonConfig>,
    collaborators: Collaborators,
    registry: SubsystemRegistry,
    shutdown: CancellationToken,
    status: watch::Sender<DaemonStatus>,
    signal_bridge: bool,
}

impl Orchestrator {
    pub fn new(config: Arc<DaemonConfig>, collaborators: Collaborators) -> Self {
        let (status, _) = watch::channel(DaemonStatus {
            state: DaemonState::Starting,
            mode: None,
            listeners: Vec::new(),
        });
        Self {
            config,
            collaborators,
            registry: SubsystemRegistry::new(),
            shutdown: CancellationToken::new(),
            status,
            signal_bridge: true,
        }
    }

    /// Do not react to SIGINT/SIGTERM; shutdown only through the handle.
    pub fn without_signal_bridge(mut self) -> Self {
        self.signal_bridge = false;
        self
    }

    pub fn handle(&self) -> OrchestratorHandle {
        OrchestratorHandle {
            shutdown: self.shutdown.clone(),
            status: self.status.subscribe(),
        }
    }

    /// Run the daemon until shutdown. Every started subsystem is drained
    /// before this returns, including after a startup failure.
    pub async fn run(self) -> Result<RunSummary, StartupError> {
        let signals = self
            .signal_bridge
            .then(|| signals::install(self.shutdown.clone()));

        let outcome = self.start_and_serve().await;
        if let Err(e) = &outcome {
            tracing::error!(error = %e, "Startup failed");
        }

        self.publish(DaemonState::Draining, None);
        self.registry.broadcast();
        let drain = self.registry.drain(self.config.timeouts.drain()).await;
        self.publish(DaemonState::Stopped, Some(Vec::new()));

        if let Some(watcher) = signals {
            watcher.abort();
        }

        let mode = outcome?;
        tracing::info!(%mode, stopped = drain.completed.len(), timed_out = drain.timed_out.len(), "Shutdown complete");
        Ok(RunSummary { mode, drain })
    }

    async fn start_and_serve(&self) -> Result<OperatingMode, StartupError> {
        self.prepare_work_dir()?;

        let mode = if !self.collaborators.state.exists() || self.config.daemon.init {
            OperatingMode::Bootstrap
        } else {
            OperatingMode::Normal
        };
        banner::log_banner(&self.config, mode);

        self.collaborators.init.run()?;

        let (manager, notifier) = ConnectionManager::new();
        self.registry.spawn("wsmanager", move |token| manager.run(token));

        if mode == OperatingMode::Bootstrap && !self.bootstrap(notifier.clone()).await? {
            tracing::info!("Terminated during bootstrap");
            return Ok(OperatingMode::Bootstrap);
        }

        self.serve_normal(notifier).await?;
        Ok(OperatingMode::Normal)
    }

    fn prepare_work_dir(&self) -> Result<(), StartupError> {
        let path = &self.config.daemon.work_dir;
        let mut builder = std::fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o755);
        }
        builder.create(path).map_err(|source| StartupError::WorkDir {
            path: path.clone(),
            source,
        })?;
        tracing::debug!(work_dir = %path.display(), "Work directory ready");
        Ok(())
    }

    /// Serve the bootstrap surface. True if initialization completed,
    /// false if shutdown was requested first.
    async fn bootstrap(&self, notifier: Notifier) -> Result<bool, StartupError> {
        let init = InitSignal::new();
        let state = self.api_state(OperatingMode::Bootstrap, notifier, Some(init.clone()));
        let router = self.router(OperatingMode::Bootstrap, state, &ServerSettings::bootstrap(&self.config))?;

        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), self.config.listener.http_port);
        let transport = net::start_plain(router, addr)?;
        self.publish(DaemonState::BootstrapServing, Some(transport.listeners()));
        tracing::info!(address = %addr, "Waiting for initialization");

        let completed = tokio::select! {
            _ = init.completed() => true,
            _ = self.shutdown.cancelled() => false,
        };

        let report = transport
            .shutdown(self.config.timeouts.listener_shutdown())
            .await;
        for aborted in &report.aborted {
            tracing::warn!(error = %aborted, "Bootstrap listener aborted");
        }
        Ok(completed)
    }

    async fn serve_normal(&self, notifier: Notifier) -> Result<(), StartupError> {
        self.collaborators
            .state
            .mark_initialized()
            .map_err(StartupError::State)?;
        let certificate = self.collaborators.certificates.fetch()?;

        let state = self.api_state(OperatingMode::Normal, notifier, None);
        let router = self.router(OperatingMode::Normal, state, &ServerSettings::normal(&self.config))?;
        let settings = TransportSettings {
            external_port: self.config.listener.https_port,
            internal_port: self.config.listener.http_port,
            bind_addresses: self.bind_addresses()?,
        };
        let transport = net::start_secure(router, &certificate, &settings)?;
        let listeners = transport.listeners();

        let deadline = self.config.timeouts.listener_shutdown();
        self.registry.spawn("webserver", move |token| async move {
            token.cancelled().await;
            let report = transport.shutdown(deadline).await;
            tracing::info!(
                stopped = report.stopped.len(),
                aborted = report.aborted.len(),
                "Web server stopped"
            );
        });

        self.publish(DaemonState::NormalServing, Some(listeners));
        self.shutdown.cancelled().await;
        Ok(())
    }

    fn bind_addresses(&self) -> Result<Vec<IpAddr>, StartupError> {
        match &self.config.listener.internal_ip {
            Some(ip) => ip
                .parse()
                .map(|ip| vec![ip])
                .map_err(|_| StartupError::InternalAddress(ip.clone())),
            None => Ok(Vec::new()),
        }
    }

    fn api_state(&self, mode: OperatingMode, notifier: Notifier, init: Option<InitSignal>) -> ApiState {
        ApiState {
            identities: self.collaborators.identities.clone(),
            resources: self.collaborators.resources.clone(),
            notifier,
            assets: Arc::new(AssetSource::from_config(
                self.config.listener.static_assets.as_deref(),
            )),
            mode,
            init,
            version: self.config.version(),
        }
    }

    fn router(
        &self,
        mode: OperatingMode,
        state: ApiState,
        settings: &ServerSettings,
    ) -> Result<axum::Router, ConfigurationError> {
        let capabilities = self.collaborators.capabilities.clone();
        let table = api::route_table(mode, capabilities.clone())?;
        let gate = Gate::new(self.collaborators.identities.clone(), capabilities);
        Ok(build_router(table, &gate, state, settings))
    }

    fn publish(&self, state: DaemonState, listeners: Option<Vec<ListenerInfo>>) {
        self.status.send_modify(|status| {
            status.state = state;
            match state {
                DaemonState::BootstrapServing => status.mode = Some(OperatingMode::Bootstrap),
                DaemonState::NormalServing => status.mode = Some(OperatingMode::Normal),
                _ => {}
            }
            if let Some(listeners) = listeners {
                status.listeners = listeners;
            }
        });
        tracing::info!(%state, "Daemon state changed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::init::Initializer;
    use crate::lifecycle::state::MemoryStateStore;

    struct Failing;

    impl Initializer for Failing {
        fn name(&self) -> &str {
            "task runtime"
        }

        fn initialize(&self) -> Result<(), InitError> {
            Err(InitError::new(self.name(), "scheduler unavailable"))
        }
    }

    fn config(work_dir: &std::path::Path) -> DaemonConfig {
        let mut config = DaemonConfig::default();
        config.daemon.work_dir = work_dir.to_path_buf();
        config.listener.http_port = 0;
        config.listener.https_port = 0;
        config.listener.internal_ip = Some("127.0.0.1".into());
        config.timeouts.listener_shutdown_secs = 1;
        config.timeouts.drain_secs = 2;
        config
    }

    #[tokio::test]
    async fn init_failure_is_fatal_and_drains() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let mut collaborators = Collaborators::standard(&config);
        collaborators.state = Arc::new(MemoryStateStore::new(true));
        collaborators.init.tasks = Arc::new(Failing);

        let orchestrator = Orchestrator::new(Arc::new(config), collaborators).without_signal_bridge();
        let handle = orchestrator.handle();
        let err = orchestrator.run().await.unwrap_err();

        assert!(matches!(err, StartupError::Init(_)));
        assert_eq!(handle.status().state, DaemonState::Stopped);
    }

    #[tokio::test]
    async fn shutdown_during_bootstrap_skips_normal() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir.path().join("nested/work"));
        let state = Arc::new(MemoryStateStore::new(false));
        let mut collaborators = Collaborators::standard(&config);
        collaborators.state = state.clone();

        let orchestrator = Orchestrator::new(Arc::new(config), collaborators).without_signal_bridge();
        let handle = orchestrator.handle();
        let run = tokio::spawn(orchestrator.run());

        let status = handle
            .wait_for_state(DaemonState::BootstrapServing)
            .await
            .unwrap();
        assert_eq!(status.listeners.len(), 1);
        assert!(dir.path().join("nested/work").is_dir());

        handle.request_shutdown();
        let summary = run.await.unwrap().unwrap();
        assert_eq!(summary.mode, OperatingMode::Bootstrap);
        assert_eq!(summary.drain.completed, vec!["wsmanager".to_string()]);
        assert!(!state.exists());
    }
}
