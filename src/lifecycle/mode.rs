//! Operating modes and daemon states.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

/// Which surface the daemon serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperatingMode {
    /// First run: plaintext listener with user registration and the init route.
    Bootstrap,
    /// Initialized: TLS plus local plaintext listeners, no registration.
    Normal,
}

impl fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OperatingMode::Bootstrap => "bootstrap",
            OperatingMode::Normal => "normal",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonState {
    Starting,
    BootstrapServing,
    NormalServing,
    Draining,
    Stopped,
}

impl fmt::Display for DaemonState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DaemonState::Starting => "starting",
            DaemonState::BootstrapServing => "bootstrap-serving",
            DaemonState::NormalServing => "normal-serving",
            DaemonState::Draining => "draining",
            DaemonState::Stopped => "stopped",
        })
    }
}

/// One-shot signal raised by the init route to end bootstrap.
#[derive(Debug, Clone, Default)]
pub struct InitSignal {
    token: CancellationToken,
    fired: Arc<AtomicBool>,
}

impl InitSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the switch to normal mode. Returns false if it was already requested.
    pub fn complete(&self) -> bool {
        let first = !self.fired.swap(true, Ordering::SeqCst);
        self.token.cancel();
        first
    }

    pub fn is_complete(&self) -> bool {
        self.token.is_cancelled()
    }

    pub async fn completed(&self) {
        self.token.cancelled().await
    }
}
