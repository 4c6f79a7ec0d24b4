//! Subsystem registry and shutdown coordination.
//!
//! Every long-running part of the daemon (connection manager, web server)
//! is spawned through the registry, which hands it a dedicated cancellation
//! token. Draining cancels every token once and waits for the tasks with a
//! single overall timeout.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use futures_util::future::join_all;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A subsystem or listener that was still running when its deadline passed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{subsystem} did not stop within {waited:?}")]
pub struct ShutdownTimeoutError {
    pub subsystem: String,
    pub waited: Duration,
}

struct Subsystem {
    name: String,
    token: CancellationToken,
    task: JoinHandle<()>,
}

/// Outcome of [`SubsystemRegistry::drain`].
#[derive(Debug, Default)]
pub struct DrainReport {
    pub completed: Vec<String>,
    pub timed_out: Vec<ShutdownTimeoutError>,
}

/// Running subsystems, owned by the orchestrator.
#[derive(Default)]
pub struct SubsystemRegistry {
    subsystems: Mutex<Vec<Subsystem>>,
    broadcast: AtomicBool,
}

impl SubsystemRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `run` with its own cancellation token.
    pub fn spawn<F, Fut>(&self, name: &str, run: F)
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        // Checked under the lock: a racing broadcast either sees this token or set the flag first.
        let mut subsystems = self
            .subsystems
            .lock()
            .expect("subsystem registry mutex poisoned");
        let token = CancellationToken::new();
        if self.broadcast.load(Ordering::SeqCst) {
            token.cancel();
        }
        let task = tokio::spawn(run(token.clone()));
        tracing::debug!(subsystem = name, "Subsystem started");
        subsystems.push(Subsystem {
            name: name.to_string(),
            token,
            task,
        });
    }

    pub fn names(&self) -> Vec<String> {
        self.subsystems
            .lock()
            .expect("subsystem registry mutex poisoned")
            .iter()
            .map(|s| s.name.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.subsystems
            .lock()
            .expect("subsystem registry mutex poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cancel every subsystem. Only the first call has any effect.
    pub fn broadcast(&self) -> bool {
        if self.broadcast.swap(true, Ordering::SeqCst) {
            return false;
        }
        let subsystems = self
            .subsystems
            .lock()
            .expect("subsystem registry mutex poisoned");
        for subsystem in subsystems.iter() {
            tracing::debug!(subsystem = %subsystem.name, "Cancelling subsystem");
            subsystem.token.cancel();
        }
        true
    }

    /// Wait for every subsystem, aborting those still running after `timeout`.
    pub async fn drain(&self, timeout: Duration) -> DrainReport {
        let subsystems = std::mem::take(
            &mut *self
                .subsystems
                .lock()
                .expect("subsystem registry mutex poisoned"),
        );
        let deadline = tokio::time::Instant::now() + timeout;

        let waits = subsystems.into_iter().map(|subsystem| async move {
            let Subsystem { name, mut task, .. } = subsystem;
            match tokio::time::timeout_at(deadline, &mut task).await {
                Ok(Ok(())) => Ok(name),
                Ok(Err(e)) => {
                    tracing::error!(subsystem = %name, error = %e, "Subsystem task failed");
                    Ok(name)
                }
                Err(_) => {
                    task.abort();
                    Err(ShutdownTimeoutError {
                        subsystem: name,
                        waited: timeout,
                    })
                }
            }
        });

        let mut report = DrainReport::default();
        for result in join_all(waits).await {
            match result {
                Ok(name) => {
                    tracing::info!(subsystem = %name, "Subsystem stopped");
                    report.completed.push(name);
                }
                Err(timeout) => {
                    tracing::warn!(error = %timeout, "Subsystem did not stop in time");
                    report.timed_out.push(timeout);
                }
            }
        }
        report
    }
}
