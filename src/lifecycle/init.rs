//! Ordered subsystem initialization.
//!
//! The daemon brings its collaborators up one after another. Later steps
//! assume the registries of earlier steps exist (providers reference
//! resource types, for example), so the order is fixed by [`InitSequence`]
//! rather than left to the caller.

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

/// Failure of a single initialization step.
#[derive(Debug, Error)]
#[error("{step} initialization failed: {reason}")]
pub struct InitError {
    pub step: String,
    pub reason: String,
}

impl InitError {
    pub fn new(step: impl Into<String>, reason: impl ToString) -> Self {
        Self {
            step: step.into(),
            reason: reason.to_string(),
        }
    }
}

/// A collaborator that must be brought up before the daemon serves traffic.
pub trait Initializer: Send + Sync {
    fn name(&self) -> &str;
    fn initialize(&self) -> Result<(), InitError>;
}

/// The startup steps, run strictly in declaration order.
pub struct InitSequence {
    pub capability_store: Arc<dyn Initializer>,
    /// Loads persisted accounts.
    pub identity_store: Arc<dyn Initializer>,
    pub platform: Arc<dyn Initializer>,
    pub resource_types: Arc<dyn Initializer>,
    pub providers: Arc<dyn Initializer>,
    pub applications: Arc<dyn Initializer>,
    pub tasks: Arc<dyn Initializer>,
}

impl InitSequence {
    fn ordered(&self) -> [&Arc<dyn Initializer>; 7] {
        [
            &self.capability_store,
            &self.identity_store,
            &self.platform,
            &self.resource_types,
            &self.providers,
            &self.applications,
            &self.tasks,
        ]
    }

    /// Run every step; the first failure aborts the sequence.
    pub fn run(&self) -> Result<(), InitError> {
        for step in self.ordered() {
            step.initialize()?;
            tracing::info!(step = step.name(), "Initialized");
        }
        Ok(())
    }
}

/// Host or container platform integration.
#[derive(Debug, Clone)]
pub struct PlatformIntegration {
    in_container: bool,
}

impl PlatformIntegration {
    pub fn new(in_container: bool) -> Self {
        Self { in_container }
    }
}

impl Initializer for PlatformIntegration {
    fn name(&self) -> &str {
        "platform integration"
    }

    fn initialize(&self) -> Result<(), InitError> {
        if self.in_container && !Path::new("/.dockerenv").exists() {
            return Err(InitError::new(
                self.name(),
                "running in container mode but no container runtime marker was found",
            ));
        }
        tracing::debug!(in_container = self.in_container, "Platform detected");
        Ok(())
    }
}

/// A runtime whose only startup work is to announce itself.
#[derive(Debug, Clone)]
pub struct RuntimeReady(&'static str);

impl RuntimeReady {
    pub fn applications() -> Self {
        Self("application runtime")
    }

    pub fn tasks() -> Self {
        Self("task runtime")
    }
}

impl Initializer for RuntimeReady {
    fn name(&self) -> &str {
        self.0
    }

    fn initialize(&self) -> Result<(), InitError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
        fail: bool,
    }

    impl Initializer for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        fn initialize(&self) -> Result<(), InitError> {
            self.log.lock().unwrap().push(self.name);
            if self.fail {
                Err(InitError::new(self.name, "boom"))
            } else {
                Ok(())
            }
        }
    }

    fn sequence(log: &Arc<Mutex<Vec<&'static str>>>, failing: &str) -> InitSequence {
        let step = |name: &'static str| -> Arc<dyn Initializer> {
            Arc::new(Recorder {
                name,
                log: log.clone(),
                fail: name == failing,
            })
        };
        InitSequence {
            capability_store: step("capabilities"),
            identity_store: step("identities"),
            platform: step("platform"),
            resource_types: step("resources"),
            providers: step("providers"),
            applications: step("apps"),
            tasks: step("tasks"),
        }
    }

    #[test]
    fn steps_run_in_fixed_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        sequence(&log, "").run().unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            vec!["capabilities", "identities", "platform", "resources", "providers", "apps", "tasks"]
        );
    }

    #[test]
    fn failure_stops_later_steps() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let err = sequence(&log, "resources").run().unwrap_err();
        assert_eq!(err.step, "resources");
        assert_eq!(
            *log.lock().unwrap(),
            vec!["capabilities", "identities", "platform", "resources"]
        );
    }

    #[test]
    fn host_platform_always_initializes() {
        assert!(PlatformIntegration::new(false).initialize().is_ok());
    }
}
