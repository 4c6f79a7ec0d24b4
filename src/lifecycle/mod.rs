//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Work dir → Banner → Mode → init.rs (ordered steps) → wsmanager
//!     → Bootstrap listener (until init or signal) → Secure transport ("webserver")
//!
//! Shutdown (shutdown.rs):
//!     Signal or handle → Draining → cancel each subsystem once → bounded drain → Stopped
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → cancel the daemon's shutdown token
//! ```
//!
//! # Design Decisions
//! - Ordered startup: collaborators first, listeners last
//! - The subsystem registry is owned by the orchestrator, never global
//! - Shutdown has timeout: stragglers are aborted and reported

pub mod banner;
pub mod init;
pub mod mode;
pub mod shutdown;
pub mod signals;
pub mod startup;
pub mod state;

pub use init::{InitError, InitSequence, Initializer};
pub use mode::{DaemonState, InitSignal, OperatingMode};
pub use shutdown::{DrainReport, ShutdownTimeoutError, SubsystemRegistry};
pub use startup::{
    Collaborators, DaemonStatus, Orchestrator, OrchestratorHandle, RunSummary, StartupError,
};
pub use state::{FileStateStore, MemoryStateStore, StateStore};
