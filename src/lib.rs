//! hostd: network front door and lifecycle controller of a host-management daemon.

pub mod api;
pub mod auth;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod resources;
pub mod routing;

pub use config::DaemonConfig;
pub use lifecycle::{Collaborators, Orchestrator, OrchestratorHandle};
