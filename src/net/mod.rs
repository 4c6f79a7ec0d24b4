//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Orchestrator (router, certificate, ports)
//!     → tls.rs (rustls configuration, fatal on bad cert/key)
//!     → listener.rs (bind per address, one serve task per listener)
//!     → transport.rs (collect bind failures, concurrent shutdown)
//!     → Hand off to the shared axum router
//! ```
//!
//! # Design Decisions
//! - A failed plaintext bind degrades, it does not abort
//! - Shutdown is bounded: deadline plus a fixed grace, then abort

pub mod listener;
pub mod tls;
pub mod transport;

pub use listener::{BindError, ListenerInfo, ListenerKind};
pub use tls::{Certificate, CertificateError, CertificateSource, FileCertificateSource};
pub use transport::{
    start_plain, start_secure, ShutdownReport, TransportError, TransportHandle, TransportSettings,
};
