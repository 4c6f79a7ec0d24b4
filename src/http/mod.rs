//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection (net::transport)
//!     → server.rs (request ID, tracing, body limit, timeout)
//!     → routing (group prefix, pattern)
//!     → middleware/capability_gate.rs (internal and external groups)
//!     → api handlers
//!     → response.rs (JSON error bodies)
//! ```

pub mod middleware;
pub mod request;
pub mod response;
pub mod server;
pub mod websocket;

pub use request::{RequestIdExt, X_REQUEST_ID};
pub use server::{build_router, ServerSettings};
