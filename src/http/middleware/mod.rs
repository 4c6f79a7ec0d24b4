//! Request middleware.

pub mod capability_gate;
pub mod metrics;

pub use capability_gate::{authorize_request, AuthorizationError, Gate, RouteGuard};
