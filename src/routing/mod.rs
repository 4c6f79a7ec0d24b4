//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route Registration (at startup):
//!     Route[] per group (auth, internal, external, static)
//!     → router.rs (name uniqueness, ambiguity checks)
//!     → capability collaborator (resolve once, bind inline)
//!     → matcher.rs (parse path templates)
//!     → Freeze as immutable RouteTable → axum::Router
//!
//! Incoming Request:
//!     group prefix → route pattern → capability gate (internal/external only) → handler
//! ```
//!
//! # Design Decisions
//! - Routes registered at startup, immutable at runtime
//! - Route names are unique across the whole table
//! - No route relies on match order: overlapping patterns are rejected

pub mod matcher;
pub mod route;
pub mod router;

pub use matcher::{PathPattern, PatternError};
pub use route::{CredentialSource, Route, RouteGroup, RouteMethod};
pub use router::{ConfigurationError, RouteEntry, RouteTable};
