//! Identity and capability collaborators.
//!
//! # Data Flow
//! ```text
//! Route registration (startup):
//!     route name → capability.rs (resolve) → CapabilityRef bound into the route entry
//!
//! Request (runtime):
//!     credential header → identity.rs (session / internal token lookup) → Identity
//!     (Identity, CapabilityRef) → capability.rs (authorize) → allow | deny
//! ```
//!
//! # Design Decisions
//! - Both collaborators are traits; capabilities are in memory, accounts persist in the work directory
//! - Enforcement lives in `http::middleware::capability_gate`, not here

pub mod capability;
pub mod identity;

pub use capability::{CapabilityRef, CapabilityStore, MemoryCapabilityStore};
pub use identity::{
    FileIdentityStore, Identity, IdentityError, IdentityKind, IdentityStore, MemoryIdentityStore,
};
