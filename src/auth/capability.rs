//! Capability resolution and authorization decisions.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;

use crate::auth::identity::Identity;
use crate::lifecycle::init::{InitError, Initializer};

/// Administrative capability, required to finish initialization.
pub const USER_ADMIN: &str = "UserAdmin";
/// Granted to applications that provide a resource type.
pub const RESOURCE_PROVIDER: &str = "ResourceProvider";
/// Read access to every resource on the host.
pub const RESOURCE_MANAGER: &str = "ResourceManager";

/// Opaque reference to a capability, cheap to clone into every route entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CapabilityRef(Arc<str>);

impl CapabilityRef {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CapabilityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Capability collaborator consulted by the route table and the gate.
pub trait CapabilityStore: Send + Sync {
    /// Capability bound to a route name, if any.
    fn resolve(&self, route_name: &str) -> Option<CapabilityRef>;

    /// Whether `identity` holds `capability`.
    fn authorize(&self, identity: &Identity, capability: &CapabilityRef) -> bool;
}

/// In-memory capability store.
///
/// Route bindings come from a static policy installed by [`Initializer::initialize`];
/// nothing resolves before that step has run. Administrators hold every capability,
/// other principals hold what was explicitly granted.
#[derive(Debug, Default)]
pub struct MemoryCapabilityStore {
    policy: Vec<(String, String)>,
    bindings: DashMap<String, CapabilityRef>,
    grants: DashMap<String, HashSet<CapabilityRef>>,
}

impl MemoryCapabilityStore {
    /// Create a store that binds `policy` (route name, capability name) on initialization.
    pub fn new<I, R, C>(policy: I) -> Self
    where
        I: IntoIterator<Item = (R, C)>,
        R: Into<String>,
        C: Into<String>,
    {
        Self {
            policy: policy
                .into_iter()
                .map(|(route, cap)| (route.into(), cap.into()))
                .collect(),
            ..Self::default()
        }
    }

    /// Bind a route name to a capability.
    pub fn bind(&self, route_name: &str, capability: &str) {
        self.bindings
            .insert(route_name.to_string(), CapabilityRef::new(capability));
    }

    /// Grant a capability to a principal.
    pub fn grant(&self, principal: &str, capability: &str) {
        self.grants
            .entry(principal.to_string())
            .or_default()
            .insert(CapabilityRef::new(capability));
    }

    /// Withdraw a capability from a principal.
    pub fn revoke(&self, principal: &str, capability: &str) {
        if let Some(mut caps) = self.grants.get_mut(principal) {
            caps.remove(&CapabilityRef::new(capability));
        }
    }
}

impl CapabilityStore for MemoryCapabilityStore {
    fn resolve(&self, route_name: &str) -> Option<CapabilityRef> {
        self.bindings.get(route_name).map(|c| c.value().clone())
    }

    fn authorize(&self, identity: &Identity, capability: &CapabilityRef) -> bool {
        if identity.is_admin() {
            return true;
        }
        self.grants
            .get(&identity.principal)
            .map(|caps| caps.contains(capability))
            .unwrap_or(false)
    }
}

impl Initializer for MemoryCapabilityStore {
    fn name(&self) -> &str {
        "capability store"
    }

    fn initialize(&self) -> Result<(), InitError> {
        for (route, capability) in &self.policy {
            self.bind(route, capability);
        }
        tracing::debug!(bindings = self.bindings.len(), "Capability policy installed");
        Ok(())
    }
}
