//! The daemon's HTTP API.
//!
//! # Route Groups
//! ```text
//! /api/v1/auth   login (+ register while bootstrapping)       no credentials
//! /api/v1/i      resources, providers, event socket           X-Internal-Token
//! /api/v1/e      info, all resources, init, event socket       Authorization: Bearer
//! /              UI entry point and static assets              no credentials
//! ```
//!
//! Which routes exist depends on the [`OperatingMode`]; the table is built
//! once per mode and never changes while a listener serves it.

pub mod assets;
pub mod auth;
pub mod error;
mod events;
pub mod external;
pub mod internal;

use std::sync::Arc;

pub use assets::AssetSource;
pub use error::HandlerError;

use crate::auth::capability::{RESOURCE_MANAGER, RESOURCE_PROVIDER, USER_ADMIN};
use crate::auth::{CapabilityStore, IdentityStore};
use crate::http::websocket::Notifier;
use crate::lifecycle::{InitSignal, OperatingMode};
use crate::resources::ResourceService;
use crate::routing::{ConfigurationError, RouteGroup, RouteTable};

/// Route name → capability bindings installed by the capability store.
pub const CAPABILITY_POLICY: &[(&str, &str)] = &[
    ("getProviderResources", RESOURCE_PROVIDER),
    ("registerResourceProvider", RESOURCE_PROVIDER),
    ("deregisterResourceProvider", RESOURCE_PROVIDER),
    ("getAllResources", RESOURCE_MANAGER),
    ("initDaemon", USER_ADMIN),
];

/// State shared by every handler.
#[derive(Clone)]
pub struct ApiState {
    pub identities: Arc<dyn IdentityStore>,
    pub resources: Arc<dyn ResourceService>,
    pub notifier: Notifier,
    pub assets: Arc<AssetSource>,
    pub mode: OperatingMode,
    /// Present only while bootstrapping.
    pub init: Option<InitSignal>,
    pub version: &'static str,
}

/// Build the route table for `mode`.
pub fn route_table(
    mode: OperatingMode,
    capabilities: Arc<dyn CapabilityStore>,
) -> Result<RouteTable<ApiState>, ConfigurationError> {
    let mut table = RouteTable::new(capabilities);
    table.register(RouteGroup::Auth, auth::routes(mode))?;
    table.register(RouteGroup::Internal, internal::routes())?;
    table.register(RouteGroup::External, external::routes(mode))?;
    table.register(RouteGroup::Static, assets::routes())?;
    tracing::debug!(%mode, routes = table.len(), "Route table built");
    Ok(table)
}
