//! Route table: registration, capability binding and router assembly.
//!
//! # Responsibilities
//! - Store routes of all groups in registration order
//! - Reject duplicate names (process-wide) and ambiguous patterns
//! - Resolve each route's capability once, at registration
//! - Assemble the axum router with the gate layered onto guarded routes
//!
//! # Design Decisions
//! - Immutable after construction (shared without locks)
//! - Capabilities are stored inline in the entry, never looked up by name per request
//! - Literal patterns win over parameterized ones regardless of registration order

use std::sync::Arc;

use axum::http::StatusCode;
use axum::middleware::from_fn_with_state;
use axum::response::Response;
use axum::routing::{any, MethodRouter};
use axum::Router;
use thiserror::Error;

use crate::auth::{CapabilityRef, CapabilityStore};
use crate::http::middleware::{authorize_request, Gate};
use crate::http::response::error_response;
use crate::routing::matcher::{PathPattern, PatternError};
use crate::routing::route::{Route, RouteGroup, RouteMethod};

/// Fatal route-table misconfiguration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("route name '{0}' is already registered")]
    DuplicateRoute(String),

    #[error("routes '{first}' and '{second}' both answer {method} {pattern}")]
    AmbiguousRoute {
        first: String,
        second: String,
        method: RouteMethod,
        pattern: String,
    },

    #[error("route '{route}' requires capability '{capability}' which could not be resolved")]
    UnresolvedCapability { route: String, capability: String },

    #[error("route '{route}' requires capability '{declared}' but resolves to '{resolved}'")]
    CapabilityMismatch {
        route: String,
        declared: String,
        resolved: CapabilityRef,
    },

    #[error("route '{route}': {source}")]
    InvalidPattern {
        route: String,
        #[source]
        source: PatternError,
    },
}

/// A registered route with its capability bound.
pub struct RouteEntry<S> {
    pub name: String,
    pub group: RouteGroup,
    pub method: RouteMethod,
    pub pattern: PathPattern,
    pub capability: Option<CapabilityRef>,
    handler: MethodRouter<S>,
}

impl<S> RouteEntry<S> {
    /// Full request path template including the group prefix.
    pub fn full_pattern(&self) -> String {
        format!("{}{}", self.group.prefix(), self.pattern)
    }
}

/// The daemon's route table.
pub struct RouteTable<S> {
    entries: Vec<RouteEntry<S>>,
    capabilities: Arc<dyn CapabilityStore>,
}

impl<S> RouteTable<S>
where
    S: Clone + Send + Sync + 'static,
{
    pub fn new(capabilities: Arc<dyn CapabilityStore>) -> Self {
        Self {
            entries: Vec::new(),
            capabilities,
        }
    }

    /// Add `routes` to `group`.
    ///
    /// Nothing is inserted if any route of the batch is rejected.
    pub fn register(
        &mut self,
        group: RouteGroup,
        routes: Vec<Route<S>>,
    ) -> Result<(), ConfigurationError> {
        let mut staged: Vec<RouteEntry<S>> = Vec::with_capacity(routes.len());

        for route in routes {
            let pattern = PathPattern::parse(&route.pattern).map_err(|source| {
                ConfigurationError::InvalidPattern {
                    route: route.name.clone(),
                    source,
                }
            })?;

            if self
                .entries
                .iter()
                .chain(staged.iter())
                .any(|e| e.name == route.name)
            {
                return Err(ConfigurationError::DuplicateRoute(route.name));
            }

            if let Some(clash) = self.entries.iter().chain(staged.iter()).find(|e| {
                e.group == group && e.method.overlaps(&route.method) && e.pattern.overlaps(&pattern)
            }) {
                return Err(ConfigurationError::AmbiguousRoute {
                    first: clash.name.clone(),
                    second: route.name,
                    method: route.method,
                    pattern: format!("{}{}", group.prefix(), pattern),
                });
            }

            let capability = self.bind_capability(&route)?;

            staged.push(RouteEntry {
                name: route.name,
                group,
                method: route.method,
                pattern,
                capability,
                handler: route.handler,
            });
        }

        self.entries.extend(staged);
        Ok(())
    }

    fn bind_capability(&self, route: &Route<S>) -> Result<Option<CapabilityRef>, ConfigurationError> {
        let resolved = self.capabilities.resolve(&route.name);
        match (&route.required_capability, resolved) {
            (Some(declared), None) => Err(ConfigurationError::UnresolvedCapability {
                route: route.name.clone(),
                capability: declared.clone(),
            }),
            (Some(declared), Some(resolved)) if resolved.name() != declared => {
                Err(ConfigurationError::CapabilityMismatch {
                    route: route.name.clone(),
                    declared: declared.clone(),
                    resolved,
                })
            }
            (_, resolved) => Ok(resolved),
        }
    }

    pub fn entries(&self) -> &[RouteEntry<S>] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&RouteEntry<S>> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Route answering `method` on `path`. Literal patterns are preferred over
    /// parameterized ones, then registration order decides.
    #[cfg(test)]
    pub fn find(&self, method: &axum::http::Method, path: &str) -> Option<&RouteEntry<S>> {
        self.entries
            .iter()
            .filter(|e| e.method.accepts(method))
            .filter(|e| {
                crate::routing::route::strip_group_prefix(path, e.group.prefix())
                    .map(|rest| if rest.is_empty() { "/" } else { rest })
                    .and_then(|rest| e.pattern.matches(rest))
                    .is_some()
            })
            .min_by_key(|e| e.pattern.dynamic_segments())
    }

    /// Assemble the axum router: one nested router per prefixed group, the
    /// gate layered onto every route and the fallback of a group that
    /// carries credentials.
    pub fn into_router(self, gate: &Gate) -> Router<S> {
        let mut root = Router::new();

        for group in RouteGroup::ALL {
            let mut group_router = Router::new();
            let mut mounted = 0usize;

            for entry in self.entries.iter().filter(|e| e.group == group) {
                let mut handler = entry.handler.clone();
                if let Some(source) = group.credential() {
                    let guard = gate.guard(&entry.name, source, entry.capability.clone());
                    handler = handler.layer(from_fn_with_state(guard, authorize_request));
                }
                tracing::debug!(
                    route = %entry.name,
                    method = %entry.method,
                    path = %entry.full_pattern(),
                    capability = ?entry.capability.as_ref().map(CapabilityRef::name),
                    "Route mounted"
                );
                group_router = group_router.route(entry.pattern.as_str(), handler);
                mounted += 1;
            }

            if mounted == 0 {
                continue;
            }
            if let Some(source) = group.credential() {
                // Unknown paths of a guarded group authenticate before answering 404.
                let guard = gate.guard(&format!("{group} fallback"), source, None);
                group_router = group_router
                    .fallback(any(unmatched).layer(from_fn_with_state(guard, authorize_request)));
            }
            root = if group.prefix().is_empty() {
                root.merge(group_router)
            } else {
                root.nest(group.prefix(), group_router)
            };
        }

        root
    }
}

async fn unmatched() -> Response {
    error_response(StatusCode::NOT_FOUND, "not found")
}
