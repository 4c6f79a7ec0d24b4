//! Capability gate middleware.
//! Authenticates the caller of an internal or external route and enforces
//! the capability bound to that route at registration time.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::auth::{CapabilityRef, CapabilityStore, Identity, IdentityStore};
use crate::http::response::error_response;
use crate::observability::metrics;
use crate::routing::CredentialSource;

/// Header carrying the pre-shared token of same-host applications.
pub const INTERNAL_TOKEN_HEADER: &str = "x-internal-token";

/// Per-request authorization failure.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthorizationError {
    #[error("missing {0}")]
    MissingCredential(&'static str),

    #[error("invalid or expired credential")]
    UnknownCredential,

    #[error("'{principal}' lacks capability {capability} required by {route}")]
    Denied {
        principal: String,
        route: String,
        capability: CapabilityRef,
    },
}

impl IntoResponse for AuthorizationError {
    fn into_response(self) -> Response {
        let status = match self {
            AuthorizationError::MissingCredential(_) | AuthorizationError::UnknownCredential => {
                StatusCode::UNAUTHORIZED
            }
            AuthorizationError::Denied { .. } => StatusCode::FORBIDDEN,
        };
        error_response(status, self.to_string())
    }
}

/// Collaborators shared by every guarded route.
#[derive(Clone)]
pub struct Gate {
    identities: Arc<dyn IdentityStore>,
    capabilities: Arc<dyn CapabilityStore>,
}

impl Gate {
    pub fn new(identities: Arc<dyn IdentityStore>, capabilities: Arc<dyn CapabilityStore>) -> Self {
        Self {
            identities,
            capabilities,
        }
    }

    /// Bind the gate to one route.
    pub fn guard(
        &self,
        route: &str,
        source: CredentialSource,
        capability: Option<CapabilityRef>,
    ) -> RouteGuard {
        RouteGuard {
            gate: self.clone(),
            route: route.into(),
            source,
            capability,
        }
    }
}

/// Gate state for a single route, carrying that route's capability inline.
#[derive(Clone)]
pub struct RouteGuard {
    gate: Gate,
    route: Arc<str>,
    source: CredentialSource,
    capability: Option<CapabilityRef>,
}

impl RouteGuard {
    /// Authenticate the caller and check the route capability.
    pub fn check(&self, headers: &HeaderMap) -> Result<Identity, AuthorizationError> {
        let identity = match self.source {
            CredentialSource::InternalToken => {
                let token = headers
                    .get(INTERNAL_TOKEN_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .ok_or(AuthorizationError::MissingCredential("internal token"))?;
                self.gate.identities.internal(token)
            }
            CredentialSource::Bearer => {
                let token = headers
                    .get(header::AUTHORIZATION)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.strip_prefix("Bearer "))
                    .ok_or(AuthorizationError::MissingCredential("bearer token"))?;
                self.gate.identities.session(token.trim())
            }
        }
        .ok_or(AuthorizationError::UnknownCredential)?;

        if let Some(capability) = &self.capability {
            if !self.gate.capabilities.authorize(&identity, capability) {
                return Err(AuthorizationError::Denied {
                    principal: identity.principal,
                    route: self.route.to_string(),
                    capability: capability.clone(),
                });
            }
        }

        Ok(identity)
    }

    pub fn route(&self) -> &str {
        &self.route
    }
}

/// Middleware admitting the request only if [`RouteGuard::check`] passes.
/// The resolved [`Identity`] is attached to the request extensions.
pub async fn authorize_request(
    State(guard): State<RouteGuard>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    match guard.check(req.headers()) {
        Ok(identity) => {
            tracing::debug!(route = guard.route(), principal = %identity.principal, "Request authorized");
            req.extensions_mut().insert(identity);
            next.run(req).await
        }
        Err(err) => {
            tracing::warn!(route = guard.route(), error = %err, "Request rejected");
            metrics::record_denial(guard.route());
            err.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{MemoryCapabilityStore, MemoryIdentityStore};
    use axum::http::HeaderValue;

    struct Fixture {
        gate: Gate,
        identities: Arc<MemoryIdentityStore>,
        capabilities: Arc<MemoryCapabilityStore>,
    }

    fn fixture() -> Fixture {
        let identities = Arc::new(MemoryIdentityStore::new());
        let capabilities = Arc::new(MemoryCapabilityStore::default());
        Fixture {
            gate: Gate::new(identities.clone(), capabilities.clone()),
            identities,
            capabilities,
        }
    }

    fn headers(name: &str, value: &str) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert(
            axum::http::HeaderName::from_bytes(name.as_bytes()).unwrap(),
            HeaderValue::from_str(value).unwrap(),
        );
        map
    }

    #[test]
    fn internal_token_required() {
        let f = fixture();
        let guard = f.gate.guard("getOwnResources", CredentialSource::InternalToken, None);

        assert_eq!(
            guard.check(&HeaderMap::new()),
            Err(AuthorizationError::MissingCredential("internal token"))
        );
        assert_eq!(
            guard.check(&headers(INTERNAL_TOKEN_HEADER, "bogus")),
            Err(AuthorizationError::UnknownCredential)
        );

        let token = f.identities.register_application("dns-app");
        let identity = guard.check(&headers(INTERNAL_TOKEN_HEADER, &token)).unwrap();
        assert_eq!(identity, Identity::application("dns-app"));
    }

    #[test]
    fn bearer_session_and_capability() {
        let f = fixture();
        let cap = CapabilityRef::new("ResourceManager");
        let guard = f
            .gate
            .guard("getAllResources", CredentialSource::Bearer, Some(cap));

        f.identities.register("alice", "pw", false).unwrap();
        let token = f.identities.login("alice", "pw").unwrap();
        let auth = headers("authorization", &format!("Bearer {token}"));

        assert!(matches!(
            guard.check(&auth),
            Err(AuthorizationError::Denied { .. })
        ));

        f.capabilities.grant("alice", "ResourceManager");
        assert_eq!(guard.check(&auth).unwrap().principal, "alice");
    }

    #[test]
    fn session_tokens_are_not_internal_tokens() {
        let f = fixture();
        f.identities.register("alice", "pw", true).unwrap();
        let token = f.identities.login("alice", "pw").unwrap();
        let guard = f.gate.guard("getOwnResources", CredentialSource::InternalToken, None);
        assert_eq!(
            guard.check(&headers(INTERNAL_TOKEN_HEADER, &token)),
            Err(AuthorizationError::UnknownCredential)
        );
    }

    #[test]
    fn error_statuses() {
        assert_eq!(
            AuthorizationError::UnknownCredential.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        let denied = AuthorizationError::Denied {
            principal: "a".into(),
            route: "r".into(),
            capability: CapabilityRef::new("c"),
        };
        assert_eq!(denied.into_response().status(), StatusCode::FORBIDDEN);
    }
}
