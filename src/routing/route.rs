//! Route definitions and route groups.

use std::fmt;

use axum::handler::Handler;
use axum::http::Method;
use axum::routing::{any, on, MethodFilter, MethodRouter};

/// HTTP verb a route answers to. `Any` accepts every method (websocket upgrades).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Any,
}

impl RouteMethod {
    /// Whether a request with `method` is accepted.
    pub fn accepts(&self, method: &Method) -> bool {
        match self {
            RouteMethod::Get => method == Method::GET || method == Method::HEAD,
            RouteMethod::Post => method == Method::POST,
            RouteMethod::Put => method == Method::PUT,
            RouteMethod::Patch => method == Method::PATCH,
            RouteMethod::Delete => method == Method::DELETE,
            RouteMethod::Any => true,
        }
    }

    /// Whether two routes on the same path would compete for a request.
    pub fn overlaps(&self, other: &RouteMethod) -> bool {
        *self == RouteMethod::Any || *other == RouteMethod::Any || self == other
    }

    fn filter(&self) -> Option<MethodFilter> {
        match self {
            RouteMethod::Get => Some(MethodFilter::GET),
            RouteMethod::Post => Some(MethodFilter::POST),
            RouteMethod::Put => Some(MethodFilter::PUT),
            RouteMethod::Patch => Some(MethodFilter::PATCH),
            RouteMethod::Delete => Some(MethodFilter::DELETE),
            RouteMethod::Any => None,
        }
    }
}

impl fmt::Display for RouteMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RouteMethod::Get => "GET",
            RouteMethod::Post => "POST",
            RouteMethod::Put => "PUT",
            RouteMethod::Patch => "PATCH",
            RouteMethod::Delete => "DELETE",
            RouteMethod::Any => "ANY",
        };
        f.write_str(s)
    }
}

/// How callers of a group prove who they are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// Pre-shared token of a same-host application (`X-Internal-Token`).
    InternalToken,
    /// Session token of an end user (`Authorization: Bearer ...`).
    Bearer,
}

/// Logical partition of the route table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteGroup {
    /// Login and registration, reachable before any identity exists.
    Auth,
    /// Trusted same-host callers.
    Internal,
    /// Authenticated users and applications.
    External,
    /// UI entry point and bundled assets.
    Static,
}

impl RouteGroup {
    pub const ALL: [RouteGroup; 4] = [
        RouteGroup::Auth,
        RouteGroup::Internal,
        RouteGroup::External,
        RouteGroup::Static,
    ];

    /// Path prefix every route of the group is mounted under.
    pub fn prefix(&self) -> &'static str {
        match self {
            RouteGroup::Auth => "/api/v1/auth",
            RouteGroup::Internal => "/api/v1/i",
            RouteGroup::External => "/api/v1/e",
            RouteGroup::Static => "",
        }
    }

    /// Credential the group's authorization middleware expects, if it has one.
    pub fn credential(&self) -> Option<CredentialSource> {
        match self {
            RouteGroup::Internal => Some(CredentialSource::InternalToken),
            RouteGroup::External => Some(CredentialSource::Bearer),
            RouteGroup::Auth | RouteGroup::Static => None,
        }
    }

    /// Group owning a request path, by prefix.
    pub fn for_path(path: &str) -> RouteGroup {
        [RouteGroup::Auth, RouteGroup::Internal, RouteGroup::External]
            .into_iter()
            .find(|g| strip_group_prefix(path, g.prefix()).is_some())
            .unwrap_or(RouteGroup::Static)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RouteGroup::Auth => "auth",
            RouteGroup::Internal => "internal",
            RouteGroup::External => "external",
            RouteGroup::Static => "static",
        }
    }
}

impl fmt::Display for RouteGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strip a group prefix on a segment boundary: `/api/v1/i/x` → `/x`, `/api/v1/ix` → None.
pub(crate) fn strip_group_prefix<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    if prefix.is_empty() {
        return Some(path);
    }
    let rest = path.strip_prefix(prefix)?;
    (rest.is_empty() || rest.starts_with('/')).then_some(rest)
}

/// A statically registered route.
pub struct Route<S> {
    pub(crate) name: String,
    pub(crate) method: RouteMethod,
    pub(crate) pattern: String,
    pub(crate) handler: MethodRouter<S>,
    pub(crate) required_capability: Option<String>,
}

impl<S> Route<S>
where
    S: Clone + Send + Sync + 'static,
{
    /// Create a route answering `method` on `pattern` (relative to the group prefix).
    pub fn new<H, T>(name: impl Into<String>, method: RouteMethod, pattern: &str, handler: H) -> Self
    where
        H: Handler<T, S>,
        T: 'static,
    {
        let handler = match method.filter() {
            Some(filter) => on(filter, handler),
            None => any(handler),
        };
        Self {
            name: name.into(),
            method,
            pattern: pattern.to_string(),
            handler,
            required_capability: None,
        }
    }

    /// Declare the capability callers need to reach this route.
    pub fn requires(mut self, capability: impl Into<String>) -> Self {
        self.required_capability = Some(capability.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<S> fmt::Debug for Route<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("name", &self.name)
            .field("method", &self.method)
            .field("pattern", &self.pattern)
            .field("required_capability", &self.required_capability)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_for_path_respects_segment_boundaries() {
        assert_eq!(RouteGroup::for_path("/api/v1/i/internal/resource"), RouteGroup::Internal);
        assert_eq!(RouteGroup::for_path("/api/v1/e"), RouteGroup::External);
        assert_eq!(RouteGroup::for_path("/api/v1/auth/login"), RouteGroup::Auth);
        assert_eq!(RouteGroup::for_path("/api/v1/ix"), RouteGroup::Static);
        assert_eq!(RouteGroup::for_path("/static/app.js"), RouteGroup::Static);
    }

    #[test]
    fn only_api_groups_carry_credentials() {
        assert_eq!(RouteGroup::Internal.credential(), Some(CredentialSource::InternalToken));
        assert_eq!(RouteGroup::External.credential(), Some(CredentialSource::Bearer));
        assert_eq!(RouteGroup::Auth.credential(), None);
        assert_eq!(RouteGroup::Static.credential(), None);
    }

    #[test]
    fn any_overlaps_every_method() {
        assert!(RouteMethod::Any.overlaps(&RouteMethod::Delete));
        assert!(RouteMethod::Get.overlaps(&RouteMethod::Get));
        assert!(!RouteMethod::Get.overlaps(&RouteMethod::Post));
        assert!(RouteMethod::Any.accepts(&Method::OPTIONS));
        assert!(RouteMethod::Get.accepts(&Method::HEAD));
    }
}
