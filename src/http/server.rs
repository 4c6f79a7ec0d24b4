//! Router assembly shared by every listener.
//!
//! # Responsibilities
//! - Turn a frozen route table into the axum service all listeners serve
//! - Wire up middleware (request ID, tracing, body limit, optional timeout, metrics)
//! - Answer unmatched paths with a JSON 404
//!
//! # Design Decisions
//! - One router per operating mode, cloned into each listener task
//! - Request ID is set outermost so every log line of a request carries it

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::{middleware, Router};
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::api::ApiState;
use crate::config::DaemonConfig;
use crate::http::middleware::metrics::track_requests;
use crate::http::middleware::Gate;
use crate::http::request::RequestIdExt;
use crate::http::response::error_response;
use crate::routing::RouteTable;

/// Per-router middleware settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub max_body_size: usize,
    /// Fixed per-request deadline; only the bootstrap listener sets one.
    pub request_timeout: Option<Duration>,
}

impl ServerSettings {
    pub fn normal(config: &DaemonConfig) -> Self {
        Self {
            max_body_size: config.listener.max_body_size,
            request_timeout: None,
        }
    }

    pub fn bootstrap(config: &DaemonConfig) -> Self {
        Self {
            max_body_size: config.listener.max_body_size,
            request_timeout: Some(config.timeouts.bootstrap_request()),
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            max_body_size: 1024 * 1024,
            request_timeout: None,
        }
    }
}

/// Build the service every listener of one operating mode serves.
#[allow(deprecated)]
pub fn build_router(
    table: RouteTable<ApiState>,
    gate: &Gate,
    state: ApiState,
    settings: &ServerSettings,
) -> Router {
    let mut router = table
        .into_router(gate)
        .fallback(not_found)
        .with_state(state)
        .layer(middleware::from_fn(track_requests))
        .layer(RequestBodyLimitLayer::new(settings.max_body_size));

    if let Some(timeout) = settings.request_timeout {
        router = router.layer(TimeoutLayer::new(timeout));
    }

    router
        .layer(TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
            tracing::info_span!(
                "request",
                method = %req.method(),
                path = %req.uri().path(),
                request_id = %req.request_id().unwrap_or("-"),
            )
        }))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

async fn not_found() -> Response {
    error_response(StatusCode::NOT_FOUND, "not found")
}
