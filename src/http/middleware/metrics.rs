//! Request accounting middleware.

use std::time::Instant;

use axum::{body::Body, http::Request, middleware::Next, response::Response};

use crate::observability::metrics;
use crate::routing::RouteGroup;

/// Count every request by route group and response status.
pub async fn track_requests(req: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let group = RouteGroup::for_path(req.uri().path());
    let response = next.run(req).await;
    metrics::record_request(group.as_str(), response.status().as_u16(), start);
    response
}
