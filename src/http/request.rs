//! Request correlation.
//!
//! Every request carries an `X-Request-ID`: the caller's own if it sent one,
//! a fresh UUID v4 otherwise. The ID is echoed on the response.

use axum::http::Request;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Access to the request ID set by `SetRequestIdLayer`.
pub trait RequestIdExt {
    fn request_id(&self) -> Option<&str>;
}

impl<B> RequestIdExt for Request<B> {
    fn request_id(&self) -> Option<&str> {
        self.headers()
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_header() {
        let req = Request::get("/")
            .header(X_REQUEST_ID, "abc")
            .body(())
            .unwrap();
        assert_eq!(req.request_id(), Some("abc"));
        assert_eq!(Request::get("/").body(()).unwrap().request_id(), None);
    }
}
