//! Handler errors and their HTTP mapping.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::auth::IdentityError;
use crate::http::response::error_response;
use crate::resources::ResourceError;

/// Failure inside a route handler. Contained to the request that caused it.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error("invalid request body: {0}")]
    BadRequest(String),

    #[error("daemon initialization already requested")]
    AlreadyInitialized,

    #[error("operation is only available while bootstrapping")]
    NotBootstrapping,

    #[error("asset '{0}' not found")]
    AssetNotFound(String),

    #[error("asset read failed: {0}")]
    Io(#[from] std::io::Error),
}

impl HandlerError {
    pub fn status(&self) -> StatusCode {
        match self {
            HandlerError::Resource(err) => match err {
                ResourceError::NotFound(_) => StatusCode::NOT_FOUND,
                ResourceError::NotOwner { .. } | ResourceError::NotProvider(_) => {
                    StatusCode::FORBIDDEN
                }
                ResourceError::UnknownType(_) | ResourceError::InvalidStatus(_) => {
                    StatusCode::BAD_REQUEST
                }
                ResourceError::ProviderExists { .. } => StatusCode::CONFLICT,
                ResourceError::NotInitialized => StatusCode::SERVICE_UNAVAILABLE,
            },
            HandlerError::Identity(err) => match err {
                IdentityError::UserExists(_) => StatusCode::CONFLICT,
                IdentityError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                IdentityError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                IdentityError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            HandlerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            HandlerError::AlreadyInitialized => StatusCode::CONFLICT,
            HandlerError::NotBootstrapping => StatusCode::NOT_FOUND,
            HandlerError::AssetNotFound(_) => StatusCode::NOT_FOUND,
            HandlerError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for HandlerError {
    fn from(rejection: JsonRejection) -> Self {
        HandlerError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, status = %status, "Request rejected by handler");
        }
        error_response(status, self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_map_to_statuses() {
        let cases = [
            (HandlerError::from(ResourceError::NotFound("x".into())), StatusCode::NOT_FOUND),
            (
                HandlerError::from(ResourceError::UnknownType("gpu".into())),
                StatusCode::BAD_REQUEST,
            ),
            (
                HandlerError::from(IdentityError::InvalidCredentials),
                StatusCode::UNAUTHORIZED,
            ),
            (HandlerError::AssetNotFound("a.js".into()), StatusCode::NOT_FOUND),
            (
                HandlerError::from(std::io::Error::other("disk")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }
}
