//! Login and registration.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::{ApiState, HandlerError};
use crate::lifecycle::OperatingMode;
use crate::routing::{Route, RouteMethod};

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Session {
    pub username: String,
    pub token: String,
}

/// Create the administrator account. Only mounted while bootstrapping.
async fn register(
    State(state): State<ApiState>,
    body: Result<Json<Credentials>, JsonRejection>,
) -> Result<(StatusCode, Json<Session>), HandlerError> {
    let Json(creds) = body?;
    let identity = state.identities.register(&creds.username, &creds.password, true)?;
    let token = state.identities.login(&creds.username, &creds.password)?;
    tracing::info!(username = %identity.principal, "Administrator registered");
    Ok((
        StatusCode::CREATED,
        Json(Session {
            username: identity.principal,
            token,
        }),
    ))
}

async fn login(
    State(state): State<ApiState>,
    body: Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<Session>, HandlerError> {
    let Json(creds) = body?;
    let token = state
        .identities
        .login(&creds.username, &creds.password)
        .inspect_err(|_| tracing::warn!(username = %creds.username, "Login failed"))?;
    Ok(Json(Session {
        username: creds.username,
        token,
    }))
}

pub(crate) fn routes(mode: OperatingMode) -> Vec<Route<ApiState>> {
    let mut routes = vec![Route::new("login", RouteMethod::Post, "/login", login)];
    if mode == OperatingMode::Bootstrap {
        routes.push(Route::new("register", RouteMethod::Post, "/register", register));
    }
    routes
}
