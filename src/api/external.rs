//! Routes for authenticated users.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Serialize;

use crate::api::{events, ApiState, HandlerError};
use crate::auth::capability::{RESOURCE_MANAGER, USER_ADMIN};
use crate::auth::Identity;
use crate::lifecycle::OperatingMode;
use crate::resources::Resource;
use crate::routing::{Route, RouteMethod};

#[derive(Debug, Serialize)]
pub struct DaemonInfo {
    pub version: &'static str,
    pub mode: OperatingMode,
    pub principal: String,
}

async fn info(State(state): State<ApiState>, Extension(who): Extension<Identity>) -> Json<DaemonInfo> {
    Json(DaemonInfo {
        version: state.version,
        mode: state.mode,
        principal: who.principal,
    })
}

async fn all_resources(State(state): State<ApiState>) -> Json<Vec<Resource>> {
    Json(state.resources.all_resources())
}

/// Finish bootstrap. The response is sent before the bootstrap listener drains.
async fn init_daemon(
    State(state): State<ApiState>,
    Extension(who): Extension<Identity>,
) -> Result<(StatusCode, Json<serde_json::Value>), HandlerError> {
    let signal = state.init.as_ref().ok_or(HandlerError::NotBootstrapping)?;
    if !signal.complete() {
        return Err(HandlerError::AlreadyInitialized);
    }
    tracing::info!(principal = %who.principal, "Initialization requested");
    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "status": "initializing" })),
    ))
}

pub(crate) fn routes(mode: OperatingMode) -> Vec<Route<ApiState>> {
    let mut routes = vec![
        Route::new("getInfo", RouteMethod::Get, "/info", info),
        Route::new("getAllResources", RouteMethod::Get, "/resources", all_resources)
            .requires(RESOURCE_MANAGER),
        Route::new("externalWS", RouteMethod::Any, "/ws", events::subscribe),
    ];
    if mode == OperatingMode::Bootstrap {
        routes.push(Route::new("initDaemon", RouteMethod::Post, "/init", init_daemon).requires(USER_ADMIN));
    }
    routes
}
