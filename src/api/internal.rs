//! Routes for applications running on the same host.
//!
//! Callers authenticate with their pre-shared internal token; the
//! application id behind the token owns whatever it creates.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;

use crate::api::{events, ApiState, HandlerError};
use crate::auth::capability::RESOURCE_PROVIDER;
use crate::auth::Identity;
use crate::resources::{Resource, ResourceRequest, ResourceStatus};
use crate::routing::{Route, RouteMethod};

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct ProviderRequest {
    #[serde(rename = "type")]
    pub kind: String,
}

async fn own_resources(
    State(state): State<ApiState>,
    Extension(app): Extension<Identity>,
) -> Json<Vec<Resource>> {
    Json(state.resources.app_resources(&app.principal))
}

async fn create_resource(
    State(state): State<ApiState>,
    Extension(app): Extension<Identity>,
    body: Result<Json<ResourceRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Resource>), HandlerError> {
    let Json(request) = body?;
    let resource = state.resources.create(&app.principal, request)?;
    state.notifier.publish("resource.created", &resource);
    Ok((StatusCode::CREATED, Json(resource)))
}

async fn get_resource(
    State(state): State<ApiState>,
    Extension(app): Extension<Identity>,
    Path(id): Path<String>,
) -> Result<Json<Resource>, HandlerError> {
    Ok(Json(state.resources.get(&app.principal, &id)?))
}

async fn set_resource_status(
    State(state): State<ApiState>,
    Extension(app): Extension<Identity>,
    Path(id): Path<String>,
    body: Result<Json<StatusUpdate>, JsonRejection>,
) -> Result<Json<Resource>, HandlerError> {
    let Json(update) = body?;
    let status: ResourceStatus = update.status.parse()?;
    let resource = state.resources.set_status(&app.principal, &id, status)?;
    state.notifier.publish("resource.status", &resource);
    Ok(Json(resource))
}

async fn delete_resource(
    State(state): State<ApiState>,
    Extension(app): Extension<Identity>,
    Path(id): Path<String>,
) -> Result<Json<Resource>, HandlerError> {
    let resource = state.resources.delete(&app.principal, &id)?;
    state.notifier.publish("resource.deleted", &resource);
    Ok(Json(resource))
}

async fn register_provider(
    State(state): State<ApiState>,
    Extension(app): Extension<Identity>,
    body: Result<Json<ProviderRequest>, JsonRejection>,
) -> Result<StatusCode, HandlerError> {
    let Json(request) = body?;
    state.resources.register_provider(&app.principal, &request.kind)?;
    state.notifier.publish(
        "provider.registered",
        serde_json::json!({ "app": app.principal, "type": request.kind }),
    );
    Ok(StatusCode::NO_CONTENT)
}

async fn deregister_provider(
    State(state): State<ApiState>,
    Extension(app): Extension<Identity>,
    body: Result<Json<ProviderRequest>, JsonRejection>,
) -> Result<StatusCode, HandlerError> {
    let Json(request) = body?;
    state
        .resources
        .deregister_provider(&app.principal, &request.kind)?;
    state.notifier.publish(
        "provider.deregistered",
        serde_json::json!({ "app": app.principal, "type": request.kind }),
    );
    Ok(StatusCode::NO_CONTENT)
}

async fn provider_resources(
    State(state): State<ApiState>,
    Extension(app): Extension<Identity>,
) -> Result<Json<Vec<Resource>>, HandlerError> {
    Ok(Json(state.resources.provider_resources(&app.principal)?))
}

pub(crate) fn routes() -> Vec<Route<ApiState>> {
    vec![
        Route::new("getOwnResources", RouteMethod::Get, "/internal/resource", own_resources),
        Route::new("createResource", RouteMethod::Post, "/internal/resource", create_resource),
        Route::new(
            "getProviderResources",
            RouteMethod::Get,
            "/internal/resource/provider",
            provider_resources,
        )
        .requires(RESOURCE_PROVIDER),
        Route::new("getResource", RouteMethod::Get, "/internal/resource/{resourceID}", get_resource),
        Route::new(
            "setResourceStatus",
            RouteMethod::Post,
            "/internal/resource/{resourceID}",
            set_resource_status,
        ),
        Route::new(
            "deleteResource",
            RouteMethod::Delete,
            "/internal/resource/{resourceID}",
            delete_resource,
        ),
        Route::new(
            "registerResourceProvider",
            RouteMethod::Post,
            "/internal/provider",
            register_provider,
        )
        .requires(RESOURCE_PROVIDER),
        Route::new(
            "deregisterResourceProvider",
            RouteMethod::Delete,
            "/internal/provider",
            deregister_provider,
        )
        .requires(RESOURCE_PROVIDER),
        Route::new("internalWS", RouteMethod::Any, "/ws", events::subscribe),
    ]
}
