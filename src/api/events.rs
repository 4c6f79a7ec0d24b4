//! WebSocket upgrade for event push, shared by the internal and external groups.

use axum::extract::{State, WebSocketUpgrade};
use axum::response::Response;
use axum::Extension;

use crate::api::ApiState;
use crate::auth::Identity;
use crate::http::websocket;

pub(crate) async fn subscribe(
    ws: WebSocketUpgrade,
    State(state): State<ApiState>,
    Extension(who): Extension<Identity>,
) -> Response {
    let events = state.notifier.subscribe();
    let closed = state.notifier.closed();
    ws.on_upgrade(move |socket| websocket::forward(socket, events, closed, who.principal))
}
