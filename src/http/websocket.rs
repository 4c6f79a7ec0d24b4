//! WebSocket push of daemon events.
//!
//! # Data Flow
//! ```text
//! Handlers ── Notifier::publish ──▶ mpsc ──▶ ConnectionManager (wsmanager subsystem)
//!                                               │ broadcast
//!                                               ▼
//!                                   one forwarding task per socket ──▶ client
//! ```
//!
//! # Design Decisions
//! - Publishing never blocks a handler; slow sockets skip lagged events
//! - Sockets subscribe before the upgrade completes so no event is missed
//! - When the manager stops, every socket receives a close frame

use axum::extract::ws::{Message, WebSocket};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

const OUTBOUND_CAPACITY: usize = 256;

/// An event pushed to connected clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub event: String,
    pub payload: serde_json::Value,
}

/// Publishing side, cloned into the API state.
#[derive(Clone)]
pub struct Notifier {
    inbound: mpsc::UnboundedSender<Notification>,
    outbound: broadcast::Sender<Notification>,
    closed: CancellationToken,
}

impl Notifier {
    pub fn publish(&self, event: &str, payload: impl Serialize) {
        let payload = match serde_json::to_value(payload) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(event, error = %e, "Dropping unserializable notification");
                return;
            }
        };
        let notification = Notification {
            event: event.to_string(),
            payload,
        };
        if self.inbound.send(notification).is_err() {
            tracing::debug!(event, "Connection manager stopped, notification dropped");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.outbound.subscribe()
    }

    /// Cancelled once the connection manager has stopped.
    pub fn closed(&self) -> CancellationToken {
        self.closed.clone()
    }
}

/// Fan-out hub between handlers and websocket clients.
pub struct ConnectionManager {
    inbound: mpsc::UnboundedReceiver<Notification>,
    outbound: broadcast::Sender<Notification>,
    closed: CancellationToken,
}

impl ConnectionManager {
    pub fn new() -> (Self, Notifier) {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (outbound, _) = broadcast::channel(OUTBOUND_CAPACITY);
        let closed = CancellationToken::new();

        let notifier = Notifier {
            inbound: inbound_tx,
            outbound: outbound.clone(),
            closed: closed.clone(),
        };
        let manager = Self {
            inbound: inbound_rx,
            outbound,
            closed,
        };
        (manager, notifier)
    }

    /// Relay notifications until `shutdown` fires.
    pub async fn run(mut self, shutdown: CancellationToken) {
        tracing::info!("Connection manager started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                next = self.inbound.recv() => match next {
                    Some(notification) => {
                        let receivers = self.outbound.send(notification).unwrap_or(0);
                        tracing::trace!(receivers, "Notification relayed");
                    }
                    None => break,
                },
            }
        }
        self.closed.cancel();
        tracing::info!("Connection manager stopped");
    }
}

/// Forward notifications to one client until either side closes.
pub async fn forward(
    mut socket: WebSocket,
    mut events: broadcast::Receiver<Notification>,
    closed: CancellationToken,
    principal: String,
) {
    tracing::debug!(principal = %principal, "WebSocket client connected");
    loop {
        tokio::select! {
            _ = closed.cancelled() => {
                let _ = socket.send(Message::Close(None)).await;
                break;
            }
            event = events.recv() => match event {
                Ok(notification) => {
                    let text = match serde_json::to_string(&notification) {
                        Ok(t) => t,
                        Err(_) => continue,
                    };
                    if socket.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(principal = %principal, skipped, "WebSocket client lagging");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
    tracing::debug!(principal = %principal, "WebSocket client disconnected");
}
