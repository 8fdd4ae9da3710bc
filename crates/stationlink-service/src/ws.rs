//! WebSocket handler for real-time readings.
//!
//! Each client gets its own bounded channel from the distributor. The first
//! message on every connection is the history burst; live readings follow as
//! the collector publishes them. A client that stops draining its channel is
//! dropped by the distributor on the next publish.

use std::sync::Arc;

use axum::{
    Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
    routing::get,
};
use futures::{SinkExt, StreamExt};
use tracing::{debug, info, warn};

use crate::state::{AppState, HISTORY_BURST_LIMIT};

/// Create the WebSocket router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/api/ws", get(ws_handler))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    let backlog = state.manager.recent_readings(HISTORY_BURST_LIMIT).await;
    let (subscriber_id, mut rx) = state.distributor.subscribe(backlog);
    info!(subscriber = subscriber_id, "websocket client connected");

    // Forward distributor messages to the client.
    let mut send_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let json = match serde_json::to_string(&message) {
                Ok(j) => j,
                Err(e) => {
                    warn!(error = %e, "failed to serialize message");
                    continue;
                }
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    // Drain the client side for close frames and keep-alive pings.
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(Message::Close(_)) => break,
                Ok(Message::Ping(_)) => {
                    debug!("received ping");
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "websocket receive error");
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    state.distributor.unsubscribe(subscriber_id);
    info!(subscriber = subscriber_id, "websocket client disconnected");
}
