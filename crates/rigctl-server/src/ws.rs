use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use rigctl_protocol::RequestError;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::server::AppState;

/// Hard transport cap; frames above this close the connection. Smaller
/// oversized messages are dropped by the loop and the connection stays up.
pub const TRANSPORT_MAX_MESSAGE_BYTES: usize = 64 * 1024;

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(state): State<Arc<AppState>>,
) -> Response {
    ws.max_message_size(TRANSPORT_MAX_MESSAGE_BYTES.max(state.max_message_bytes))
        .on_upgrade(move |socket| {
            handle_socket(socket, state).instrument(info_span!("conn", peer = %peer))
        })
}

/// Per-connection loop: one message in, at most one snapshot out.
///
/// Messages are handled strictly in order; the registry lock is taken
/// inside the interpreter and released before the reply is written.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    info!("client connected");
    let (mut ws_tx, mut ws_rx) = socket.split();

    while let Some(msg) = ws_rx.next().await {
        let msg = match msg {
            Ok(m) => m,
            Err(e) => {
                warn!(error = %e, "message reading error");
                break;
            }
        };

        let text = match msg {
            Message::Text(text) => text,
            Message::Binary(data) => {
                debug!(len = data.len(), "ignoring binary frame");
                continue;
            }
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) => continue,
        };

        let Some(reply) = respond(&state, text.as_str()).await else {
            continue;
        };

        if let Err(e) = ws_tx.send(Message::Text(reply.into())).await {
            warn!(error = %e, "response writing error");
            break;
        }
    }

    info!("client disconnected");
}

/// Run one inbound message through the interpreter and serialize the
/// snapshot. `None` means the message is dropped without a reply.
pub async fn respond(state: &AppState, text: &str) -> Option<String> {
    if text.len() > state.max_message_bytes {
        warn!(
            len = text.len(),
            limit = state.max_message_bytes,
            "message too large, dropped"
        );
        return None;
    }

    let snapshot = match state.interpreter.handle(text).await {
        Ok(snapshot) => snapshot,
        Err(RequestError::KeyMismatch) => {
            debug!("key mismatch, message dropped");
            return None;
        }
        Err(e) => {
            warn!(error = %e, "message dropped");
            return None;
        }
    };

    match serde_json::to_string(&snapshot) {
        Ok(json) => Some(json),
        Err(e) => {
            warn!(error = %e, "response marshalling error");
            None
        }
    }
}
