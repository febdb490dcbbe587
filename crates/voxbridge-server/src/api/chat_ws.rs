//! Interruptible chat relay websocket endpoint.
//!
//! Three activities per connection: a writer task draining the outbound
//! event channel into the socket, a reader task parsing inbound frames onto
//! an event queue, and the dispatch loop feeding the session one event at a
//! time in arrival order.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Extension, State,
    },
    response::Response,
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use voxbridge_core::{ChatSession, InboundEvent, OutboundEvent};

use crate::api::context::CallContext;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/chat/ws", get(ws_upgrade))
}

async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Extension(ctx): Extension<CallContext>,
) -> Response {
    let correlation_id = ctx.correlation_id;
    ws.on_upgrade(move |socket| handle_socket(socket, state, correlation_id))
}

async fn handle_socket(socket: WebSocket, state: AppState, correlation_id: String) {
    info!(correlation_id = %correlation_id, "chat relay connected");
    let (mut ws_tx, mut ws_rx) = socket.split();

    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<OutboundEvent>();
    let writer = tokio::spawn(async move {
        while let Some(event) = out_rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(err) => {
                    warn!("failed to serialize outbound event: {err}");
                    continue;
                }
            };
            if ws_tx.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<InboundEvent>();
    let reader = tokio::spawn(async move {
        while let Some(result) = ws_rx.next().await {
            let message = match result {
                Ok(message) => message,
                Err(err) => {
                    warn!("chat relay receive error: {err}");
                    break;
                }
            };
            match message {
                Message::Text(text) => match serde_json::from_str::<InboundEvent>(&text) {
                    Ok(event) => {
                        if event_tx.send(event).is_err() {
                            break;
                        }
                    }
                    Err(err) => debug!("dropping malformed inbound frame: {err}"),
                },
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    let mut session = ChatSession::new(
        &state.config.relay,
        Arc::clone(&state.engine),
        Arc::clone(&state.renderer),
        out_tx.clone(),
    );

    // The queue closes when the reader task ends, i.e. when the peer closed
    // the stream or the transport failed.
    while let Some(event) = event_rx.recv().await {
        session.handle_event(event).await;
    }

    session.shutdown().await;
    // The writer drains and exits once every sender is gone, including the
    // clone held by the session's supervisor.
    drop(session);
    drop(out_tx);
    let _ = writer.await;
    let _ = reader.await;
    info!(correlation_id = %correlation_id, "chat relay disconnected");
}
