//! Translation relay websocket endpoint.
//!
//! The non-interruptible variant: each completed utterance is translated to
//! completion before the next inbound frame is read. No conversation history
//! accumulates; every utterance is rendered with the same fixed two-turn
//! prompt, and every outbound event carries the target-language tag.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Extension, State,
    },
    response::Response,
    routing::get,
    Router,
};
use tracing::{debug, info, warn};
use uuid::Uuid;
use voxbridge_core::{
    GenerationRequest, InboundEvent, OutboundEvent, RelayError, Turn, TurnRole,
    UtteranceAggregator,
};

use crate::api::context::CallContext;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/translate/ws", get(ws_upgrade))
}

async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Extension(ctx): Extension<CallContext>,
) -> Response {
    let correlation_id = ctx.correlation_id;
    ws.on_upgrade(move |socket| handle_socket(socket, state, correlation_id))
}

async fn handle_socket(mut socket: WebSocket, state: AppState, correlation_id: String) {
    info!(correlation_id = %correlation_id, "translate relay connected");
    let mut aggregator = UtteranceAggregator::new();

    while let Some(result) = socket.recv().await {
        let message = match result {
            Ok(message) => message,
            Err(err) => {
                warn!("translate relay receive error: {err}");
                break;
            }
        };
        let text = match message {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };
        let event = match serde_json::from_str::<InboundEvent>(&text) {
            Ok(event) => event,
            Err(err) => {
                debug!("dropping malformed inbound frame: {err}");
                continue;
            }
        };
        let InboundEvent::Prompt { voice_prompt, last } = event else {
            continue;
        };
        let Some(utterance) = aggregator.accept(voice_prompt, last) else {
            continue;
        };

        if translate_turn(&mut socket, &state, &utterance).await.is_err() {
            break;
        }
    }

    info!(correlation_id = %correlation_id, "translate relay disconnected");
}

/// Translate one utterance to completion, streaming deltas as they arrive.
/// Errors mean the socket is gone; engine failures still close the stream
/// with a terminal event.
async fn translate_turn(
    socket: &mut WebSocket,
    state: &AppState,
    utterance: &str,
) -> voxbridge_core::Result<()> {
    let lang = state.config.translate_language.as_str();
    let turns = [Turn::new(
        TurnRole::System,
        state.config.translate_prompt.clone(),
    )];
    let prompt = state.renderer.render(&turns, utterance);

    let request = GenerationRequest {
        id: Uuid::new_v4().simple().to_string(),
        prompt,
        max_output_tokens: state.config.relay.max_output_tokens,
    };

    match state.engine.submit(request).await {
        Ok(mut snapshots) => {
            let mut cursor = 0usize;
            while let Some(snapshot) = snapshots.recv().await {
                let Some(delta) = snapshot.get(cursor..).filter(|d| !d.is_empty()) else {
                    continue;
                };
                cursor = snapshot.len();
                send_event(socket, OutboundEvent::delta(delta).with_lang(lang)).await?;
            }
        }
        Err(err) => warn!("translation submit failed: {err}"),
    }

    send_event(socket, OutboundEvent::terminal().with_lang(lang)).await
}

async fn send_event(socket: &mut WebSocket, event: OutboundEvent) -> voxbridge_core::Result<()> {
    let text = serde_json::to_string(&event)
        .map_err(|err| RelayError::Transport(format!("serialize outbound event: {err}")))?;
    socket
        .send(Message::Text(text))
        .await
        .map_err(|err| RelayError::Transport(format!("send outbound event: {err}")))
}
