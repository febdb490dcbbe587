//! Call-setup endpoints.
//!
//! Twilio fetches these when a call comes in; the returned TwiML tells it to
//! open a ConversationRelay media stream against the matching websocket
//! endpoint, speaking the configured greeting first.

use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use tracing::debug;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/chat/start_call", post(start_chat_call))
        .route("/translate/start_call", post(start_translate_call))
}

async fn start_chat_call(State(state): State<AppState>) -> Response {
    debug!("serving chat call setup TwiML");
    twiml_response(
        &state.config.public_url,
        "/chat/ws",
        &state.config.chat_greeting,
    )
}

async fn start_translate_call(State(state): State<AppState>) -> Response {
    debug!("serving translate call setup TwiML");
    twiml_response(
        &state.config.public_url,
        "/translate/ws",
        &state.config.translate_greeting,
    )
}

fn twiml_response(public_url: &str, ws_path: &str, greeting: &str) -> Response {
    let ws_url = format!("wss://{}{}", websocket_host(public_url), ws_path);
    let body = connect_relay_twiml(&ws_url, greeting);
    ([(header::CONTENT_TYPE, "application/xml")], body).into_response()
}

/// The host (authority) part of the public URL. Twilio needs a bare
/// `wss://host/...` URL, so an http(s) scheme and any path are stripped.
fn websocket_host(public_url: &str) -> &str {
    let without_scheme = public_url
        .strip_prefix("https://")
        .or_else(|| public_url.strip_prefix("http://"))
        .unwrap_or(public_url);
    without_scheme
        .split_once('/')
        .map(|(host, _)| host)
        .unwrap_or(without_scheme)
}

fn connect_relay_twiml(ws_url: &str, greeting: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Response>
  <Connect>
    <ConversationRelay url="{}" welcomeGreeting="{}"></ConversationRelay>
  </Connect>
</Response>
"#,
        escape_xml_attr(ws_url),
        escape_xml_attr(greeting)
    )
}

fn escape_xml_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            other => out.push(other),
        }
    }
    out
}
