//! Per-request correlation context.
//!
//! Twilio stamps its webhook and websocket-upgrade requests with the call
//! SID; when present it becomes the correlation id so a call can be traced
//! across the TwiML fetch and the media stream. Other callers can supply
//! `x-request-id`; anything else gets a fresh uuid.

use axum::extract::Request;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use uuid::Uuid;

const CALL_SID_HEADER: &str = "x-twilio-call-sid";
const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Clone, Debug)]
pub struct CallContext {
    pub correlation_id: String,
}

pub async fn attach_call_context(mut req: Request, next: Next) -> Response {
    let correlation_id = correlation_from_headers(req.headers())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    req.extensions_mut().insert(CallContext {
        correlation_id: correlation_id.clone(),
    });

    let mut response = next.run(req).await;
    if let Ok(value) = correlation_id.parse() {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

fn correlation_from_headers(headers: &HeaderMap) -> Option<String> {
    [CALL_SID_HEADER, REQUEST_ID_HEADER]
        .iter()
        .find_map(|name| headers.get(*name))
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
