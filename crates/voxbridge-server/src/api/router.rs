use axum::{extract::Request, middleware, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info_span;

use crate::api::context::attach_call_context;
use crate::state::AppState;

/// Create the main API router.
pub fn create_router(state: AppState) -> Router {
    let trace_layer = TraceLayer::new_for_http().make_span_with(|request: &Request| {
        let call_sid = request
            .headers()
            .get("x-twilio-call-sid")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-");
        info_span!(
            "http_request",
            method = %request.method(),
            uri = %request.uri(),
            call_sid = %call_sid
        )
    });

    Router::new()
        .merge(crate::api::twiml::router())
        .merge(crate::api::chat_ws::router())
        .merge(crate::api::translate_ws::router())
        .layer(trace_layer)
        .layer(middleware::from_fn(attach_call_context))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
