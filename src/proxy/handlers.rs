//! HTTP request handlers.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use super::rechunk::rechunk;
use super::server::AppState;
use super::session;
use super::types::ChatRequest;
use crate::error::Error;

/// Handle POST /api/chat.
///
/// Every request that gets past body parsing answers `200` with an event
/// stream; provider failures are reported in-stream.
pub async fn chat(
    State(state): State<AppState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, Error> {
    let Json(request) = body.map_err(|rejection| {
        tracing::debug!(error = %rejection, "Rejected chat body");
        Error::BadRequest(rejection.body_text())
    })?;

    let session_id = uuid::Uuid::new_v4();

    let provider = match state
        .selector
        .select(request.preferred_provider.as_deref())
    {
        Ok(provider) => provider,
        Err(e) => {
            tracing::error!(session = %session_id, error = %e, "Provider selection failed");
            return Ok(session::event_stream_response(session::failed(&e)));
        }
    };

    tracing::info!(
        session = %session_id,
        provider = %provider.name,
        vendor = %provider.vendor,
        model = %provider.model,
        messages = request.messages.len(),
        "Selected provider"
    );

    if provider.api_key.is_none() {
        tracing::warn!(session = %session_id, provider = %provider.name, "Provider has no API key");
        return Ok(session::event_stream_response(session::failed(
            &Error::MissingApiKey,
        )));
    }

    let fragments = state
        .upstream
        .open_stream(&provider, request.messages, state.completion);
    let units = rechunk(fragments, state.pacing);

    Ok(session::event_stream_response(session::relay(
        units,
        provider.name,
    )))
}

/// CORS preflight for POST endpoints.
pub async fn preflight_post() -> Response {
    preflight("POST, OPTIONS")
}

/// CORS preflight for GET endpoints.
pub async fn preflight_get() -> Response {
    preflight("GET, OPTIONS")
}

fn preflight(methods: &'static str) -> Response {
    (
        StatusCode::OK,
        [
            (
                header::ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_static(methods),
            ),
            (
                header::ACCESS_CONTROL_ALLOW_HEADERS,
                HeaderValue::from_static("Content-Type"),
            ),
        ],
    )
        .into_response()
}

/// Any verb a route does not serve.
pub async fn method_not_allowed() -> Error {
    Error::MethodNotAllowed
}

/// Handle GET /health
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "chatrelay",
        "providers": state.selector.registry().len(),
    }))
}

/// Handle GET /providers - list the pool without exposing keys
pub async fn list_providers(State(state): State<AppState>) -> impl IntoResponse {
    let providers: Vec<serde_json::Value> = state
        .selector
        .registry()
        .providers()
        .iter()
        .map(|p| {
            serde_json::json!({
                "name": p.name,
                "vendor": p.vendor,
                "model": p.model,
                "url": p.url,
                "has_key": p.api_key.is_some(),
            })
        })
        .collect();

    Json(serde_json::json!({ "providers": providers }))
}
