//! Event-stream framing and the per-request session driver.
//!
//! Each emitted unit becomes one `data: {"content": ...}` event. A session
//! ends with exactly one terminal event: `data: [DONE]` on success, or a
//! single `data: {"error": ...}` on failure. Already-sent content is never
//! retracted.

use std::convert::Infallible;

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};

use crate::error::{Error, Result};

/// Terminal frame of a successful session.
pub const DONE_FRAME: &str = "data: [DONE]\n\n";

/// Frames sent to the client.
pub type EventBody = BoxStream<'static, std::result::Result<Bytes, Infallible>>;

/// Frame one outbound unit.
pub fn content_frame(unit: &str) -> Bytes {
    data_frame(&serde_json::json!({ "content": unit }))
}

/// Frame a terminal error.
pub fn error_frame(message: &str) -> Bytes {
    data_frame(&serde_json::json!({ "error": message }))
}

fn data_frame(value: &serde_json::Value) -> Bytes {
    Bytes::from(format!("data: {}\n\n", value))
}

/// Drive a session: frame every unit, then finish with `[DONE]`, or with
/// one error event if the unit stream fails.
pub fn relay<S>(units: S, provider: String) -> EventBody
where
    S: Stream<Item = Result<String>> + Send + 'static,
{
    let frames = async_stream::stream! {
        let mut units = Box::pin(units);
        let mut sent_units = 0usize;
        let mut sent_chars = 0usize;

        while let Some(unit) = units.next().await {
            match unit {
                Ok(unit) => {
                    sent_units += 1;
                    sent_chars += unit.chars().count();
                    yield Ok::<_, Infallible>(content_frame(&unit));
                }
                Err(e) => {
                    tracing::warn!(
                        provider = %provider,
                        error = %e,
                        units = sent_units,
                        "Stream failed"
                    );
                    yield Ok(error_frame(&e.to_string()));
                    return;
                }
            }
        }

        tracing::info!(
            provider = %provider,
            units = sent_units,
            chars = sent_chars,
            "Stream completed"
        );
        yield Ok(Bytes::from_static(DONE_FRAME.as_bytes()));
    };

    frames.boxed()
}

/// A session that fails before any upstream call: one error event, then end.
pub fn failed(error: &Error) -> EventBody {
    futures::stream::once(futures::future::ready(Ok(error_frame(&error.to_string())))).boxed()
}

/// Wrap a session body in an event-stream response.
pub fn event_stream_response(body: EventBody) -> Response {
    let mut response = Response::new(Body::from_stream(body));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/event-stream"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    response
}
