//! Request ID middleware for correlating logs with requests.
//!
//! Generates a UUID v4 for each incoming request and wraps the request in a tracing
//! span, so delegate failures logged deep inside a handler can be tied back to the
//! request that caused them.

use std::time::Instant;

use axum::{extract::Request, middleware::Next, response::Response};
use tracing::Instrument;
use uuid::Uuid;

/// Response header carrying the request ID back to the API server.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Request ID, available to handlers through request extensions.
#[derive(Clone, Debug)]
pub struct RequestId(pub Uuid);

/// Middleware that generates a request ID and creates a request span.
///
/// Should be the outermost layer so the span covers everything below it.
pub async fn request_id_layer(mut request: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4();

    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %request.method(),
        path = %request.uri().path(),
    );

    request.extensions_mut().insert(RequestId(request_id));
    let start = Instant::now();

    async move {
        let response = next.run(request).await;
        tracing::debug!(
            status = response.status().as_u16(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Request completed"
        );
        response
    }
    .instrument(span)
    .await
}
