//! Admission endpoint.

use axum::body::Body;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Extension;
use http::header::{HeaderName, CONTENT_TYPE};

use crate::config::MAX_BODY_BYTES;
use crate::error::AppError;
use crate::middleware::{RequestId, REQUEST_ID_HEADER};
use crate::state::WebhookState;

/// Read the review, hand it to the mutation delegate once, and return its output as-is.
///
/// The response echoes the request ID so a review can be matched to this server's logs.
pub async fn mutate(
    State(state): State<WebhookState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    body: Body,
) -> Result<impl IntoResponse, AppError> {
    let payload = axum::body::to_bytes(body, MAX_BODY_BYTES).await?;
    tracing::debug!(%request_id, bytes = payload.len(), "Received admission review");

    let mutated = state.mutator.mutate(&payload, state.verbose).await?;

    Ok((
        [
            (CONTENT_TYPE, "application/json".to_string()),
            (HeaderName::from_static(REQUEST_ID_HEADER), request_id.to_string()),
        ],
        mutated,
    ))
}
