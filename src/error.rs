use axum::response::{IntoResponse, Response};
use http::StatusCode;

use crate::config::SERVER_ERROR_BODY;
use crate::mutate::MutateError;

/// Per-request failure.
///
/// Every variant maps to the same generic 500; the detail only reaches the log.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Failed to read request body: {0}")]
    BodyRead(#[from] axum::Error),

    #[error("Mutation failed: {0}")]
    Mutate(#[from] MutateError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "Request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, SERVER_ERROR_BODY).into_response()
    }
}
