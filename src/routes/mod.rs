//! HTTP request dispatch.
//!
//! Two responders: `POST /mutate` hands the body to the mutation delegate, and
//! everything else is answered by the health responder. Request tracing is enabled via
//! middleware that tags each request with a unique ID.

pub mod health;
pub mod mutate;

use std::time::Duration;

use axum::{middleware, routing::post, Router};
use tower_http::timeout::RequestBodyTimeoutLayer;

use crate::middleware::request_id_layer;
use crate::state::WebhookState;

/// Creates the Axum router.
///
/// `read_timeout` bounds how long a client may take to deliver a request body; a
/// body that does not arrive in time is a read failure.
pub fn create_router(state: WebhookState, read_timeout: Duration) -> Router {
    Router::new()
        .route("/mutate", post(mutate::mutate))
        .fallback(health::root)
        .with_state(state)
        .layer(RequestBodyTimeoutLayer::new(read_timeout))
        .layer(middleware::from_fn(request_id_layer))
}
