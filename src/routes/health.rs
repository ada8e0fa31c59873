//! Health responder for orchestrator liveness and readiness probes.
//!
//! Answers 200 for any method and any path not claimed by another route. It touches no
//! state, so it keeps answering while the process can serve at all.

use crate::config::HEALTH_BODY;

/// Health check handler.
pub async fn root() -> &'static str {
    HEALTH_BODY
}
