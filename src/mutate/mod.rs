//! Mutation capability.
//!
//! The dispatcher treats admission-review transformation as an opaque function from
//! request bytes to response bytes. `Mutator` is that seam; `AllowAll` is the default
//! implementation shipped with the binary.

mod review;

pub use review::AllowAll;

use async_trait::async_trait;

/// Mutation delegate error
#[derive(Debug, thiserror::Error)]
pub enum MutateError {
    #[error("Invalid admission review: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Admission review has no request")]
    MissingRequest,

    #[error("Mutation failed: {0}")]
    Failed(String),
}

/// Transforms an admission review payload.
///
/// Implementations must be safe to call concurrently; the dispatcher shares a single
/// instance across all requests.
#[async_trait]
pub trait Mutator: Send + Sync {
    async fn mutate(&self, payload: &[u8], verbose: bool) -> Result<Vec<u8>, MutateError>;
}
