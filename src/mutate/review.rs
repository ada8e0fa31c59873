//! Default mutator: admit everything, patch nothing.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{MutateError, Mutator};

const DEFAULT_API_VERSION: &str = "admission.k8s.io/v1";
const REVIEW_KIND: &str = "AdmissionReview";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReviewRequest {
    api_version: Option<String>,
    request: Option<RequestInfo>,
}

#[derive(Debug, Deserialize)]
struct RequestInfo {
    uid: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReviewResponse {
    api_version: String,
    kind: &'static str,
    response: ResponseInfo,
}

#[derive(Debug, Serialize)]
struct ResponseInfo {
    uid: String,
    allowed: bool,
}

/// Answers every admission review with `allowed: true` and no patch.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

#[async_trait]
impl Mutator for AllowAll {
    async fn mutate(&self, payload: &[u8], verbose: bool) -> Result<Vec<u8>, MutateError> {
        let review: ReviewRequest = serde_json::from_slice(payload)?;
        let request = review.request.ok_or(MutateError::MissingRequest)?;

        let response = ReviewResponse {
            api_version: review
                .api_version
                .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
            kind: REVIEW_KIND,
            response: ResponseInfo {
                uid: request.uid,
                allowed: true,
            },
        };
        let body = serde_json::to_vec(&response)?;

        if verbose {
            tracing::info!(
                request = %String::from_utf8_lossy(payload),
                response = %String::from_utf8_lossy(&body),
                "Admission review processed"
            );
        } else {
            tracing::debug!(uid = %response.response.uid, "Admission review processed");
        }

        Ok(body)
    }
}
