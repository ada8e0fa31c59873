//! Shared state for request handlers.

use std::sync::Arc;

use crate::mutate::Mutator;

/// Read-only state shared by every request.
#[derive(Clone)]
pub struct WebhookState {
    pub mutator: Arc<dyn Mutator>,
    pub verbose: bool,
}

impl WebhookState {
    pub fn new(mutator: Arc<dyn Mutator>, verbose: bool) -> Self {
        Self { mutator, verbose }
    }
}
