use std::sync::Arc;

use chatrelay_ai::SharedLlmClient;

/// Shared router state. Immutable; every connection clones what it needs.
#[derive(Clone)]
pub struct AppState {
    pub client: SharedLlmClient,
    pub greeting: Arc<str>,
}

impl AppState {
    pub fn new(client: SharedLlmClient, greeting: impl Into<Arc<str>>) -> Self {
        Self {
            client,
            greeting: greeting.into(),
        }
    }
}
