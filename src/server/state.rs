use std::sync::Arc;

use crate::relay::RelayResolver;

/// Shared state for the relay handlers.
#[derive(Clone)]
pub struct RelayState {
    pub resolver: Arc<RelayResolver>,
}

impl RelayState {
    pub fn new(resolver: RelayResolver) -> Self {
        Self {
            resolver: Arc::new(resolver),
        }
    }
}
