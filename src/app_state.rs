use std::sync::Arc;

use crate::services::{blueprints::BlueprintService, cache::SpotCache};
use crate::store::KvStore;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<KvStore>,
    pub cache: Arc<SpotCache>,
    pub blueprints: Arc<BlueprintService>,
}

impl AppState {
    pub fn new(store: Arc<KvStore>, cache: Arc<SpotCache>, blueprints: BlueprintService) -> Self {
        Self {
            store,
            cache,
            blueprints: Arc::new(blueprints),
        }
    }
}
