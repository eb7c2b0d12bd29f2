use std::sync::Arc;

use crate::config::Config;
use crate::realm::Realm;

/// Shared application state passed to all handlers via axum State extractor.
///
/// The realm is an instance owned here, not ambient global state: several
/// independent servers can coexist in one process and tests build their own.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration, immutable once loaded
    pub config: Arc<Config>,
    /// Registry of connected clients and their offline buffers
    pub realm: Arc<Realm>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let realm = Arc::new(Realm::from_config(&config));
        Self {
            config: Arc::new(config),
            realm,
        }
    }
}
