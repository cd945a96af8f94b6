//! Application state management

use std::sync::Arc;

use crate::config::Config;
use crate::service::StorageService;
use crate::storage::ObjectStore;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    service: StorageService,
}

impl AppState {
    /// Create the state around an already connected store
    pub fn new(config: Config, store: Arc<dyn ObjectStore>) -> Self {
        let service = StorageService::new(store, config.service_config());
        Self {
            inner: Arc::new(AppStateInner { config, service }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the storage service
    pub fn service(&self) -> &StorageService {
        &self.inner.service
    }
}
