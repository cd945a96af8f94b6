//! Bucket and object operations
//!
//! [`StorageService`] sits between the HTTP routes and an [`ObjectStore`].
//! It normalizes listings into [`Page`]s of domain entries and runs the
//! multi-step workflows (recursive deletes, bounded uploads). Backend errors
//! are classified here and nowhere else.

mod lifecycle;
mod listing;
mod types;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use crate::config::DEFAULT_MAX_UPLOAD_BYTES;
use crate::storage::{ObjectStore, MAX_DELETE_BATCH};

pub use types::*;

/// Key delimiter used for directory semantics
pub const DELIMITER: &str = "/";

/// Service settings, passed in explicitly by the caller
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Uploads larger than this are rejected before reaching the backend
    pub max_upload_bytes: u64,
    /// Keys per `DeleteObjects` call; capped at [`MAX_DELETE_BATCH`]
    pub delete_batch_size: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            delete_batch_size: MAX_DELETE_BATCH,
        }
    }
}

/// Storage operations shared by all request handlers
#[derive(Clone)]
pub struct StorageService {
    inner: Arc<ServiceInner>,
}

struct ServiceInner {
    store: Arc<dyn ObjectStore>,
    config: ServiceConfig,
}

impl StorageService {
    pub fn new(store: Arc<dyn ObjectStore>, mut config: ServiceConfig) -> Self {
        config.delete_batch_size = config.delete_batch_size.clamp(1, MAX_DELETE_BATCH);
        Self {
            inner: Arc::new(ServiceInner { store, config }),
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.inner.config
    }

    fn store(&self) -> &dyn ObjectStore {
        self.inner.store.as_ref()
    }
}

impl std::fmt::Debug for StorageService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageService")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

/// `path` with a trailing delimiter, or empty when `path` is empty
fn directory_prefix(path: &str) -> String {
    if path.is_empty() || path.ends_with(DELIMITER) {
        path.to_string()
    } else {
        format!("{}{}", path, DELIMITER)
    }
}
