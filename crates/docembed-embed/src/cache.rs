//! Process-wide backend cache keyed by [`BackendKey`].
//!
//! Embedders whose backend configuration snapshots are equal share one
//! backend instance. Construction happens under the cache lock, so concurrent
//! warm-ups of equal snapshots build the model once.
//!
//! The key does not include the factory: within one cache, the first factory
//! to build a key wins.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use docembed_core::{BackendConfig, BackendFactory, BackendKey, EmbeddingBackend, Error, Result};

#[derive(Default)]
pub struct BackendCache {
    entries: Mutex<HashMap<BackendKey, Arc<dyn EmbeddingBackend>>>,
}

impl BackendCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn global() -> Arc<BackendCache> {
        static GLOBAL: OnceLock<Arc<BackendCache>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(BackendCache::new())))
    }

    pub fn get_or_create(&self, config: &BackendConfig, factory: &dyn BackendFactory) -> Result<Arc<dyn EmbeddingBackend>> {
        let key = config.key();
        // A panic inside a factory leaves the map itself consistent
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(backend) = entries.get(&key) {
            tracing::debug!(model = %key.model, device = %key.device, "reusing cached embedding backend");
            return Ok(Arc::clone(backend));
        }
        let backend = factory
            .create(config)
            .map_err(|source| Error::Load { model: config.model.clone(), source })?;
        entries.insert(key, Arc::clone(&backend));
        Ok(backend)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
