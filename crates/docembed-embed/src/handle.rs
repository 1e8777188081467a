use std::fmt;
use std::sync::Arc;

use docembed_core::{BackendConfig, BackendFactory, EmbeddingBackend, Error, Result};

use crate::cache::BackendCache;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    Uninitialized,
    Ready,
}

/// Holds at most one backend for the lifetime of its owner.
///
/// The transition to `Ready` happens once. Later `warm_up` calls are no-ops
/// even when given a different configuration, and there is no way back to
/// `Uninitialized`.
pub struct BackendHandle {
    component: &'static str,
    factory: Arc<dyn BackendFactory>,
    cache: Arc<BackendCache>,
    backend: Option<Arc<dyn EmbeddingBackend>>,
}

impl BackendHandle {
    pub fn new(component: &'static str, factory: Arc<dyn BackendFactory>, cache: Arc<BackendCache>) -> Self {
        Self { component, factory, cache, backend: None }
    }

    /// Replaces the backend factory. The cache is keyed by configuration only,
    /// so a snapshot already cached was built by whichever factory got there
    /// first and this factory is never consulted for it. Pair with
    /// [`with_cache`](Self::with_cache) to isolate a custom factory.
    #[must_use]
    pub fn with_factory(self, factory: Arc<dyn BackendFactory>) -> Self {
        Self { factory, ..self }
    }

    #[must_use]
    pub fn with_cache(self, cache: Arc<BackendCache>) -> Self {
        Self { cache, ..self }
    }

    pub fn state(&self) -> HandleState {
        if self.backend.is_some() {
            HandleState::Ready
        } else {
            HandleState::Uninitialized
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state() == HandleState::Ready
    }

    /// Bind a backend built from `config`. Returns `true` when this call did
    /// the binding, `false` when the handle was already ready.
    pub fn warm_up(&mut self, config: &BackendConfig) -> Result<bool> {
        if self.backend.is_some() {
            return Ok(false);
        }
        let backend = self.cache.get_or_create(config, self.factory.as_ref())?;
        self.backend = Some(backend);
        Ok(true)
    }

    pub fn embed(&self, texts: &[String], batch_size: usize, show_progress: bool, normalize: bool) -> Result<Vec<Vec<f32>>> {
        let backend = self.backend.as_ref().ok_or(Error::NotReady { component: self.component })?;
        backend.embed(texts, batch_size, show_progress, normalize).map_err(Error::Backend)
    }

    pub fn backend(&self) -> Option<&Arc<dyn EmbeddingBackend>> {
        self.backend.as_ref()
    }
}

impl fmt::Debug for BackendHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendHandle")
            .field("component", &self.component)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
