use std::sync::Arc;

use crate::config::BackendConfig;

/// Turns a batch of strings into a batch of vectors.
///
/// Implementations must return exactly one vector per input, in input order.
/// `batch_size` only controls internal chunking. When `normalize` is set every
/// returned vector has unit L2 norm.
pub trait EmbeddingBackend: Send + Sync {
    fn embed(
        &self,
        texts: &[String],
        batch_size: usize,
        show_progress: bool,
        normalize: bool,
    ) -> anyhow::Result<Vec<Vec<f32>>>;

    /// Output dimensionality, after any truncation.
    fn dim(&self) -> usize;
}

/// Builds backends from a configuration snapshot.
pub trait BackendFactory: Send + Sync {
    fn create(&self, config: &BackendConfig) -> anyhow::Result<Arc<dyn EmbeddingBackend>>;
}
