//! Document and text embedders over a lazily-loaded, process-wide cached
//! embedding backend.
//!
//! Respects `DOCEMBED_USE_FAKE_EMBEDDINGS=1` to switch the default factory to
//! the hashing backend for fast, deterministic outputs in tests and development.

pub mod cache;
pub mod device;
pub mod document;
pub mod fake;
pub mod handle;
pub mod model;
pub mod pool;
pub mod progress;
pub mod record;
pub mod telemetry;
pub mod text;
pub mod tokenize;

use std::sync::Arc;

use docembed_core::BackendFactory;

pub use cache::BackendCache;
pub use device::{default_device, resolve_device};
pub use document::DocumentEmbedder;
pub use fake::{FakeBackend, FakeFactory};
pub use handle::{BackendHandle, HandleState};
pub use model::{CandleBackend, CandleFactory};
pub use pool::masked_mean;
pub use text::TextEmbedder;

/// Factory used by embedders unless one is supplied explicitly.
pub fn default_factory() -> Arc<dyn BackendFactory> {
    if fake::fake_embeddings_enabled() {
        return Arc::new(FakeFactory::default());
    }
    Arc::new(CandleFactory)
}
