//! Deterministic hashing backend for tests and development.
//!
//! Selected by `DOCEMBED_USE_FAKE_EMBEDDINGS=1`. Each whitespace token is
//! hashed into one of `dim` buckets, so equal texts get equal vectors and no
//! model files are needed.

use anyhow::Result;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use twox_hash::XxHash64;

use docembed_core::{BackendConfig, BackendFactory, EmbeddingBackend};

use crate::pool::finish_vector;
use crate::progress::embedding_bar;

pub const FAKE_EMBEDDINGS_ENV: &str = "DOCEMBED_USE_FAKE_EMBEDDINGS";
pub const FAKE_DIM: usize = 384;

pub struct FakeBackend {
    dim: usize,
    truncate_dim: Option<usize>,
}

impl FakeBackend {
    pub fn new(dim: usize, truncate_dim: Option<usize>) -> Self {
        Self { dim: dim.max(1), truncate_dim }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for (i, token) in text.split_whitespace().enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val + (i as f32 % 3.0) * 0.01;
        }
        v
    }
}

impl EmbeddingBackend for FakeBackend {
    fn embed(&self, texts: &[String], batch_size: usize, show_progress: bool, normalize: bool) -> Result<Vec<Vec<f32>>> {
        let pb = embedding_bar(texts.len(), show_progress);
        let mut out = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(batch_size.max(1)) {
            for text in chunk {
                let mut v = self.embed_one(text);
                finish_vector(&mut v, self.truncate_dim, normalize);
                out.push(v);
            }
            pb.inc(chunk.len() as u64);
        }
        pb.finish_and_clear();
        Ok(out)
    }

    fn dim(&self) -> usize {
        self.truncate_dim.map_or(self.dim, |d| d.min(self.dim))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FakeFactory {
    pub dim: usize,
}

impl Default for FakeFactory {
    fn default() -> Self {
        Self { dim: FAKE_DIM }
    }
}

impl BackendFactory for FakeFactory {
    fn create(&self, config: &BackendConfig) -> Result<Arc<dyn EmbeddingBackend>> {
        tracing::info!(model = %config.model, dim = self.dim, "using fake embedding backend");
        Ok(Arc::new(FakeBackend::new(self.dim, config.truncate_dim)))
    }
}

pub fn fake_embeddings_enabled() -> bool {
    std::env::var(FAKE_EMBEDDINGS_ENV)
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}
