//! Embeds a single string, e.g. a search query.

use std::sync::Arc;

use serde_json::{Map, Value};

use docembed_core::compose::wrap;
use docembed_core::{BackendFactory, Error, Result, TextEmbedderConfig};

use crate::cache::BackendCache;
use crate::device::resolve_device;
use crate::handle::{BackendHandle, HandleState};
use crate::{default_factory, record, telemetry};

pub const TEXT_EMBEDDER_TYPE: &str = "docembed_embed::TextEmbedder";
const COMPONENT: &str = "TextEmbedder";

#[derive(Debug)]
pub struct TextEmbedder {
    config: TextEmbedderConfig,
    handle: BackendHandle,
}

impl TextEmbedder {
    pub fn new(mut config: TextEmbedderConfig) -> Result<Self> {
        config.validate()?;
        config.backend.device = Some(resolve_device(config.backend.device.take()));
        let handle = BackendHandle::new(COMPONENT, default_factory(), BackendCache::global());
        Ok(Self { config, handle })
    }

    /// Replaces the backend factory. The cache is keyed by configuration only,
    /// so a snapshot already cached was built by whichever factory got there
    /// first and this factory is never consulted for it. Pair with
    /// [`with_cache`](Self::with_cache) to isolate a custom factory.
    #[must_use]
    pub fn with_factory(self, factory: Arc<dyn BackendFactory>) -> Self {
        Self { handle: self.handle.with_factory(factory), ..self }
    }

    #[must_use]
    pub fn with_cache(self, cache: Arc<BackendCache>) -> Self {
        Self { handle: self.handle.with_cache(cache), ..self }
    }

    pub fn config(&self) -> &TextEmbedderConfig {
        &self.config
    }

    pub fn state(&self) -> HandleState {
        self.handle.state()
    }

    pub fn telemetry_data(&self) -> Map<String, Value> {
        telemetry::model_data(&self.config.backend.model)
    }

    pub fn warm_up(&mut self) -> Result<()> {
        if self.handle.warm_up(&self.config.backend)? {
            telemetry::emit(COMPONENT, &self.telemetry_data());
        }
        Ok(())
    }

    pub fn run(&self, text: &str) -> Result<Vec<f32>> {
        if !self.handle.is_ready() {
            return Err(Error::NotReady { component: COMPONENT });
        }
        let texts = vec![wrap(&self.config.prefix, text, &self.config.suffix)];
        let mut embeddings = self.handle.embed(
            &texts,
            self.config.batch_size,
            self.config.progress_bar,
            self.config.normalize_embeddings,
        )?;
        if embeddings.len() != 1 {
            return Err(Error::LengthMismatch { expected: 1, actual: embeddings.len() });
        }
        Ok(embeddings.swap_remove(0))
    }

    /// Untyped entry point: `input` must be a JSON string.
    pub fn run_value(&self, input: Value) -> Result<Vec<f32>> {
        match input {
            Value::String(text) => self.run(&text),
            _ => Err(Error::InputShape(
                "TextEmbedder expects a string as input. \
                 In case you want to embed a list of Documents, please use the DocumentEmbedder."
                    .to_string(),
            )),
        }
    }

    pub fn to_config(&self) -> Result<Value> {
        record::to_record(TEXT_EMBEDDER_TYPE, &self.config)
    }

    pub fn from_config(value: Value) -> Result<Self> {
        let config: TextEmbedderConfig = record::from_record(TEXT_EMBEDDER_TYPE, value)?;
        Self::new(config)
    }
}
