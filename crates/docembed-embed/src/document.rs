//! Embeds documents: composes each document's text from its content and
//! selected metadata, embeds the batch, and writes vectors back in order.
//!
//! ```no_run
//! use docembed_core::{Document, DocumentEmbedderConfig};
//! use docembed_embed::DocumentEmbedder;
//!
//! let mut embedder = DocumentEmbedder::new(DocumentEmbedderConfig::default())?;
//! embedder.warm_up()?;
//! let mut docs = vec![Document::new("I love pizza!")];
//! embedder.run(&mut docs)?;
//! println!("{:?}", docs[0].embedding);
//! # Ok::<(), docembed_core::Error>(())
//! ```

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::debug;

use docembed_core::types::DOCUMENT_FIELDS;
use docembed_core::{BackendFactory, Document, DocumentEmbedderConfig, Error, Result, TextComposer};

use crate::cache::BackendCache;
use crate::device::resolve_device;
use crate::handle::{BackendHandle, HandleState};
use crate::{default_factory, record, telemetry};

pub const DOCUMENT_EMBEDDER_TYPE: &str = "docembed_embed::DocumentEmbedder";
const COMPONENT: &str = "DocumentEmbedder";

#[derive(Debug)]
pub struct DocumentEmbedder {
    config: DocumentEmbedderConfig,
    handle: BackendHandle,
}

impl DocumentEmbedder {
    /// Validates the config and resolves the device; the model is not loaded
    /// until [`warm_up`](Self::warm_up).
    pub fn new(mut config: DocumentEmbedderConfig) -> Result<Self> {
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

    pub fn config(&self) -> &DocumentEmbedderConfig {
        &self.config
    }

    /// Mutable access to the configuration.
    ///
    /// Composition and call options (prefix, batch size, ...) take effect on
    /// the next `run`. Backend fields (model, device, token, trust flag,
    /// truncation) do not: once warmed up, the backend is never rebuilt.
    pub fn config_mut(&mut self) -> &mut DocumentEmbedderConfig {
        &mut self.config
    }

    pub fn state(&self) -> HandleState {
        self.handle.state()
    }

    pub fn telemetry_data(&self) -> Map<String, Value> {
        telemetry::model_data(&self.config.backend.model)
    }

    /// Load the backend. Idempotent.
    pub fn warm_up(&mut self) -> Result<()> {
        if self.handle.warm_up(&self.config.backend)? {
            telemetry::emit(COMPONENT, &self.telemetry_data());
        }
        Ok(())
    }

    /// Embed `documents` in place and hand the same slice back.
    ///
    /// Vectors are assigned only after the backend returns all of them; on
    /// any error no document is modified.
    pub fn run<'a>(&self, documents: &'a mut [Document]) -> Result<&'a mut [Document]> {
        if !self.handle.is_ready() {
            return Err(Error::NotReady { component: COMPONENT });
        }

        let texts = TextComposer::from_config(&self.config).compose_all(documents);
        debug!(documents = texts.len(), batch_size = self.config.batch_size, "embedding documents");

        let embeddings = self.handle.embed(
            &texts,
            self.config.batch_size,
            self.config.progress_bar,
            self.config.normalize_embeddings,
        )?;
        if embeddings.len() != documents.len() {
            return Err(Error::LengthMismatch { expected: documents.len(), actual: embeddings.len() });
        }

        for (doc, embedding) in documents.iter_mut().zip(embeddings) {
            doc.embedding = Some(embedding);
        }
        Ok(documents)
    }

    /// Checks that `input` is a JSON array of document objects and reads it.
    /// Needs no backend, so callers can reject bad input before loading a model.
    pub fn parse_input(input: Value) -> Result<Vec<Document>> {
        parse_documents(input)
    }

    /// Untyped entry point: `input` must be a JSON array of document objects.
    pub fn run_value(&self, input: Value) -> Result<Vec<Document>> {
        let mut documents = parse_documents(input)?;
        self.run(&mut documents)?;
        Ok(documents)
    }

    pub fn to_config(&self) -> Result<Value> {
        record::to_record(DOCUMENT_EMBEDDER_TYPE, &self.config)
    }

    /// Rebuild an embedder from [`to_config`](Self::to_config) output. The
    /// credential is restored as a recipe and not resolved here.
    pub fn from_config(value: Value) -> Result<Self> {
        let config: DocumentEmbedderConfig = record::from_record(DOCUMENT_EMBEDDER_TYPE, value)?;
        Self::new(config)
    }
}

fn shape_error(detail: Option<String>) -> Error {
    let mut msg = String::from(
        "DocumentEmbedder expects a list of Documents as input. \
         In case you want to embed a string, please use the TextEmbedder.",
    );
    if let Some(detail) = detail {
        msg.push_str(&format!(" ({detail})"));
    }
    Error::InputShape(msg)
}

fn parse_documents(input: Value) -> Result<Vec<Document>> {
    let Value::Array(items) = input else {
        return Err(shape_error(Some("input is not a list".to_string())));
    };
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            let Some(fields) = item.as_object() else {
                return Err(shape_error(Some(format!("element {i} is not a document"))));
            };
            if !DOCUMENT_FIELDS.iter().any(|key| fields.contains_key(*key)) {
                return Err(shape_error(Some(format!("element {i} has none of {DOCUMENT_FIELDS:?}"))));
            }
            let mut doc: Document = serde_json::from_value(item)
                .map_err(|e| shape_error(Some(format!("element {i}: {e}"))))?;
            doc.ensure_id();
            Ok(doc)
        })
        .collect()
}
