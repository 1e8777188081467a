//! Domain types shared by the embedders.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::hash::Hasher;
use twox_hash::XxHash64;

pub type Meta = Map<String, Value>;
pub type Embedding = Vec<f32>;

/// A text-bearing record that can receive an embedding.
///
/// - `id`: stable identity; derived from content + meta when not supplied
/// - `content`: the text payload, may be absent
/// - `meta`: arbitrary metadata; only fields selected by configuration are embedded
/// - `embedding`: written in place by `DocumentEmbedder::run`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Document {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub meta: Meta,
    #[serde(default)]
    pub embedding: Option<Embedding>,
}

impl Document {
    pub fn new(content: impl Into<String>) -> Self {
        Self::from_parts(Some(content.into()), Meta::new())
    }

    pub fn from_parts(content: Option<String>, meta: Meta) -> Self {
        let id = content_id(content.as_deref(), &meta);
        Self { id, content, meta, embedding: None }
    }

    /// Adds a metadata entry and re-derives the id.
    #[must_use]
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self.id = content_id(self.content.as_deref(), &self.meta);
        self
    }

    /// Fills in a missing id; documents read from JSON may omit it.
    pub fn ensure_id(&mut self) {
        if self.id.is_empty() {
            self.id = content_id(self.content.as_deref(), &self.meta);
        }
    }
}

/// Keys that mark a JSON object as a document; `id` alone does not.
pub const DOCUMENT_FIELDS: [&str; 3] = ["content", "meta", "embedding"];

fn content_id(content: Option<&str>, meta: &Meta) -> String {
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(content.unwrap_or_default().as_bytes());
    hasher.write_u8(0xff);
    // serde_json::Map keeps keys sorted unless preserve_order is enabled
    hasher.write(Value::Object(meta.clone()).to_string().as_bytes());
    format!("{:016x}", hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn id_depends_on_content_and_meta() {
        let a = Document::new("hello");
        let b = Document::new("hello");
        let c = Document::new("hello").with_meta("lang", "en");
        assert_eq!(a.id, b.id);
        assert_ne!(a.id, c.id);
        assert_eq!(a.id.len(), 16);
    }

    #[test]
    fn deserializes_with_missing_fields() {
        let mut doc: Document = serde_json::from_value(json!({"content": "x"})).unwrap();
        assert!(doc.id.is_empty());
        assert!(doc.meta.is_empty());
        assert!(doc.embedding.is_none());
        doc.ensure_id();
        assert_eq!(doc.id, Document::new("x").id);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(serde_json::from_value::<Document>(json!({"text": "hello"})).is_err());
        assert!(serde_json::from_value::<Document>(json!({"id": "a", "content": "x", "score": 1})).is_err());
    }
}
