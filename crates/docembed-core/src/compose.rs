//! Builds the exact string handed to the backend for each document.

use serde_json::Value;

use crate::config::DocumentEmbedderConfig;
use crate::types::Document;

/// Composition settings borrowed from an embedder config.
#[derive(Debug, Clone, Copy)]
pub struct TextComposer<'a> {
    pub prefix: &'a str,
    pub suffix: &'a str,
    pub meta_fields_to_embed: &'a [String],
    pub embedding_separator: &'a str,
}

impl<'a> TextComposer<'a> {
    pub fn from_config(config: &'a DocumentEmbedderConfig) -> Self {
        Self {
            prefix: &config.prefix,
            suffix: &config.suffix,
            meta_fields_to_embed: &config.meta_fields_to_embed,
            embedding_separator: &config.embedding_separator,
        }
    }

    /// `prefix + join(sep, [selected meta values..., content]) + suffix`.
    ///
    /// A selected metadata field is included only when present and truthy.
    /// A present-but-falsy value (`0`, `""`, `false`, `null`, `[]`, `{}`) is
    /// silently omitted, indistinguishable from absence.
    pub fn compose(&self, document: &Document) -> String {
        let mut parts: Vec<String> = self
            .meta_fields_to_embed
            .iter()
            .filter_map(|key| document.meta.get(key))
            .filter(|value| is_truthy(value))
            .map(render_value)
            .collect();
        parts.push(document.content.clone().unwrap_or_default());
        wrap(self.prefix, &parts.join(self.embedding_separator), self.suffix)
    }

    pub fn compose_all(&self, documents: &[Document]) -> Vec<String> {
        documents.iter().map(|doc| self.compose(doc)).collect()
    }
}

pub fn wrap(prefix: &str, text: &str, suffix: &str) -> String {
    let mut out = String::with_capacity(prefix.len() + text.len() + suffix.len());
    out.push_str(prefix);
    out.push_str(text);
    out.push_str(suffix);
    out
}

pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Strings verbatim, everything else as compact JSON (`true`, `["a","b"]`).
/// This is not Python's `str()` form (`True`, `['a', 'b']`), so composed text
/// for non-string metadata differs from what Python pipelines produce.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn composer_config(fields: &[&str]) -> DocumentEmbedderConfig {
        DocumentEmbedderConfig {
            prefix: "Q: ".to_string(),
            suffix: " /Q".to_string(),
            meta_fields_to_embed: fields.iter().map(ToString::to_string).collect(),
            embedding_separator: "\n".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn falsy_meta_is_omitted() {
        let config = composer_config(&["lang", "rating"]);
        let doc = Document::new("I love pizza!").with_meta("lang", "en").with_meta("rating", 0);
        let text = TextComposer::from_config(&config).compose(&doc);
        assert_eq!(text, "Q: en\nI love pizza! /Q");
    }

    #[test]
    fn meta_order_follows_configuration() {
        let config = composer_config(&["topic", "lang", "missing"]);
        let doc = Document::new("body")
            .with_meta("lang", "de")
            .with_meta("topic", "food")
            .with_meta("unused", "x");
        let text = TextComposer::from_config(&config).compose(&doc);
        assert_eq!(text, "Q: food\nde\nbody /Q");
    }

    #[test]
    fn absent_content_becomes_empty_string() {
        let config = DocumentEmbedderConfig {
            meta_fields_to_embed: vec!["title".to_string()],
            embedding_separator: " | ".to_string(),
            ..Default::default()
        };
        let doc = Document::from_parts(None, Default::default()).with_meta("title", "Intro");
        assert_eq!(TextComposer::from_config(&config).compose(&doc), "Intro | ");

        let bare = Document::from_parts(None, Default::default());
        assert_eq!(TextComposer::from_config(&config).compose(&bare), "");
    }

    #[test]
    fn truthiness_rules() {
        for v in [json!(null), json!(false), json!(0), json!(0.0), json!(""), json!([]), json!({})] {
            assert!(!is_truthy(&v), "{v} should be falsy");
        }
        for v in [json!(true), json!(-1), json!(0.5), json!(" "), json!([0]), json!({"a": null})] {
            assert!(is_truthy(&v), "{v} should be truthy");
        }
    }

    #[test]
    fn non_string_values_are_rendered() {
        let config = DocumentEmbedderConfig {
            meta_fields_to_embed: vec!["year".to_string(), "tags".to_string(), "ok".to_string()],
            embedding_separator: ";".to_string(),
            ..Default::default()
        };
        let doc = Document::new("c")
            .with_meta("year", 2024)
            .with_meta("tags", json!(["a", "b"]))
            .with_meta("ok", true);
        assert_eq!(TextComposer::from_config(&config).compose(&doc), "2024;[\"a\",\"b\"];true;c");
    }
}
