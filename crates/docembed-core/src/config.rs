//! Embedder configuration and the layered settings loader.
//!
//! Settings merge `docembed.toml` + `docembed.<env>.toml` + `DOCEMBED_*` env
//! vars (`__` separates nested keys, e.g.
//! `DOCEMBED_DOCUMENT_EMBEDDER__BATCH_SIZE=64`). The environment name comes
//! from `RUST_ENV` and defaults to `dev`.
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::device::ComponentDevice;
use crate::error::{Error, Result};
use crate::secret::Secret;

pub const DEFAULT_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";
pub const DOCUMENT_EMBEDDER_SECTION: &str = "document_embedder";
pub const TEXT_EMBEDDER_SECTION: &str = "text_embedder";

/// The part of the configuration a backend is built from.
///
/// A missing `token` falls back to the default Hugging Face env lookup; an
/// explicit `null` means no credential at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub model: String,
    pub device: Option<ComponentDevice>,
    pub token: Option<Secret>,
    pub trust_remote_code: bool,
    pub truncate_dim: Option<usize>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            device: None,
            token: Some(Secret::default()),
            trust_remote_code: false,
            truncate_dim: None,
        }
    }
}

/// Cache identity of a backend: two configs with equal keys share one model.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BackendKey {
    pub model: String,
    pub device: String,
    pub credential: Option<String>,
    pub trust_remote_code: bool,
    pub truncate_dim: Option<usize>,
}

impl BackendConfig {
    pub fn key(&self) -> BackendKey {
        BackendKey {
            model: self.model.clone(),
            device: self.device.as_ref().map_or_else(|| "auto".to_string(), ToString::to_string),
            credential: self.token.as_ref().map(Secret::identity),
            trust_remote_code: self.trust_remote_code,
            truncate_dim: self.truncate_dim,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(Error::InvalidConfig("model must not be empty".to_string()));
        }
        if self.truncate_dim == Some(0) {
            return Err(Error::InvalidConfig("truncate_dim must be positive when set".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentEmbedderConfig {
    #[serde(flatten)]
    pub backend: BackendConfig,
    /// Prepended to every composed text, e.g. an instruction for E5/bge models.
    pub prefix: String,
    pub suffix: String,
    pub batch_size: usize,
    pub progress_bar: bool,
    pub normalize_embeddings: bool,
    /// Metadata fields embedded ahead of the content, in this order.
    pub meta_fields_to_embed: Vec<String>,
    pub embedding_separator: String,
}

impl Default for DocumentEmbedderConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            prefix: String::new(),
            suffix: String::new(),
            batch_size: 32,
            progress_bar: true,
            normalize_embeddings: false,
            meta_fields_to_embed: Vec::new(),
            embedding_separator: "\n".to_string(),
        }
    }
}

impl DocumentEmbedderConfig {
    pub fn validate(&self) -> Result<()> {
        self.backend.validate()?;
        validate_batch_size(self.batch_size)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextEmbedderConfig {
    #[serde(flatten)]
    pub backend: BackendConfig,
    pub prefix: String,
    pub suffix: String,
    pub batch_size: usize,
    pub progress_bar: bool,
    pub normalize_embeddings: bool,
}

impl Default for TextEmbedderConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            prefix: String::new(),
            suffix: String::new(),
            batch_size: 32,
            progress_bar: true,
            normalize_embeddings: false,
        }
    }
}

impl TextEmbedderConfig {
    pub fn validate(&self) -> Result<()> {
        self.backend.validate()?;
        validate_batch_size(self.batch_size)
    }
}

fn validate_batch_size(batch_size: usize) -> Result<()> {
    if batch_size == 0 {
        return Err(Error::InvalidConfig("batch_size must be a positive integer".to_string()));
    }
    Ok(())
}

pub struct Settings {
    figment: Figment,
}

impl Settings {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("docembed.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("docembed.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("docembed.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("docembed.test.toml")),
            other => tracing::debug!(env = other, "no environment-specific config file for this environment"),
        }
        figment = figment.merge(Env::prefixed("DOCEMBED_").split("__"));

        Ok(Self { figment })
    }

    /// Settings from one explicit file, still overridable by `DOCEMBED_*` vars.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::InvalidConfig(format!("config file not found: {}", path.display())));
        }
        let figment = Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("DOCEMBED_").split("__"));
        Ok(Self { figment })
    }

    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("Failed to get '{key}': {e}")))
    }

    pub fn document_embedder(&self) -> Result<DocumentEmbedderConfig> {
        let config: DocumentEmbedderConfig = self.section(DOCUMENT_EMBEDDER_SECTION)?;
        config.validate()?;
        Ok(config)
    }

    pub fn text_embedder(&self) -> Result<TextEmbedderConfig> {
        let config: TextEmbedderConfig = self.section(TEXT_EMBEDDER_SECTION)?;
        config.validate()?;
        Ok(config)
    }

    fn section<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned + Default,
    {
        if self.figment.contains(key) {
            self.get(key)
        } else {
            Ok(T::default())
        }
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::Device;
    use serde_json::json;

    #[test]
    fn defaults_match_documented_values() {
        let c = DocumentEmbedderConfig::default();
        assert_eq!(c.backend.model, DEFAULT_MODEL);
        assert_eq!(c.batch_size, 32);
        assert!(c.progress_bar);
        assert!(!c.normalize_embeddings);
        assert_eq!(c.embedding_separator, "\n");
        assert!(c.meta_fields_to_embed.is_empty());
        assert_eq!(c.backend.token, Some(Secret::default()));
    }

    #[test]
    fn serializes_flat() {
        let mut c = DocumentEmbedderConfig::default();
        c.backend.device = Some(ComponentDevice::from_single(Device::Cpu));
        let value = serde_json::to_value(&c).unwrap();
        assert_eq!(value["model"], json!(DEFAULT_MODEL));
        assert_eq!(value["device"], json!({"type": "single", "device": "cpu"}));
        assert_eq!(value["token"]["type"], json!("env_var"));
        assert_eq!(value["batch_size"], json!(32));
        assert!(value.get("backend").is_none());
    }

    #[test]
    fn missing_token_is_default_but_null_token_is_none() {
        let missing: DocumentEmbedderConfig = serde_json::from_value(json!({"model": "m"})).unwrap();
        assert_eq!(missing.backend.token, Some(Secret::default()));

        let null: DocumentEmbedderConfig = serde_json::from_value(json!({"model": "m", "token": null})).unwrap();
        assert_eq!(null.backend.token, None);
    }

    #[test]
    fn validate_rejects_zero_batch_and_truncation() {
        let mut c = DocumentEmbedderConfig { batch_size: 0, ..Default::default() };
        assert!(c.validate().is_err());
        c.batch_size = 8;
        c.backend.truncate_dim = Some(0);
        assert!(c.validate().is_err());
        c.backend.truncate_dim = Some(128);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn key_depends_on_snapshot_fields_only() {
        let a = BackendConfig::default();
        let mut b = a.clone();
        assert_eq!(a.key(), b.key());
        b.truncate_dim = Some(64);
        assert_ne!(a.key(), b.key());
        let mut c = a.clone();
        c.token = Some(Secret::from_token("hf_abc"));
        assert_ne!(a.key(), c.key());
        assert!(!format!("{:?}", c.key()).contains("hf_abc"));
    }

    #[test]
    fn expand_path_handles_env_vars() {
        std::env::set_var("DOCEMBED_TEST_MODEL_ROOT", "/opt/models");
        assert_eq!(expand_path("$DOCEMBED_TEST_MODEL_ROOT/bge"), PathBuf::from("/opt/models/bge"));
        assert_eq!(expand_path("relative/dir"), PathBuf::from("relative/dir"));
    }
}
