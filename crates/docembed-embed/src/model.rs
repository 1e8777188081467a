//! Candle-backed sentence embedding backend.
//!
//! The model identifier is either a local directory (`~` and `$VAR` are
//! expanded) or a Hugging Face repo id downloaded with `hf-hub` into the HF
//! cache. Supported architectures are BERT and XLM-RoBERTa; token states are
//! mean-pooled under the attention mask.

use anyhow::{anyhow, bail, Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaModel};
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use docembed_core::config::expand_path;
use docembed_core::{BackendConfig, BackendFactory, EmbeddingBackend};

use crate::device::{resolve_device, select_device};
use crate::pool::{finish_vector, masked_mean};
use crate::progress::embedding_bar;
use crate::tokenize::{configure_truncation, pad_token_id, tokenize_batch};

const MAX_SEQ_LEN: usize = 512;
const SLOW_BATCH_MS: u128 = 2_000;

enum Encoder {
    Bert(BertModel),
    XlmRoberta(XLMRobertaModel),
}

enum Weights {
    Safetensors(PathBuf),
    Pickle(PathBuf),
}

struct ModelFiles {
    config: PathBuf,
    tokenizer: PathBuf,
    weights: Weights,
}

pub struct CandleBackend {
    encoder: Encoder,
    tokenizer: Tokenizer,
    device: Device,
    max_len: usize,
    pad_id: u32,
    hidden_size: usize,
    truncate_dim: Option<usize>,
}

impl CandleBackend {
    pub fn load(config: &BackendConfig) -> Result<Self> {
        let started = Instant::now();
        let component_device = resolve_device(config.device.clone());
        let device = select_device(&component_device)?;

        let token = match &config.token {
            Some(secret) => secret.resolve_value()?,
            None => None,
        };
        info!(model = %config.model, "loading embedding model");
        let files = fetch_model_files(&config.model, token)?;

        let raw_config: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(&files.config)
                .with_context(|| format!("read {}", files.config.display()))?,
        )
        .context("parse config.json")?;
        if raw_config.get("auto_map").is_some() && !config.trust_remote_code {
            bail!(
                "model '{}' declares custom code (auto_map); set trust_remote_code = true to load it anyway",
                config.model
            );
        }
        let model_type = raw_config
            .get("model_type")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("bert")
            .to_string();

        let mut tokenizer = Tokenizer::from_file(&files.tokenizer)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", files.tokenizer.display(), e))?;
        let pad_id = pad_token_id(&tokenizer);

        let tensors = load_weights(&files.weights, &device)?;
        let vb = VarBuilder::from_tensors(tensors, DType::F32, &device);

        let max_positions = raw_config
            .get("max_position_embeddings")
            .and_then(serde_json::Value::as_u64)
            .map_or(MAX_SEQ_LEN, |n| usize::try_from(n).unwrap_or(MAX_SEQ_LEN));

        let (encoder, hidden_size, max_len) = match model_type.as_str() {
            "xlm-roberta" | "roberta" => {
                let cfg: XLMRobertaConfig = serde_json::from_value(raw_config.clone()).context("parse xlm-roberta config")?;
                let hidden = cfg.hidden_size;
                // RoBERTa position ids start after the padding index
                let max_len = max_positions.saturating_sub(2).min(MAX_SEQ_LEN);
                (Encoder::XlmRoberta(XLMRobertaModel::new(&cfg, vb).context("init xlm-roberta model")?), hidden, max_len)
            }
            "bert" => {
                let cfg: BertConfig = serde_json::from_value(raw_config.clone()).context("parse bert config")?;
                let hidden = cfg.hidden_size;
                (Encoder::Bert(BertModel::load(vb, &cfg).context("init bert model")?), hidden, max_positions.min(MAX_SEQ_LEN))
            }
            other => bail!("unsupported model_type '{other}' (supported: bert, xlm-roberta)"),
        };

        configure_truncation(&mut tokenizer, max_len)?;

        if let Some(dim) = config.truncate_dim {
            if dim > hidden_size {
                warn!(truncate_dim = dim, hidden_size, "truncate_dim exceeds model dimension; vectors keep full size");
            }
        }

        info!(
            model = %config.model,
            model_type = %model_type,
            hidden_size,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "embedding model loaded"
        );
        Ok(Self { encoder, tokenizer, device, max_len, pad_id, hidden_size, truncate_dim: config.truncate_dim })
    }

    fn forward_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let batch = tokenize_batch(&self.tokenizer, texts, self.max_len, self.pad_id, &self.device)?;
        let hidden = match &self.encoder {
            Encoder::Bert(model) => model.forward(&batch.input_ids, &batch.token_type_ids, Some(&batch.attention_mask))?,
            Encoder::XlmRoberta(model) => {
                model.forward(&batch.input_ids, &batch.attention_mask, &batch.token_type_ids, None, None, None)?
            }
        };
        let pooled = masked_mean(&hidden, &batch.attention_mask)?;
        let rows: Vec<Vec<f32>> = pooled.to_device(&Device::Cpu)?.to_dtype(DType::F32)?.to_vec2()?;
        Ok(rows)
    }
}

impl EmbeddingBackend for CandleBackend {
    fn embed(&self, texts: &[String], batch_size: usize, show_progress: bool, normalize: bool) -> Result<Vec<Vec<f32>>> {
        let pb = embedding_bar(texts.len(), show_progress);
        let mut out = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(batch_size.max(1)) {
            let start = Instant::now();
            let mut vectors = self.forward_batch(chunk)?;
            for v in &mut vectors {
                finish_vector(v, self.truncate_dim, normalize);
            }
            let elapsed = start.elapsed().as_millis();
            if elapsed > SLOW_BATCH_MS {
                warn!(batch = chunk.len(), elapsed_ms = elapsed as u64, "slow embedding batch");
            } else {
                debug!(batch = chunk.len(), elapsed_ms = elapsed as u64, "embedded batch");
            }
            pb.inc(chunk.len() as u64);
            out.extend(vectors);
        }
        pb.finish_and_clear();
        Ok(out)
    }

    fn dim(&self) -> usize {
        self.truncate_dim.map_or(self.hidden_size, |d| d.min(self.hidden_size))
    }
}

/// Builds [`CandleBackend`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct CandleFactory;

impl BackendFactory for CandleFactory {
    fn create(&self, config: &BackendConfig) -> Result<Arc<dyn EmbeddingBackend>> {
        Ok(Arc::new(CandleBackend::load(config)?))
    }
}

fn fetch_model_files(model: &str, token: Option<String>) -> Result<ModelFiles> {
    let local = expand_path(model);
    if local.is_dir() {
        info!(path = %local.display(), "using local model directory");
        return local_model_files(&local);
    }

    let api = hf_hub::api::sync::ApiBuilder::new()
        .with_token(token)
        .with_progress(false)
        .build()
        .context("init hf-hub client")?;
    let repo = api.model(model.to_string());
    let config = repo.get("config.json").context("download config.json")?;
    let tokenizer = repo.get("tokenizer.json").context("download tokenizer.json")?;
    let weights = match repo.get("model.safetensors") {
        Ok(path) => Weights::Safetensors(path),
        Err(err) => {
            debug!(error = %err, "no model.safetensors, trying pytorch_model.bin");
            Weights::Pickle(repo.get("pytorch_model.bin").context("download model weights")?)
        }
    };
    Ok(ModelFiles { config, tokenizer, weights })
}

fn local_model_files(dir: &Path) -> Result<ModelFiles> {
    let config = dir.join("config.json");
    let tokenizer = dir.join("tokenizer.json");
    for required in [&config, &tokenizer] {
        if !required.exists() {
            bail!("missing {} in model directory", required.display());
        }
    }
    let safetensors = dir.join("model.safetensors");
    let pickle = dir.join("pytorch_model.bin");
    let weights = if safetensors.exists() {
        Weights::Safetensors(safetensors)
    } else if pickle.exists() {
        Weights::Pickle(pickle)
    } else {
        bail!("no model.safetensors or pytorch_model.bin in {}", dir.display());
    };
    Ok(ModelFiles { config, tokenizer, weights })
}

fn load_weights(weights: &Weights, device: &Device) -> Result<HashMap<String, Tensor>> {
    match weights {
        Weights::Safetensors(path) => candle_core::safetensors::load(path, device)
            .with_context(|| format!("load safetensors {}", path.display())),
        Weights::Pickle(path) => {
            let tensors = candle_core::pickle::read_all(path)
                .with_context(|| format!("load pickle weights {}", path.display()))?;
            tensors
                .into_iter()
                .map(|(name, t)| -> Result<(String, Tensor)> { Ok((name, t.to_device(device)?)) })
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn local_dir_prefers_safetensors() {
        let tmp = TempDir::new().unwrap();
        for name in ["config.json", "tokenizer.json", "model.safetensors", "pytorch_model.bin"] {
            std::fs::write(tmp.path().join(name), b"{}").unwrap();
        }
        let files = local_model_files(tmp.path()).unwrap();
        assert!(matches!(files.weights, Weights::Safetensors(_)));
    }

    #[test]
    fn local_dir_without_weights_is_rejected() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("config.json"), b"{}").unwrap();
        std::fs::write(tmp.path().join("tokenizer.json"), b"{}").unwrap();
        assert!(local_model_files(tmp.path()).is_err());
    }

    #[test]
    fn custom_code_requires_trust() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("config.json"),
            br#"{"model_type": "bert", "auto_map": {"AutoModel": "modeling.Custom"}}"#,
        )
        .unwrap();
        std::fs::write(tmp.path().join("tokenizer.json"), b"{}").unwrap();
        std::fs::write(tmp.path().join("model.safetensors"), b"").unwrap();

        let config = BackendConfig {
            model: tmp.path().to_string_lossy().to_string(),
            device: Some(docembed_core::ComponentDevice::from_single(docembed_core::Device::Cpu)),
            token: None,
            ..Default::default()
        };
        let err = CandleBackend::load(&config).err().expect("load must fail");
        assert!(err.to_string().contains("trust_remote_code"));
    }
}
