use anyhow::{anyhow, Result};
use candle_core::{DType, Device, Tensor};
use tokenizers::{Tokenizer, TruncationParams};

pub struct TokenizedBatch {
    pub input_ids: Tensor,
    pub attention_mask: Tensor,
    pub token_type_ids: Tensor,
}

/// Cap encodings at `max_len` tokens inside the tokenizer so that the
/// post-processor still appends `[SEP]` / `</s>` after truncation. A tighter
/// limit already present in tokenizer.json is kept.
pub fn configure_truncation(tokenizer: &mut Tokenizer, max_len: usize) -> Result<()> {
    let params = match tokenizer.get_truncation() {
        Some(existing) => TruncationParams { max_length: existing.max_length.min(max_len), ..existing.clone() },
        None => TruncationParams { max_length: max_len, ..Default::default() },
    };
    tokenizer
        .with_truncation(Some(params))
        .map_err(|e| anyhow!("configure tokenizer truncation: {}", e))?;
    Ok(())
}

/// Encode `texts` and right-pad to the longest. Truncation is expected to be
/// set up by [`configure_truncation`]; `max_len` is only a hard cap here.
pub fn tokenize_batch(
    tokenizer: &Tokenizer,
    texts: &[String],
    max_len: usize,
    pad_id: u32,
    device: &Device,
) -> Result<TokenizedBatch> {
    let encodings = tokenizer
        .encode_batch(texts.to_vec(), true)
        .map_err(|e| anyhow!("Tokenization failed: {}", e))?;

    let seq_len = encodings
        .iter()
        .map(|e| e.get_ids().len().min(max_len))
        .max()
        .unwrap_or(0)
        .max(1);
    let batch = encodings.len();

    let mut ids: Vec<u32> = Vec::with_capacity(batch * seq_len);
    let mut mask: Vec<u32> = Vec::with_capacity(batch * seq_len);
    for enc in &encodings {
        let n = enc.get_ids().len().min(seq_len);
        ids.extend_from_slice(&enc.get_ids()[..n]);
        mask.extend_from_slice(&enc.get_attention_mask()[..n]);
        let pad = seq_len - n;
        ids.extend(std::iter::repeat(pad_id).take(pad));
        mask.extend(std::iter::repeat(0).take(pad));
    }

    let input_ids = Tensor::from_vec(ids, (batch, seq_len), device)?;
    let attention_mask = Tensor::from_vec(mask, (batch, seq_len), device)?;
    let token_type_ids = Tensor::zeros((batch, seq_len), DType::U32, device)?;
    Ok(TokenizedBatch { input_ids, attention_mask, token_type_ids })
}

/// Padding id declared by the tokenizer, else the usual BERT / RoBERTa pad tokens.
pub fn pad_token_id(tokenizer: &Tokenizer) -> u32 {
    if let Some(params) = tokenizer.get_padding() {
        return params.pad_id;
    }
    ["[PAD]", "<pad>"]
        .iter()
        .find_map(|tok| tokenizer.token_to_id(tok))
        .unwrap_or(0)
}
