use anyhow::{bail, Result};
use candle_core::Tensor;

/// Mean of the token states selected by `attention_mask`, shape `[B, H]`.
pub fn masked_mean(hidden: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
    let dims = hidden.dims();
    if dims.len() != 3 {
        bail!("hidden shape must be [B,T,H], got {dims:?}");
    }
    let (batch, hidden_dim) = (dims[0], dims[2]);

    let mask = attention_mask.to_device(hidden.device())?.to_dtype(hidden.dtype())?;
    let mask_3d = mask.unsqueeze(2)?;
    let masked = hidden.broadcast_mul(&mask_3d)?;
    let sum = masked.sum(1)?;
    let lengths = mask.sum(1)?.unsqueeze(1)?.to_dtype(sum.dtype())?;
    let mean = sum.broadcast_div(&lengths)?;
    if mean.dims() != [batch, hidden_dim] {
        bail!("pooled shape {:?} does not match [{batch}, {hidden_dim}]", mean.dims());
    }
    Ok(mean)
}

/// Scale `v` to unit L2 norm in place.
pub fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt() + 1e-12;
    for x in v.iter_mut() {
        *x /= norm;
    }
}

/// Keep the first `dim` components (Matryoshka-style truncation).
pub fn truncate(v: &mut Vec<f32>, dim: Option<usize>) {
    if let Some(dim) = dim {
        v.truncate(dim);
    }
}

/// Truncate then optionally normalize, so normalized output has unit norm
/// at the truncated dimension.
pub fn finish_vector(v: &mut Vec<f32>, truncate_dim: Option<usize>, normalize: bool) {
    truncate(v, truncate_dim);
    if normalize {
        l2_normalize(v);
    }
}
