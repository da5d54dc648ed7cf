//! Sentence pooling over encoder output.
use anyhow::{Result, bail};
use candle_core::{DType, Tensor};

/// Average of each row's unmasked token states, scaled to unit length.
///
/// `hidden` is `[batch, tokens, width]` and `attention_mask` `[batch, tokens]`
/// (any numeric dtype); the result is `[batch, width]`. A row with no
/// unmasked tokens pools to the zero vector.
pub fn mean_pool_normalized(hidden: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
    let (batch, tokens, width) = match hidden.dims() {
        &[b, t, w] => (b, t, w),
        other => bail!("hidden states must be [batch, tokens, width], got {other:?}"),
    };
    if attention_mask.dims() != [batch, tokens].as_slice() {
        bail!("attention mask {:?} does not fit hidden states [{batch}, {tokens}, {width}]", attention_mask.dims());
    }
    let eps = match hidden.dtype() { DType::F16 | DType::BF16 => 1e-6, _ => 1e-12 };

    let weights = attention_mask.to_device(hidden.device())?.to_dtype(hidden.dtype())?.unsqueeze(2)?;
    let summed = hidden.broadcast_mul(&weights)?.sum(1)?;
    let counts = (weights.sum(1)? + eps)?;
    let mean = summed.broadcast_div(&counts)?;
    let norms = (mean.sqr()?.sum_keepdim(1)?.sqrt()? + eps)?;
    Ok(mean.broadcast_div(&norms)?)
}
