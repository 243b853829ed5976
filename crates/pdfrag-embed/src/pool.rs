use anyhow::{anyhow, Result};
use candle_core::{DType, Tensor};

/// Mean of `hidden` ([B,T,H]) over positions where `attention_mask` ([B,T]) is set.
pub fn masked_mean(hidden: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
    let (_batch, _time, hidden_dim) = hidden.dims3().map_err(|e| anyhow!("hidden shape must be [B,T,H]: {}", e))?;
    let mask = attention_mask.to_device(hidden.device())?.to_dtype(hidden.dtype())?;
    let mask_3d = mask.unsqueeze(2)?;
    let mask_broadcast = match mask_3d.broadcast_as(hidden.shape()) {
        Ok(m) => m,
        Err(_) => mask_3d.repeat((1, 1, hidden_dim))?,
    };
    let masked = (hidden * &mask_broadcast)?;
    let sum = masked.sum(1)?;
    // all-padding rows would divide by zero
    let lengths = mask.sum(1)?.unsqueeze(1)?.to_dtype(sum.dtype())?.clamp(1f32, f32::MAX)?;
    Ok(sum.broadcast_div(&lengths)?)
}

/// Row-wise L2 normalisation of a [B,H] tensor.
pub fn l2_normalize(t: &Tensor) -> Result<Tensor> {
    let eps_val = match t.dtype() { DType::F16 => 1e-6f32, _ => 1e-12f32 };
    let eps = Tensor::new(&[eps_val], t.device())?.to_dtype(t.dtype())?.unsqueeze(0)?;
    let norm = t.sqr()?.sum_keepdim(1)?.sqrt()?;
    let norm = norm.broadcast_add(&eps)?;
    Ok(t.broadcast_div(&norm)?)
}

pub fn masked_mean_l2(hidden: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
    l2_normalize(&masked_mean(hidden, attention_mask)?)
}
