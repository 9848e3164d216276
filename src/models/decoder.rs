//! MusicGen decoder wrapper with KV cache support.
//!
//! Implements autoregressive token generation using split decoder architecture
//! with KV cache optimization for efficient inference.

use std::borrow::Cow;
use std::path::Path;

use half::f16;
use ort::session::{Session, SessionInputValue};
use ort::value::{DynValue, Tensor};
use rand::Rng;

use crate::error::{Result, ServiceError};
use crate::types::{ModelConfig, CODEBOOKS};

use super::delay_pattern::DelayPattern;
use super::logits::Logits;
use super::session::{load_session, SessionOptions};

const N: usize = CODEBOOKS as usize;

/// Conditional and unconditional rows for each codebook.
const BATCH: usize = 2 * N;

/// Sampling settings for one decoding run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sampling {
    pub top_k: usize,
    pub temperature: f32,
    pub cfg_coef: f32,
}

/// MusicGen decoder using split architecture with KV cache.
pub struct MusicGenDecoder {
    decoder_model: Session,
    decoder_with_past: Session,
    config: ModelConfig,
}

impl MusicGenDecoder {
    /// Loads the decoder models from a directory.
    ///
    /// Expects `decoder_model.onnx` and `decoder_with_past_model.onnx` in the directory.
    pub fn load(model_dir: &Path, config: ModelConfig, options: &SessionOptions) -> Result<Self> {
        let decoder_model = load_session(&model_dir.join("decoder_model.onnx"), options)?;
        let decoder_with_past =
            load_session(&model_dir.join("decoder_with_past_model.onnx"), options)?;

        Ok(Self {
            decoder_model,
            decoder_with_past,
            config,
        })
    }

    /// Generates `frames` complete codec frames from the encoder hidden states.
    ///
    /// Runs `frames + 3` decoder steps so the delayed codebooks catch up.
    pub fn generate_frames<R: Rng + ?Sized>(
        &mut self,
        encoder_hidden_states: &DynValue,
        encoder_attention_mask: &DynValue,
        frames: usize,
        sampling: Sampling,
        rng: &mut R,
    ) -> Result<Vec<[i64; N]>> {
        let pad_token_id = self.config.pad_token_id;
        let num_hidden_layers = self.config.num_hidden_layers as usize;
        let total_steps = DelayPattern::<N>::steps_for(frames);

        // Unconditional half of the batch sees an all-zero prompt
        let encoder_hidden_states = duplicate_with_zeros(encoder_hidden_states)?;
        let encoder_attention_mask = duplicate_with_zeros_i64(encoder_attention_mask)?;

        let mut pattern = DelayPattern::<N>::new();
        let mut results = Vec::with_capacity(frames);

        let input_ids = Tensor::from_array(([BATCH, 1], vec![pad_token_id; BATCH]))
            .map_err(|e| ServiceError::generation_failed(format!("Failed to create input_ids: {}", e)))?;

        let session_inputs: Vec<(Cow<str>, SessionInputValue)> = vec![
            (
                Cow::from("encoder_attention_mask"),
                SessionInputValue::from(encoder_attention_mask.view()),
            ),
            (
                Cow::from("encoder_hidden_states"),
                SessionInputValue::from(encoder_hidden_states.view()),
            ),
            (Cow::from("input_ids"), SessionInputValue::from(input_ids.view())),
        ];

        let mut outputs = self.decoder_model.run(session_inputs).map_err(|e| {
            ServiceError::generation_failed(format!("Initial decoder inference failed: {}", e))
        })?;

        pattern.push(sample_step(outputs.remove("logits"), sampling, rng)?);

        let mut kv_cache: Vec<(String, DynValue)> = Vec::with_capacity(num_hidden_layers * 4);
        for j in 0..num_hidden_layers {
            for (part, kind) in [
                ("decoder", "key"),
                ("decoder", "value"),
                ("encoder", "key"),
                ("encoder", "value"),
            ] {
                let name = format!("present.{j}.{part}.{kind}");
                let value = required(outputs.remove(name.as_str()), &name)?;
                kv_cache.push((format!("past_key_values.{j}.{part}.{kind}"), value));
            }
        }
        drop(outputs);

        let progress_every = (total_steps / 10).max(1);

        for step in 1..total_steps {
            let [a, b, c, d] = pattern.next_input(pad_token_id);
            let input_ids = Tensor::from_array(([BATCH, 1], vec![a, b, c, d, a, b, c, d]))
                .map_err(|e| {
                    ServiceError::generation_failed(format!("Failed to create input_ids: {}", e))
                })?;

            let mut session_inputs: Vec<(Cow<str>, SessionInputValue)> = vec![
                (Cow::from("input_ids"), SessionInputValue::from(input_ids.view())),
                (
                    Cow::from("encoder_attention_mask"),
                    SessionInputValue::from(encoder_attention_mask.view()),
                ),
            ];
            for (k, v) in &kv_cache {
                session_inputs.push((Cow::from(k.as_str()), SessionInputValue::from(v.view())));
            }

            let mut outputs = self.decoder_with_past.run(session_inputs).map_err(|e| {
                ServiceError::generation_failed(format!(
                    "Decoder with past inference failed: {}",
                    e
                ))
            })?;

            pattern.push(sample_step(outputs.remove("logits"), sampling, rng)?);
            if let Some(frame) = pattern.last_frame() {
                results.push(frame);
            }

            // Only the decoder self-attention cache grows
            for j in 0..num_hidden_layers {
                let key = format!("present.{j}.decoder.key");
                let value = format!("present.{j}.decoder.value");
                kv_cache[j * 4].1 = required(outputs.remove(key.as_str()), &key)?;
                kv_cache[j * 4 + 1].1 = required(outputs.remove(value.as_str()), &value)?;
            }

            if step % progress_every == 0 {
                tracing::debug!(step, total_steps, "decoding");
            }
        }

        results.truncate(frames);
        Ok(results)
    }
}

fn required(value: Option<DynValue>, name: &str) -> Result<DynValue> {
    value.ok_or_else(|| ServiceError::generation_failed(format!("{name} not found in decoder output")))
}

/// Guides, tempers and samples one token per codebook from a decoder step.
fn sample_step<R: Rng + ?Sized>(
    logits: Option<DynValue>,
    sampling: Sampling,
    rng: &mut R,
) -> Result<[i64; N]> {
    let logits_value = required(logits, "logits")?;
    let samples = Logits::from_3d_dyn_value(&logits_value)?
        .apply_free_guidance(sampling.cfg_coef)?
        .apply_temperature(sampling.temperature)
        .sample_top_k(sampling.top_k, rng)?;

    let mut tokens = [0i64; N];
    if samples.len() != N {
        return Err(ServiceError::generation_failed(format!(
            "expected {} sampled tokens, got {}",
            N,
            samples.len()
        )));
    }
    for (token, (id, _)) in tokens.iter_mut().zip(samples) {
        *token = id;
    }
    Ok(tokens)
}

/// Duplicates a tensor along the first dimension, filling new entries with zeros.
///
/// Handles both f16 and f32 encoder outputs.
fn duplicate_with_zeros(tensor: &DynValue) -> Result<DynValue> {
    if let Ok(result) = duplicate_with_zeros_typed::<f16>(tensor) {
        return Ok(result);
    }
    duplicate_with_zeros_typed::<f32>(tensor)
}

fn duplicate_with_zeros_typed<T>(tensor: &DynValue) -> Result<DynValue>
where
    T: ort::tensor::PrimitiveTensorElementType + Clone + Default + std::fmt::Debug + 'static,
{
    let (shape, data) = tensor.try_extract_tensor::<T>().map_err(|e| {
        ServiceError::generation_failed(format!("Failed to extract tensor: {}", e))
    })?;
    let (shape, combined) = doubled_with_zeros(&shape, data);

    let result = Tensor::from_array((shape, combined)).map_err(|e| {
        ServiceError::generation_failed(format!("Failed to create duplicated tensor: {}", e))
    })?;
    Ok(result.into_dyn())
}

fn duplicate_with_zeros_i64(tensor: &DynValue) -> Result<DynValue> {
    let (shape, data) = tensor.try_extract_tensor::<i64>().map_err(|e| {
        ServiceError::generation_failed(format!("Failed to extract i64 tensor: {}", e))
    })?;
    let (shape, combined) = doubled_with_zeros(&shape, data);

    let result = Tensor::from_array((shape, combined)).map_err(|e| {
        ServiceError::generation_failed(format!("Failed to create duplicated i64 tensor: {}", e))
    })?;
    Ok(result.into_dyn())
}

/// Doubles the leading dimension, appending zeros after the original data.
fn doubled_with_zeros<T: Clone + Default>(shape: &[i64], data: &[T]) -> (Vec<usize>, Vec<T>) {
    let mut shape: Vec<usize> = shape.iter().map(|&x| x as usize).collect();
    if let Some(first) = shape.first_mut() {
        *first *= 2;
    }
    let mut combined = data.to_vec();
    combined.resize(data.len() * 2, T::default());
    (shape, combined)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubling_appends_zero_batch() {
        let (shape, data) = doubled_with_zeros(&[1, 2, 3], &[1i64, 2, 3, 4, 5, 6]);
        assert_eq!(shape, vec![2, 2, 3]);
        assert_eq!(data, vec![1, 2, 3, 4, 5, 6, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn batch_covers_both_guidance_halves() {
        assert_eq!(BATCH, 8);
    }
}
