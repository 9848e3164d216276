//! Logits processing for MusicGen decoder output.
//!
//! Handles classifier-free guidance, temperature and top-k sampling for
//! token generation.

use std::fmt::{Debug, Formatter};
use std::ops::{Deref, DerefMut};

use half::f16;
use ndarray::{s, Array, Array2, Axis, Ix3, IxDyn};
use ort::tensor::ArrayExtensions;
use ort::value::DynValue;
use rand::distributions::WeightedIndex;
use rand::prelude::Distribution;
use rand::Rng;

use crate::error::{Result, ServiceError};

/// Wrapper around 2D logits array with processing methods.
pub struct Logits(Array2<f32>);

impl Deref for Logits {
    type Target = Array2<f32>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Logits {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl Debug for Logits {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Logits({:?})", self.0.dim())
    }
}

impl Logits {
    /// Creates Logits from a 3D DynValue, supporting both f32 and f16.
    ///
    /// The input shape is expected to be [batch_size, decoder_sequence_length, vocab_size].
    /// Since decoder_sequence_length is always 1, we remove that axis.
    pub fn from_3d_dyn_value(value: &DynValue) -> Result<Self> {
        let (shape, data): (Vec<usize>, Vec<f32>) =
            if let Ok((shape, data)) = value.try_extract_tensor::<f32>() {
                let shape_vec: Vec<usize> = shape.iter().map(|&x| x as usize).collect();
                (shape_vec, data.to_vec())
            } else if let Ok((shape, data)) = value.try_extract_tensor::<f16>() {
                let shape_vec: Vec<usize> = shape.iter().map(|&x| x as usize).collect();
                let data_f32: Vec<f32> = data.iter().map(|e| f32::from(*e)).collect();
                (shape_vec, data_f32)
            } else {
                return Err(ServiceError::generation_failed("Logits must be f32 or f16"));
            };

        let arr = Array::from_shape_vec(IxDyn(&shape), data).map_err(|e| {
            ServiceError::generation_failed(format!("Failed to create array: {}", e))
        })?;

        let arr = arr
            .into_dimensionality::<Ix3>()
            .map_err(|e| ServiceError::generation_failed(format!("Expected 3D logits: {}", e)))?;

        // [batch, 1, vocab]: a single decoder step
        let arr = arr.remove_axis(Axis(1));
        Ok(Self(arr))
    }

    /// Applies classifier-free guidance to the logits.
    ///
    /// The batch is expected to have conditional logits in the first half
    /// and unconditional logits in the second half. The formula applied is:
    /// `guided = uncond + (cond - uncond) * scale`
    pub fn apply_free_guidance(self, guidance_scale: f32) -> Result<Self> {
        let batch = self.0.dim().0;
        if batch % 2 != 0 {
            return Err(ServiceError::generation_failed(format!(
                "free guidance needs an even batch, got {}",
                batch
            )));
        }

        let unguided_bsz = batch / 2;
        let cond_logits = self.0.slice(s![0..unguided_bsz, ..]);
        let uncond_logits = self.0.slice(s![unguided_bsz.., ..]);

        Ok(Self(
            (cond_logits.into_owned() - uncond_logits) * guidance_scale + uncond_logits,
        ))
    }

    /// Divides the logits by `temperature`.
    ///
    /// Temperatures at or below zero leave the logits untouched.
    pub fn apply_temperature(mut self, temperature: f32) -> Self {
        if temperature > 0.0 && temperature != 1.0 {
            self.0.mapv_inplace(|x| x / temperature);
        }
        self
    }

    /// Samples from the logits using top-k sampling.
    ///
    /// Returns a vector of (token_id, log_probability) pairs, one per batch entry.
    ///
    /// # Arguments
    ///
    /// * `k` - Take into account only top k logits in each batch
    /// * `rng` - Source of randomness, seeded by the caller for reproducibility
    pub fn sample_top_k<R: Rng + ?Sized>(&self, k: usize, rng: &mut R) -> Result<Vec<(i64, f32)>> {
        let mut result = vec![];
        let softmax_logits = self.0.softmax(Axis(1));

        for batch in softmax_logits.axis_iter(Axis(0)) {
            let k = k.clamp(1, batch.len().max(1));

            // Vec<(token_id, softmax_prob)>
            let mut candidates = batch
                .iter()
                .enumerate()
                .map(|(i, e)| (i as i64, *e))
                .collect::<Vec<_>>();

            // NaN sorts last
            candidates.sort_by(|a, b| b.1.total_cmp(&a.1));
            candidates.truncate(k);

            let distribution = WeightedIndex::new(candidates.iter().map(|e| e.1)).map_err(|e| {
                ServiceError::generation_failed(format!("Invalid sampling distribution: {}", e))
            })?;

            let (idx, softmax_prob) = candidates[distribution.sample(rng)];
            result.push((idx, softmax_prob.ln()));
        }
        Ok(result)
    }
}
