//! Per-call generation parameters.

use serde::{Deserialize, Serialize};

/// Default duration when a caller does not specify one.
pub const DEFAULT_DURATION_SEC: u32 = 10;

/// Shortest duration a front-end accepts, in seconds.
pub const MIN_DURATION_SEC: u32 = 5;

/// Longest duration a front-end accepts, in seconds.
pub const MAX_DURATION_SEC: u32 = 30;

/// Default top-k value for sampling.
pub const DEFAULT_TOP_K: usize = 250;

/// Default classifier-free guidance coefficient.
pub const DEFAULT_CFG_COEF: f32 = 3.0;

/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 1.0;

/// Sampling configuration handed to every generation call.
///
/// Providers never keep a duration of their own: each call receives the
/// parameters it must honor, so concurrent requests cannot observe each
/// other's settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Target length of each generated waveform in seconds.
    pub duration_sec: u32,

    /// Sample only among the k most probable tokens.
    pub top_k: usize,

    /// Softmax temperature applied to guided logits.
    pub temperature: f32,

    /// Classifier-free guidance coefficient.
    pub cfg_coef: f32,

    /// Seed for the sampling RNG. None seeds from entropy.
    pub seed: Option<u64>,
}

impl GenerationParams {
    /// Returns a copy with the given duration.
    pub fn with_duration(mut self, duration_sec: u32) -> Self {
        self.duration_sec = duration_sec;
        self
    }

    /// Returns a copy with the given seed, keeping the existing one if `seed` is None.
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        if seed.is_some() {
            self.seed = seed;
        }
        self
    }

    /// Number of frames a provider running at `frame_rate` must produce.
    pub fn frames(&self, frame_rate: u32) -> usize {
        self.duration_sec as usize * frame_rate as usize
    }
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            duration_sec: DEFAULT_DURATION_SEC,
            top_k: DEFAULT_TOP_K,
            temperature: DEFAULT_TEMPERATURE,
            cfg_coef: DEFAULT_CFG_COEF,
            seed: None,
        }
    }
}
