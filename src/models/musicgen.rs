//! MusicGen ONNX model provider.

use std::path::Path;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::error::{Result, ServiceError};
use crate::generation::ModelProvider;
use crate::types::{GenerationParams, ModelConfig, Waveform};

use super::decoder::Sampling;
use super::loader::{load_sessions, MusicGenModels};
use super::session::SessionOptions;

/// Longest generation the provider accepts, in seconds.
pub const MAX_DURATION_SEC: u32 = 120;

/// The MusicGen ensemble (T5 text encoder, split decoder, EnCodec) run
/// through ONNX Runtime.
pub struct MusicGen {
    models: MusicGenModels,
}

impl MusicGen {
    /// Loads every session from `model_dir`.
    pub fn load(model_dir: &Path, options: &SessionOptions) -> Result<Self> {
        Ok(Self {
            models: load_sessions(model_dir, options)?,
        })
    }

    /// Returns the model configuration.
    pub fn config(&self) -> &ModelConfig {
        &self.models.config
    }

    fn generate_one(
        &mut self,
        description: &str,
        frames: usize,
        sampling: Sampling,
        rng: &mut ChaCha8Rng,
    ) -> Result<Waveform> {
        let (hidden_states, attention_mask) = self.models.text_encoder.encode(description)?;

        let codes = self.models.decoder.generate_frames(
            &hidden_states,
            &attention_mask,
            frames,
            sampling,
            rng,
        )?;

        tracing::debug!(frames = codes.len(), "decoding audio");
        let mut wav = self.models.audio_codec.decode(&codes)?;
        wav.resize(frames * self.models.config.samples_per_frame());
        Ok(wav)
    }
}

/// Rejects durations the decoder cannot produce.
pub fn validate_duration(duration_sec: u32) -> Result<()> {
    if duration_sec == 0 || duration_sec > MAX_DURATION_SEC {
        return Err(ServiceError::generation_failed(format!(
            "duration must be between 1 and {} seconds, got {}",
            MAX_DURATION_SEC, duration_sec
        )));
    }
    Ok(())
}

fn sampling_rng(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    }
}

impl ModelProvider for MusicGen {
    fn sample_rate(&self) -> u32 {
        self.models.config.sample_rate
    }

    fn audio_channels(&self) -> usize {
        usize::from(self.models.config.audio_channels)
    }

    fn version(&self) -> &str {
        &self.models.version
    }

    fn supports_melody(&self) -> bool {
        false
    }

    fn generate(
        &mut self,
        descriptions: &[String],
        params: &GenerationParams,
    ) -> Result<Vec<Waveform>> {
        validate_duration(params.duration_sec)?;

        let frames = params.frames(self.models.config.frame_rate);
        let sampling = Sampling {
            top_k: params.top_k,
            temperature: params.temperature,
            cfg_coef: params.cfg_coef,
        };
        let mut rng = sampling_rng(params.seed);

        // Candidates share one RNG stream so a seeded batch is reproducible
        // while its members still differ.
        descriptions
            .iter()
            .enumerate()
            .map(|(candidate, description)| {
                let _span = tracing::debug_span!("candidate", candidate).entered();
                self.generate_one(description, frames, sampling, &mut rng)
            })
            .collect()
    }

    fn generate_with_chroma(
        &mut self,
        descriptions: &[String],
        melodies: &[Waveform],
        params: &GenerationParams,
    ) -> Result<Vec<Waveform>> {
        validate_duration(params.duration_sec)?;

        if descriptions.len() != melodies.len() {
            return Err(ServiceError::generation_failed(format!(
                "{} descriptions but {} melodies",
                descriptions.len(),
                melodies.len()
            )));
        }

        let reason = if self.models.config.melody_conditioning {
            "the ONNX decoder graph has no chroma input"
        } else {
            "the checkpoint has no melody conditioner"
        };
        Err(ServiceError::generation_failed(format!(
            "melody conditioning unavailable for {}: {}",
            self.models.version, reason
        )))
    }
}
