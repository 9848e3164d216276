//! Generation service.
//!
//! Turns a [`GenerationRequest`] into exactly one WAV file: decode the
//! optional melody, run the shared model provider, keep the first
//! candidate, and write it loudness-normalized to a fresh output file.

use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

use crate::audio::{audio_write, convert_audio, decode_audio, AudioWriteOptions};
use crate::error::{Result, ServiceError};
use crate::output::OutputStore;
use crate::types::{Conditioning, GenerationParams, GenerationRequest, GenerationResult, Waveform};

use super::provider::ModelProvider;

/// Number of prompts submitted for a text-only request.
///
/// Only the first candidate is kept.
pub const TEXT_CANDIDATES: usize = 3;

/// Static description of the loaded model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    pub version: String,
    pub sample_rate: u32,
    pub channels: usize,
    pub supports_melody: bool,
}

/// Shares one model provider across every request.
///
/// The provider sits behind a mutex that is held only for inference;
/// melody decoding and file encoding run without it.
pub struct GenerationService<P: ModelProvider> {
    provider: Mutex<P>,
    info: ModelInfo,
    store: OutputStore,
    write_options: AudioWriteOptions,
    defaults: GenerationParams,
}

impl<P: ModelProvider> GenerationService<P> {
    /// Creates a service writing into `store`.
    pub fn new(provider: P, store: OutputStore) -> Self {
        let info = ModelInfo {
            version: provider.version().to_string(),
            sample_rate: provider.sample_rate(),
            channels: provider.audio_channels(),
            supports_melody: provider.supports_melody(),
        };
        Self {
            provider: Mutex::new(provider),
            info,
            store,
            write_options: AudioWriteOptions::loudness_compressed(),
            defaults: GenerationParams::default(),
        }
    }

    /// Replaces the sampling defaults used to build per-call parameters.
    pub fn with_defaults(mut self, defaults: GenerationParams) -> Self {
        self.defaults = defaults;
        self
    }

    /// Replaces the audio write options.
    pub fn with_write_options(mut self, options: AudioWriteOptions) -> Self {
        self.write_options = options;
        self
    }

    /// Returns the loaded model description.
    pub fn model_info(&self) -> &ModelInfo {
        &self.info
    }

    /// Returns the output store.
    pub fn store(&self) -> &OutputStore {
        &self.store
    }

    /// Generates one file for `request`.
    pub fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult> {
        let span = tracing::info_span!(
            "generate",
            duration_sec = request.duration_sec,
            melody = request.melody_path.is_some(),
            description = tracing::field::Empty
        );
        let _enter = span.enter();
        let start = Instant::now();

        let params = self
            .defaults
            .clone()
            .with_duration(request.duration_sec)
            .with_seed(request.seed);
        let conditioning = self.conditioning(request)?;
        span.record("description", conditioning.description());

        let candidate = self.run_provider(&conditioning, &params)?;
        if candidate.sample_rate() != self.info.sample_rate {
            return Err(ServiceError::generation_failed(format!(
                "provider returned {} Hz audio, expected {} Hz",
                candidate.sample_rate(),
                self.info.sample_rate
            )));
        }

        let channels = u16::try_from(candidate.num_channels()).map_err(|_| {
            ServiceError::encode_failed(format!(
                "{} channels exceed the WAV limit",
                candidate.num_channels()
            ))
        })?;

        let dest = self.store.create()?;
        let path = audio_write(dest, &candidate, &self.write_options)?;

        tracing::info!(
            path = %path.display(),
            mode = conditioning.mode(),
            elapsed_sec = start.elapsed().as_secs_f32(),
            "generation complete"
        );

        Ok(GenerationResult {
            path,
            sample_rate: candidate.sample_rate(),
            channels,
            duration_sec: candidate.duration_sec(),
        })
    }

    /// Decodes the request's melody, if any, into the provider's format.
    fn conditioning(&self, request: &GenerationRequest) -> Result<Conditioning> {
        let description = request.description.clone();
        let Some(path) = &request.melody_path else {
            return Ok(Conditioning::TextOnly { description });
        };

        let decoded = decode_audio(path)?;
        tracing::debug!(
            path = %path.display(),
            sample_rate = decoded.sample_rate(),
            channels = decoded.num_channels(),
            "melody decoded"
        );
        let melody = convert_audio(&decoded, self.info.sample_rate, self.info.channels)?;
        Ok(Conditioning::MelodyConditioned {
            description,
            melody,
        })
    }

    /// Runs inference and returns the first candidate.
    fn run_provider(
        &self,
        conditioning: &Conditioning,
        params: &GenerationParams,
    ) -> Result<Waveform> {
        let candidates = {
            let description = conditioning.description().to_string();
            let mut provider = self.lock_provider()?;
            match conditioning {
                Conditioning::TextOnly { .. } => {
                    provider.generate(&vec![description; TEXT_CANDIDATES], params)?
                }
                Conditioning::MelodyConditioned { melody, .. } => provider.generate_with_chroma(
                    &[description],
                    std::slice::from_ref(melody),
                    params,
                )?,
            }
        };

        candidates
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::generation_failed("provider returned no audio"))
    }

    fn lock_provider(&self) -> Result<MutexGuard<'_, P>> {
        self.provider
            .lock()
            .map_err(|_| ServiceError::generation_failed("model provider lock poisoned"))
    }
}
