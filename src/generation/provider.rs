//! Model provider abstraction.

use crate::error::Result;
use crate::types::{GenerationParams, Waveform};

/// A pretrained text-to-music model.
///
/// Every generation call receives its own [`GenerationParams`]; providers
/// hold no per-request state. Each call returns one waveform per
/// description, at [`ModelProvider::sample_rate`] with
/// [`ModelProvider::audio_channels`] channels.
pub trait ModelProvider: Send {
    /// Native output sample rate in Hz.
    fn sample_rate(&self) -> u32;

    /// Number of output channels.
    fn audio_channels(&self) -> usize;

    /// Model identifier reported to clients.
    fn version(&self) -> &str;

    /// Whether [`ModelProvider::generate_with_chroma`] can succeed.
    fn supports_melody(&self) -> bool;

    /// Generates one waveform per description.
    fn generate(
        &mut self,
        descriptions: &[String],
        params: &GenerationParams,
    ) -> Result<Vec<Waveform>>;

    /// Generates one waveform per description, conditioned on the matching
    /// melody.
    ///
    /// Melodies are already at the provider's sample rate and channel count.
    fn generate_with_chroma(
        &mut self,
        descriptions: &[String],
        melodies: &[Waveform],
        params: &GenerationParams,
    ) -> Result<Vec<Waveform>>;
}

#[cfg(test)]
pub(crate) mod testing {
    //! Deterministic provider for unit tests.

    use std::sync::{Arc, Mutex};

    use super::ModelProvider;
    use crate::error::{Result, ServiceError};
    use crate::types::{GenerationParams, Waveform};

    /// One recorded provider call.
    #[derive(Debug, Clone, PartialEq)]
    pub struct Call {
        pub descriptions: Vec<String>,
        pub melody: Option<(u32, usize)>,
        pub duration_sec: u32,
    }

    /// Produces a sine per candidate and records every call.
    #[derive(Debug, Clone)]
    pub struct SineProvider {
        pub sample_rate: u32,
        pub channels: usize,
        pub fail: bool,
        pub calls: Arc<Mutex<Vec<Call>>>,
    }

    impl SineProvider {
        pub fn new(sample_rate: u32, channels: usize) -> Self {
            Self {
                sample_rate,
                channels,
                fail: false,
                calls: Arc::default(),
            }
        }

        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new(32000, 1)
            }
        }

        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn render(&self, count: usize, params: &GenerationParams) -> Result<Vec<Waveform>> {
            if self.fail {
                return Err(ServiceError::generation_failed("provider out of memory"));
            }
            let frames = params.duration_sec as usize * self.sample_rate as usize;
            Ok((0..count)
                .map(|i| {
                    let freq = 220.0 * (i + 1) as f32;
                    let samples: Vec<f32> = (0..frames)
                        .map(|t| {
                            0.5 * (2.0 * std::f32::consts::PI * freq * t as f32
                                / self.sample_rate as f32)
                                .sin()
                        })
                        .collect();
                    Waveform::new(vec![samples; self.channels], self.sample_rate)
                })
                .collect())
        }
    }

    impl ModelProvider for SineProvider {
        fn sample_rate(&self) -> u32 {
            self.sample_rate
        }

        fn audio_channels(&self) -> usize {
            self.channels
        }

        fn version(&self) -> &str {
            "sine-test"
        }

        fn supports_melody(&self) -> bool {
            true
        }

        fn generate(
            &mut self,
            descriptions: &[String],
            params: &GenerationParams,
        ) -> Result<Vec<Waveform>> {
            self.calls.lock().unwrap().push(Call {
                descriptions: descriptions.to_vec(),
                melody: None,
                duration_sec: params.duration_sec,
            });
            self.render(descriptions.len(), params)
        }

        fn generate_with_chroma(
            &mut self,
            descriptions: &[String],
            melodies: &[Waveform],
            params: &GenerationParams,
        ) -> Result<Vec<Waveform>> {
            self.calls.lock().unwrap().push(Call {
                descriptions: descriptions.to_vec(),
                melody: melodies.first().map(|m| (m.sample_rate(), m.num_channels())),
                duration_sec: params.duration_sec,
            });
            self.render(descriptions.len(), params)
        }
    }
}
