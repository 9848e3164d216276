//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};

use songstarter::audio::{write_wav, WavEncoding};
use songstarter::{GenerationParams, ModelProvider, Result, ServiceError, Waveform};

/// What a provider was asked to do.
#[derive(Debug, Clone, PartialEq)]
pub struct Recorded {
    pub candidates: usize,
    pub melody: Option<(u32, usize)>,
    pub duration_sec: u32,
}

/// Deterministic provider rendering a decaying tone per candidate.
#[derive(Clone)]
pub struct ToneProvider {
    pub sample_rate: u32,
    pub channels: usize,
    pub output_rate: u32,
    pub fail: bool,
    pub log: Arc<Mutex<Vec<Recorded>>>,
}

impl ToneProvider {
    pub fn new(sample_rate: u32, channels: usize) -> Self {
        Self {
            sample_rate,
            channels,
            output_rate: sample_rate,
            fail: false,
            log: Arc::default(),
        }
    }

    pub fn failing(sample_rate: u32, channels: usize) -> Self {
        Self {
            fail: true,
            ..Self::new(sample_rate, channels)
        }
    }

    pub fn recorded(&self) -> Vec<Recorded> {
        self.log.lock().unwrap().clone()
    }

    fn render(
        &self,
        candidates: usize,
        melody: Option<(u32, usize)>,
        params: &GenerationParams,
    ) -> Result<Vec<Waveform>> {
        self.log.lock().unwrap().push(Recorded {
            candidates,
            melody,
            duration_sec: params.duration_sec,
        });
        if self.fail {
            return Err(ServiceError::generation_failed("out of memory"));
        }

        let frames = params.duration_sec as usize * self.output_rate as usize;
        Ok((0..candidates)
            .map(|i| {
                let freq = 110.0 * (i + 2) as f32;
                let samples: Vec<f32> = (0..frames)
                    .map(|t| {
                        let time = t as f32 / self.output_rate as f32;
                        0.3 * (2.0 * std::f32::consts::PI * freq * time).sin()
                    })
                    .collect();
                Waveform::new(vec![samples; self.channels], self.output_rate)
            })
            .collect())
    }
}

impl ModelProvider for ToneProvider {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn audio_channels(&self) -> usize {
        self.channels
    }

    fn version(&self) -> &str {
        "tone-test"
    }

    fn supports_melody(&self) -> bool {
        true
    }

    fn generate(
        &mut self,
        descriptions: &[String],
        params: &GenerationParams,
    ) -> Result<Vec<Waveform>> {
        self.render(descriptions.len(), None, params)
    }

    fn generate_with_chroma(
        &mut self,
        descriptions: &[String],
        melodies: &[Waveform],
        params: &GenerationParams,
    ) -> Result<Vec<Waveform>> {
        let melody = melodies
            .first()
            .map(|m| (m.sample_rate(), m.num_channels()));
        self.render(descriptions.len(), melody, params)
    }
}

/// Writes a short melody file.
pub fn write_melody(path: &Path, sample_rate: u32, channels: usize, seconds: f32) {
    let frames = (sample_rate as f32 * seconds) as usize;
    let samples: Vec<f32> = (0..frames)
        .map(|t| 0.4 * (2.0 * std::f32::consts::PI * 440.0 * t as f32 / sample_rate as f32).sin())
        .collect();
    let wav = Waveform::new(vec![samples; channels], sample_rate);
    write_wav(&wav, path, WavEncoding::Pcm16).unwrap();
}

/// Reads back (sample_rate, channels, seconds) of a written file.
pub fn wav_shape(path: &Path) -> (u32, u16, f32) {
    let reader = hound::WavReader::open(path).unwrap();
    let spec = reader.spec();
    let seconds = reader.duration() as f32 / spec.sample_rate as f32;
    (spec.sample_rate, spec.channels, seconds)
}

/// Number of generated files in `dir`.
pub fn output_count(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| {
            let name = e.file_name().to_string_lossy().into_owned();
            name.starts_with("songstarter-") && name.ends_with(".wav")
        })
        .count()
}
