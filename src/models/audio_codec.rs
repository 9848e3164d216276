//! Audio codec wrapper for MusicGen.
//!
//! Decodes codec frames into a waveform using EnCodec.

use std::borrow::Cow;
use std::path::Path;

use half::f16;
use ort::session::{Session, SessionInputValue};
use ort::value::{DynValue, Tensor};

use crate::error::{Result, ServiceError};
use crate::types::{Waveform, CODEBOOKS};

use super::session::{load_session, SessionOptions};

const N: usize = CODEBOOKS as usize;

/// MusicGen audio codec (EnCodec decoder).
pub struct MusicGenAudioCodec {
    audio_codec: Session,
    sample_rate: u32,
}

impl MusicGenAudioCodec {
    /// Loads the audio codec from a directory.
    ///
    /// Expects `encodec_decode.onnx` in the directory.
    pub fn load(model_dir: &Path, sample_rate: u32, options: &SessionOptions) -> Result<Self> {
        let audio_codec = load_session(&model_dir.join("encodec_decode.onnx"), options)?;
        Ok(Self {
            audio_codec,
            sample_rate,
        })
    }

    /// Decodes frames (one `[i64; 4]` per timestep) into a waveform.
    pub fn decode(&mut self, frames: &[[i64; N]]) -> Result<Waveform> {
        if frames.is_empty() {
            return Ok(Waveform::mono(Vec::new(), self.sample_rate));
        }

        let codes = codebook_major(frames);
        let input = Tensor::from_array(([1usize, 1, N, frames.len()], codes)).map_err(|e| {
            ServiceError::generation_failed(format!("Failed to create token tensor: {}", e))
        })?;

        let session_inputs: Vec<(Cow<str>, SessionInputValue)> =
            vec![(Cow::from("audio_codes"), SessionInputValue::from(input.view()))];

        let mut outputs = self.audio_codec.run(session_inputs).map_err(|e| {
            ServiceError::generation_failed(format!("Audio codec inference failed: {}", e))
        })?;

        let audio_values: DynValue = outputs.remove("audio_values").ok_or_else(|| {
            ServiceError::generation_failed("audio_values not found in output")
        })?;

        let (shape, samples): (Vec<i64>, Vec<f32>) =
            if let Ok((shape, data)) = audio_values.try_extract_tensor::<f32>() {
                (shape.to_vec(), data.to_vec())
            } else if let Ok((shape, data)) = audio_values.try_extract_tensor::<f16>() {
                (shape.to_vec(), data.iter().map(|e| f32::from(*e)).collect())
            } else {
                return Err(ServiceError::generation_failed(
                    "Audio values must be either f16 or f32",
                ));
            };

        Ok(Waveform::new(
            split_channels(&shape, samples),
            self.sample_rate,
        ))
    }
}

/// Lays frames out as `[codebook][time]`.
fn codebook_major(frames: &[[i64; N]]) -> Vec<i64> {
    let seq_len = frames.len();
    let mut codes = vec![0i64; seq_len * N];
    for (t, frame) in frames.iter().enumerate() {
        for (k, id) in frame.iter().enumerate() {
            codes[k * seq_len + t] = *id;
        }
    }
    codes
}

/// Splits a `[batch, channels, samples]` buffer into per-channel vectors
/// for the first batch entry.
///
/// A 1D or 2D buffer is read as mono.
fn split_channels(shape: &[i64], samples: Vec<f32>) -> Vec<Vec<f32>> {
    let channels = match shape {
        [_, channels, _] if *channels > 0 => *channels as usize,
        _ => return vec![samples],
    };
    let per_channel = shape[2].max(0) as usize;
    samples
        .chunks(per_channel.max(1))
        .take(channels)
        .map(<[f32]>::to_vec)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_are_transposed_to_codebook_major() {
        let frames = [[1i64, 2, 3, 4], [5, 6, 7, 8]];
        assert_eq!(codebook_major(&frames), vec![1, 5, 2, 6, 3, 7, 4, 8]);
    }

    #[test]
    fn stereo_output_is_split_by_channel() {
        let samples = vec![0.1, 0.2, 0.3, -0.1, -0.2, -0.3];
        let channels = split_channels(&[1, 2, 3], samples);
        assert_eq!(channels, vec![vec![0.1, 0.2, 0.3], vec![-0.1, -0.2, -0.3]]);
    }

    #[test]
    fn mono_output() {
        let channels = split_channels(&[1, 1, 4], vec![0.0; 4]);
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].len(), 4);
    }

    #[test]
    fn flat_output_is_mono() {
        let channels = split_channels(&[4], vec![0.5; 4]);
        assert_eq!(channels, vec![vec![0.5; 4]]);
    }
}
