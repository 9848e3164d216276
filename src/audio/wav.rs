//! WAV file writer for audio output.
//!
//! Writes multi-channel waveforms using the hound crate.

use std::io::{Seek, Write};
use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};

use crate::error::{ErrorCode, Result, ServiceError};
use crate::types::Waveform;

/// Sample encoding of the written file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WavEncoding {
    /// 16-bit signed integer PCM.
    #[default]
    Pcm16,
    /// 24-bit signed integer PCM.
    Pcm24,
    /// 32-bit IEEE float.
    Float32,
}

impl WavEncoding {
    fn spec(self, channels: u16, sample_rate: u32) -> WavSpec {
        let (bits_per_sample, sample_format) = match self {
            WavEncoding::Pcm16 => (16, SampleFormat::Int),
            WavEncoding::Pcm24 => (24, SampleFormat::Int),
            WavEncoding::Float32 => (32, SampleFormat::Float),
        };
        WavSpec {
            channels,
            sample_rate,
            bits_per_sample,
            sample_format,
        }
    }
}

fn encode_error(context: &str, e: hound::Error) -> ServiceError {
    ServiceError::with_source(ErrorCode::EncodeError, context.to_string(), e)
}

/// Writes a waveform as WAV into any seekable writer.
///
/// Samples outside [-1, 1] are clamped for the integer encodings.
pub fn write_wav_to<W: Write + Seek>(wav: &Waveform, writer: W, encoding: WavEncoding) -> Result<()> {
    let channels = u16::try_from(wav.num_channels())
        .ok()
        .filter(|&c| c > 0)
        .ok_or_else(|| {
            ServiceError::encode_failed(format!("unsupported channel count {}", wav.num_channels()))
        })?;
    let spec = encoding.spec(channels, wav.sample_rate());

    let mut writer =
        WavWriter::new(writer, spec).map_err(|e| encode_error("Failed to create WAV writer", e))?;

    for t in 0..wav.num_frames() {
        for channel in wav.channels() {
            let sample = channel[t];
            let written = match encoding {
                WavEncoding::Pcm16 => {
                    writer.write_sample((sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                }
                WavEncoding::Pcm24 => {
                    writer.write_sample((sample.clamp(-1.0, 1.0) * 8_388_607.0) as i32)
                }
                WavEncoding::Float32 => writer.write_sample(sample),
            };
            written.map_err(|e| encode_error("Failed to write sample", e))?;
        }
    }

    writer
        .finalize()
        .map_err(|e| encode_error("Failed to finalize WAV file", e))
}

/// Writes a waveform to a WAV file at `path`.
pub fn write_wav(wav: &Waveform, path: &Path, encoding: WavEncoding) -> Result<()> {
    let file = std::fs::File::create(path).map_err(|e| {
        ServiceError::with_source(
            ErrorCode::EncodeError,
            format!("Failed to create {}", path.display()),
            e,
        )
    })?;
    write_wav_to(wav, std::io::BufWriter::new(file), encoding)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn stereo() -> Waveform {
        Waveform::new(vec![vec![0.0, 0.5, -0.5, 1.5], vec![0.25; 4]], 32000)
    }

    #[test]
    fn write_wav_creates_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.wav");

        write_wav(&stereo(), &path, WavEncoding::Pcm16).unwrap();

        let reader = hound::WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.sample_rate, 32000);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(spec.sample_format, SampleFormat::Int);
        assert_eq!(reader.duration(), 4);
    }

    #[test]
    fn pcm16_clamps_out_of_range_samples() {
        let mut buffer = std::io::Cursor::new(Vec::new());
        write_wav_to(&stereo(), &mut buffer, WavEncoding::Pcm16).unwrap();
        buffer.set_position(0);

        let mut reader = hound::WavReader::new(buffer).unwrap();
        let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        // Interleaved: frame 3 left channel was 1.5
        assert_eq!(samples[6], i16::MAX);
        assert_eq!(samples[1], (0.25 * i16::MAX as f32) as i16);
    }

    #[test]
    fn float_encoding() {
        let mut buffer = std::io::Cursor::new(Vec::new());
        write_wav_to(&stereo(), &mut buffer, WavEncoding::Float32).unwrap();
        let bytes = buffer.into_inner();
        assert_eq!(&bytes[0..4], b"RIFF");
    }

    #[test]
    fn rejects_empty_channel_list() {
        let dir = tempdir().unwrap();
        let wav = Waveform::new(Vec::new(), 32000);
        let err = write_wav(&wav, &dir.path().join("x.wav"), WavEncoding::Pcm16).unwrap_err();
        assert_eq!(err.code, ErrorCode::EncodeError);
    }
}
