//! Sample rate and channel conversion for melody conditioning.

use rubato::{FftFixedIn, Resampler};

use crate::error::{ErrorCode, Result, ServiceError};
use crate::types::Waveform;

const CHUNK: usize = 1024;
const SUB_CHUNKS: usize = 2;

/// Converts a waveform to `to_rate` Hz and `to_channels` channels.
///
/// Resampling runs first, then channel conversion:
/// - same channel count: unchanged
/// - to mono: channels are averaged
/// - from mono: the channel is duplicated
/// - more to fewer: extra channels are dropped
///
/// Going from several channels to more channels fails with `DECODE_ERROR`.
pub fn convert_audio(wav: &Waveform, to_rate: u32, to_channels: usize) -> Result<Waveform> {
    if to_rate == 0 || to_channels == 0 {
        return Err(ServiceError::decode_failed(format!(
            "cannot convert to {to_channels} channels at {to_rate} Hz"
        )));
    }

    let resampled = resample(wav, to_rate)?;
    convert_channels(resampled, to_channels)
}

fn convert_channels(wav: Waveform, to_channels: usize) -> Result<Waveform> {
    let from_channels = wav.num_channels();
    let sample_rate = wav.sample_rate();

    if from_channels == to_channels {
        return Ok(wav);
    }

    if to_channels == 1 {
        let frames = wav.num_frames();
        let mut mono = vec![0.0f32; frames];
        for channel in wav.channels() {
            for (acc, sample) in mono.iter_mut().zip(channel) {
                *acc += sample;
            }
        }
        let scale = 1.0 / from_channels as f32;
        mono.iter_mut().for_each(|s| *s *= scale);
        return Ok(Waveform::mono(mono, sample_rate));
    }

    if from_channels == 1 {
        let channel = wav.into_channels().remove(0);
        return Ok(Waveform::new(vec![channel; to_channels], sample_rate));
    }

    if from_channels > to_channels {
        let mut channels = wav.into_channels();
        channels.truncate(to_channels);
        return Ok(Waveform::new(channels, sample_rate));
    }

    Err(ServiceError::decode_failed(format!(
        "cannot upmix {from_channels} channels to {to_channels}"
    )))
}

fn resample(wav: &Waveform, to_rate: u32) -> Result<Waveform> {
    let from_rate = wav.sample_rate();
    if from_rate == to_rate || wav.is_empty() {
        return Ok(Waveform::new(wav.channels().to_vec(), to_rate));
    }
    if from_rate == 0 {
        return Err(ServiceError::decode_failed("melody has no sample rate"));
    }

    let num_channels = wav.num_channels();
    let mut resampler = FftFixedIn::<f32>::new(
        from_rate as usize,
        to_rate as usize,
        CHUNK,
        SUB_CHUNKS,
        num_channels,
    )
    .map_err(|e| {
        ServiceError::with_source(
            ErrorCode::DecodeError,
            format!("cannot resample {from_rate} Hz to {to_rate} Hz"),
            e,
        )
    })?;

    let input_frames = wav.num_frames();
    let expected =
        (input_frames as f64 * f64::from(to_rate) / f64::from(from_rate)).round() as usize;
    let delay = resampler.output_delay();

    let mut out: Vec<Vec<f32>> = vec![Vec::with_capacity(expected + delay + CHUNK); num_channels];
    let mut pos = 0;

    // Input is zero-padded past the end until the delayed tail has been flushed.
    while out[0].len() < delay + expected {
        let mut block = vec![vec![0.0f32; CHUNK]; num_channels];
        if pos < input_frames {
            let end = (pos + CHUNK).min(input_frames);
            for (dst, src) in block.iter_mut().zip(wav.channels()) {
                dst[..end - pos].copy_from_slice(&src[pos..end]);
            }
        }
        pos += CHUNK;

        let frames = resampler.process(&block, None).map_err(|e| {
            ServiceError::with_source(ErrorCode::DecodeError, "resampling failed", e)
        })?;
        for (dst, src) in out.iter_mut().zip(frames) {
            dst.extend_from_slice(&src);
        }
    }

    let channels = out
        .into_iter()
        .map(|channel| channel[delay..delay + expected].to_vec())
        .collect();

    tracing::debug!(from_rate, to_rate, input_frames, output_frames = expected, "resampled melody");
    Ok(Waveform::new(channels, to_rate))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sample_rate: u32, seconds: f32) -> Vec<f32> {
        let n = (sample_rate as f32 * seconds) as usize;
        (0..n)
            .map(|t| (2.0 * std::f32::consts::PI * freq * t as f32 / sample_rate as f32).sin() * 0.5)
            .collect()
    }

    #[test]
    fn resamples_to_target_rate_and_length() {
        let wav = Waveform::mono(sine(440.0, 44100, 1.0), 44100);
        let out = convert_audio(&wav, 32000, 1).unwrap();
        assert_eq!(out.sample_rate(), 32000);
        assert_eq!(out.num_frames(), 32000);
        // Energy survives the conversion
        assert!((out.rms() - wav.rms()).abs() < 0.05);
    }

    #[test]
    fn same_rate_is_passthrough() {
        let wav = Waveform::mono(vec![0.1, 0.2, 0.3], 32000);
        let out = convert_audio(&wav, 32000, 1).unwrap();
        assert_eq!(out, wav);
    }

    #[test]
    fn downmix_to_mono_averages() {
        let wav = Waveform::new(vec![vec![1.0, 0.0], vec![0.0, 1.0]], 32000);
        let out = convert_audio(&wav, 32000, 1).unwrap();
        assert_eq!(out.channel(0), Some(&[0.5, 0.5][..]));
    }

    #[test]
    fn mono_duplicates_to_stereo() {
        let wav = Waveform::mono(vec![0.25, -0.25], 32000);
        let out = convert_audio(&wav, 32000, 2).unwrap();
        assert_eq!(out.num_channels(), 2);
        assert_eq!(out.channel(0), out.channel(1));
    }

    #[test]
    fn extra_channels_are_truncated() {
        let wav = Waveform::new(vec![vec![0.1], vec![0.2], vec![0.3]], 32000);
        let out = convert_audio(&wav, 32000, 2).unwrap();
        assert_eq!(out.channels(), &[vec![0.1], vec![0.2]]);
    }

    #[test]
    fn stereo_to_more_channels_fails() {
        let wav = Waveform::new(vec![vec![0.1], vec![0.2]], 32000);
        let err = convert_audio(&wav, 32000, 3).unwrap_err();
        assert_eq!(err.code, ErrorCode::DecodeError);
    }

    #[test]
    fn stereo_resample_keeps_channels() {
        let left = sine(220.0, 48000, 0.5);
        let right = sine(330.0, 48000, 0.5);
        let wav = Waveform::new(vec![left, right], 48000);
        let out = convert_audio(&wav, 32000, 2).unwrap();
        assert_eq!(out.num_channels(), 2);
        assert_eq!(out.num_frames(), 16000);
    }
}
