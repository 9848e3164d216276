//! Normalization and the scoped audio writer.

use std::path::PathBuf;

use super::loudness::integrated_loudness;
use super::wav::{write_wav_to, WavEncoding};
use crate::error::{ErrorCode, Result, ServiceError};
use crate::output::PendingOutput;
use crate::types::Waveform;

/// RMS energy below which loudness normalization leaves audio untouched.
pub const LOUDNESS_ENERGY_FLOOR: f32 = 2e-3;

/// How the waveform level is adjusted before encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NormalizationStrategy {
    /// Rescale so the peak sits `peak_clip_headroom_db` below full scale.
    #[default]
    Peak,
    /// Clamp samples to `peak_clip_headroom_db` below full scale.
    Clip,
    /// Rescale mono RMS to `rms_headroom_db` below full scale, then clip.
    Rms,
    /// Rescale integrated loudness to `-loudness_headroom_db` LUFS, then clip.
    Loudness,
    /// Write samples as they are.
    None,
}

/// Options for [`audio_write`] and [`normalize_audio`].
#[derive(Debug, Clone, PartialEq)]
pub struct AudioWriteOptions {
    pub strategy: NormalizationStrategy,
    /// When false, Peak and Rms only ever attenuate.
    pub normalize: bool,
    pub peak_clip_headroom_db: f32,
    pub rms_headroom_db: f32,
    pub loudness_headroom_db: f32,
    /// Apply `tanh` after loudness gain.
    pub loudness_compressor: bool,
    /// Log a warning when samples are clipped.
    pub log_clipping: bool,
    pub encoding: WavEncoding,
}

impl Default for AudioWriteOptions {
    fn default() -> Self {
        Self {
            strategy: NormalizationStrategy::Peak,
            normalize: true,
            peak_clip_headroom_db: 1.0,
            rms_headroom_db: 18.0,
            loudness_headroom_db: 14.0,
            loudness_compressor: false,
            log_clipping: false,
            encoding: WavEncoding::Pcm16,
        }
    }
}

impl AudioWriteOptions {
    /// Loudness normalization with the tanh compressor, as used for
    /// generated songs.
    pub fn loudness_compressed() -> Self {
        Self {
            strategy: NormalizationStrategy::Loudness,
            loudness_compressor: true,
            ..Self::default()
        }
    }
}

fn db_to_gain(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}

fn clip(wav: &mut Waveform, limit: f32, log_clipping: bool) {
    if log_clipping {
        let peak = wav.peak();
        if peak > limit {
            tracing::warn!(peak, limit, "clipping output audio");
        }
    }
    for sample in wav.channels_mut().iter_mut().flatten() {
        *sample = sample.clamp(-limit, limit);
    }
}

/// Rescales integrated loudness to `-headroom_db` LUFS.
///
/// Quiet audio (RMS below [`LOUDNESS_ENERGY_FLOOR`]) and audio too short to
/// measure are returned unchanged.
pub fn normalize_loudness(mut wav: Waveform, headroom_db: f32, compressor: bool) -> Waveform {
    let energy = wav.rms();
    if energy < LOUDNESS_ENERGY_FLOOR {
        return wav;
    }
    let Some(input_lufs) = integrated_loudness(&wav) else {
        return wav;
    };

    let delta_db = -f64::from(headroom_db) - input_lufs;
    let gain = 10f64.powf(delta_db / 20.0) as f32;
    wav.scale(gain);
    if compressor {
        for sample in wav.channels_mut().iter_mut().flatten() {
            *sample = sample.tanh();
        }
    }
    tracing::debug!(input_lufs, gain, compressor, "normalized loudness");
    wav
}

/// Applies the normalization strategy in `options` to a waveform.
pub fn normalize_audio(mut wav: Waveform, options: &AudioWriteOptions) -> Waveform {
    let peak_limit = db_to_gain(-options.peak_clip_headroom_db);

    match options.strategy {
        NormalizationStrategy::Peak => {
            let peak = wav.peak();
            if peak > 0.0 {
                let rescaling = peak_limit / peak;
                if options.normalize || rescaling < 1.0 {
                    wav.scale(rescaling);
                }
            }
        }
        NormalizationStrategy::Clip => clip(&mut wav, peak_limit, options.log_clipping),
        NormalizationStrategy::Rms => {
            let mono_rms = mono_rms(&wav);
            if mono_rms > 0.0 {
                let rescaling = db_to_gain(-options.rms_headroom_db) / mono_rms;
                if options.normalize || rescaling < 1.0 {
                    wav.scale(rescaling);
                }
            }
            clip(&mut wav, 1.0, options.log_clipping);
        }
        NormalizationStrategy::Loudness => {
            wav = normalize_loudness(
                wav,
                options.loudness_headroom_db,
                options.loudness_compressor,
            );
            clip(&mut wav, 1.0, options.log_clipping);
        }
        NormalizationStrategy::None => {}
    }
    wav
}

fn mono_rms(wav: &Waveform) -> f32 {
    let frames = wav.num_frames();
    let channels = wav.num_channels();
    if frames == 0 || channels == 0 {
        return 0.0;
    }
    let sum: f64 = (0..frames)
        .map(|t| {
            let mean = wav.channels().iter().map(|c| f64::from(c[t])).sum::<f64>() / channels as f64;
            mean * mean
        })
        .sum();
    (sum / frames as f64).sqrt() as f32
}

/// Normalizes `wav` and writes it into `dest`, persisting the file only
/// once the WAV is finalized.
///
/// NaN or infinite samples are rejected before normalization. On any
/// failure `dest` is dropped, which deletes the partial file.
pub fn audio_write(dest: PendingOutput, wav: &Waveform, options: &AudioWriteOptions) -> Result<PathBuf> {
    if wav.is_empty() {
        return Err(ServiceError::encode_failed("waveform has no samples"));
    }
    if !wav.is_finite() {
        return Err(ServiceError::encode_failed("waveform contains NaN or infinite samples"));
    }

    let normalized = normalize_audio(wav.clone(), options);

    write_wav_to(&normalized, std::io::BufWriter::new(dest.as_file()), options.encoding)?;
    dest.as_file().sync_all().map_err(|e| {
        ServiceError::with_source(ErrorCode::EncodeError, "Failed to flush output file", e)
    })?;

    let path = dest.persist()?;

    tracing::debug!(
        path = %path.display(),
        channels = normalized.num_channels(),
        sample_rate = normalized.sample_rate(),
        duration_sec = normalized.duration_sec(),
        "wrote audio"
    );
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputStore;
    use tempfile::tempdir;

    fn sine(amplitude: f32, sample_rate: u32, seconds: f32) -> Vec<f32> {
        let n = (sample_rate as f32 * seconds) as usize;
        (0..n)
            .map(|t| {
                amplitude
                    * (2.0 * std::f32::consts::PI * 997.0 * t as f32 / sample_rate as f32).sin()
            })
            .collect()
    }

    #[test]
    fn peak_strategy_leaves_one_db_headroom() {
        let wav = Waveform::mono(sine(0.3, 32000, 0.5), 32000);
        let out = normalize_audio(wav, &AudioWriteOptions::default());
        assert!((out.peak() - db_to_gain(-1.0)).abs() < 1e-4);
    }

    #[test]
    fn peak_without_normalize_only_attenuates() {
        let options = AudioWriteOptions {
            normalize: false,
            ..AudioWriteOptions::default()
        };
        let quiet = normalize_audio(Waveform::mono(vec![0.1, -0.2], 32000), &options);
        assert_eq!(quiet.peak(), 0.2);

        let loud = normalize_audio(Waveform::mono(vec![1.5, -0.2], 32000), &options);
        assert!((loud.peak() - db_to_gain(-1.0)).abs() < 1e-4);
    }

    #[test]
    fn clip_strategy_clamps() {
        let options = AudioWriteOptions {
            strategy: NormalizationStrategy::Clip,
            peak_clip_headroom_db: 0.0,
            ..AudioWriteOptions::default()
        };
        let out = normalize_audio(Waveform::mono(vec![2.0, -3.0, 0.5], 32000), &options);
        assert_eq!(out.channel(0), Some(&[1.0, -1.0, 0.5][..]));
    }

    #[test]
    fn rms_strategy_targets_headroom() {
        let options = AudioWriteOptions {
            strategy: NormalizationStrategy::Rms,
            ..AudioWriteOptions::default()
        };
        let out = normalize_audio(Waveform::mono(sine(0.5, 32000, 1.0), 32000), &options);
        assert!((out.rms() - db_to_gain(-18.0)).abs() < 1e-3);
    }

    #[test]
    fn loudness_reaches_minus_14_lufs() {
        let wav = Waveform::mono(sine(0.05, 32000, 3.0), 32000);
        let out = normalize_loudness(wav, 14.0, false);
        let lufs = integrated_loudness(&out).unwrap();
        assert!((lufs + 14.0).abs() < 0.5, "got {lufs}");
    }

    #[test]
    fn loudness_leaves_quiet_audio_unchanged() {
        let wav = Waveform::mono(sine(0.001, 32000, 3.0), 32000);
        let out = normalize_loudness(wav.clone(), 14.0, true);
        assert_eq!(out, wav);
    }

    #[test]
    fn loudness_leaves_short_audio_unchanged() {
        let wav = Waveform::mono(sine(0.5, 32000, 0.1), 32000);
        let out = normalize_loudness(wav.clone(), 14.0, true);
        assert_eq!(out, wav);
    }

    #[test]
    fn compressed_output_stays_in_range() {
        let wav = Waveform::mono(sine(0.9, 32000, 2.0), 32000);
        let out = normalize_audio(wav, &AudioWriteOptions::loudness_compressed());
        assert!(out.peak() <= 1.0);
    }

    #[test]
    fn audio_write_persists_wav() {
        let dir = tempdir().unwrap();
        let dest = OutputStore::new(dir.path()).create().unwrap();
        let wav = Waveform::new(vec![sine(0.5, 32000, 1.0), sine(0.5, 32000, 1.0)], 32000);

        let path = audio_write(dest, &wav, &AudioWriteOptions::loudness_compressed()).unwrap();

        assert!(path.exists());
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("wav"));
        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().channels, 2);
        assert_eq!(reader.spec().sample_rate, 32000);
        assert_eq!(reader.spec().bits_per_sample, 16);
        assert_eq!(reader.duration(), 32000);
    }

    #[test]
    fn audio_write_failure_removes_temp_file() {
        let dir = tempdir().unwrap();
        let dest = OutputStore::new(dir.path()).create().unwrap();
        let empty = Waveform::new(vec![Vec::new()], 32000);

        let err = audio_write(dest, &empty, &AudioWriteOptions::default()).unwrap_err();

        assert_eq!(err.code, ErrorCode::EncodeError);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn audio_write_rejects_non_finite_samples() {
        let dir = tempdir().unwrap();
        let store = OutputStore::new(dir.path());

        for bad in [f32::NAN, f32::INFINITY, f32::NEG_INFINITY] {
            let mut samples = sine(0.5, 32000, 1.0);
            samples[100] = bad;
            let wav = Waveform::mono(samples, 32000);

            let err = audio_write(
                store.create().unwrap(),
                &wav,
                &AudioWriteOptions::loudness_compressed(),
            )
            .unwrap_err();

            assert_eq!(err.code, ErrorCode::EncodeError);
            assert!(err.message.contains("NaN or infinite"));
            assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
        }
    }
}
