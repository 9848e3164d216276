//! Melody decoding.
//!
//! Decodes any container and codec symphonia knows about into a
//! [`Waveform`] at the file's native sample rate, keeping every channel.

use std::fs::File;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::{ErrorCode, Result, ServiceError};
use crate::types::Waveform;

/// Decodes an audio file into a waveform.
///
/// Fails with `DECODE_ERROR` if the file cannot be opened, is not audio,
/// or contains no samples.
pub fn decode_audio(path: &Path) -> Result<Waveform> {
    let file = File::open(path).map_err(|e| {
        ServiceError::with_source(
            ErrorCode::DecodeError,
            format!("Failed to open melody {}", path.display()),
            e,
        )
    })?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(extension);
    }

    let mut format = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| {
            ServiceError::with_source(
                ErrorCode::DecodeError,
                format!("{} is not a recognized audio file", path.display()),
                e,
            )
        })?
        .format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| {
            ServiceError::decode_failed(format!("no audio track in {}", path.display()))
        })?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| {
            ServiceError::with_source(
                ErrorCode::DecodeError,
                format!("unsupported codec in {}", path.display()),
                e,
            )
        })?;

    let mut interleaved: Vec<f32> = Vec::new();
    let mut num_channels = 0usize;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(SymphoniaError::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => {
                return Err(ServiceError::with_source(
                    ErrorCode::DecodeError,
                    format!("failed reading {}", path.display()),
                    e,
                ));
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            // Corrupt packet, skip it
            Err(SymphoniaError::DecodeError(_)) => continue,
            Err(e) => {
                return Err(ServiceError::with_source(
                    ErrorCode::DecodeError,
                    format!("failed decoding {}", path.display()),
                    e,
                ));
            }
        };

        let spec = *decoded.spec();
        num_channels = spec.channels.count();
        sample_rate.get_or_insert(spec.rate);

        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buffer.copy_interleaved_ref(decoded);
        interleaved.extend_from_slice(buffer.samples());
    }

    let sample_rate = sample_rate.unwrap_or(0);
    if interleaved.is_empty() || num_channels == 0 || sample_rate == 0 {
        return Err(ServiceError::decode_failed(format!(
            "no audio data found in {}",
            path.display()
        )));
    }

    let waveform = Waveform::from_interleaved(&interleaved, num_channels, sample_rate);
    tracing::debug!(
        path = %path.display(),
        channels = waveform.num_channels(),
        sample_rate,
        duration_sec = waveform.duration_sec(),
        "decoded melody"
    );
    Ok(waveform)
}
