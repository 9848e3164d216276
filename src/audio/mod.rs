//! Audio input and output.
//!
//! Melody decoding and conversion on the way in; normalization and WAV
//! writing on the way out.

pub mod decode;
pub mod loudness;
pub mod resample;
pub mod wav;
pub mod write;

pub use decode::decode_audio;
pub use loudness::integrated_loudness;
pub use resample::convert_audio;
pub use wav::{write_wav, write_wav_to, WavEncoding};
pub use write::{
    audio_write, normalize_audio, normalize_loudness, AudioWriteOptions, NormalizationStrategy,
};
