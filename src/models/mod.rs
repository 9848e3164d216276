//! MusicGen model components.
//!
//! This module contains all the ONNX model wrappers for MusicGen:
//! - [`TextEncoder`](text_encoder::MusicGenTextEncoder): Text prompt encoding
//! - [`Decoder`](decoder::MusicGenDecoder): Autoregressive token generation
//! - [`AudioCodec`](audio_codec::MusicGenAudioCodec): Token to audio decoding
//! - [`DelayPattern`](delay_pattern::DelayPattern): Per-codebook delay pattern
//! - [`Logits`](logits::Logits): Logits processing and sampling
//! - [`MusicGen`](musicgen::MusicGen): The assembled model provider

pub mod audio_codec;
pub mod decoder;
pub mod delay_pattern;
pub mod downloader;
pub mod loader;
pub mod logits;
pub mod musicgen;
pub mod session;
pub mod text_encoder;

pub use audio_codec::MusicGenAudioCodec;
pub use decoder::{MusicGenDecoder, Sampling};
pub use delay_pattern::DelayPattern;
pub use downloader::ensure_models;
pub use loader::{check_models, load_sessions, MusicGenModels, MODEL_URLS, REQUIRED_MODEL_FILES};
pub use logits::Logits;
pub use musicgen::{MusicGen, MAX_DURATION_SEC};
pub use session::SessionOptions;
pub use text_encoder::MusicGenTextEncoder;
