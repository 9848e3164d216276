//! Core types for songstarter.
//!
//! - [`GenerationRequest`] / [`Conditioning`]: what a caller asks for
//! - [`GenerationParams`]: per-call sampling configuration
//! - [`GenerationResult`]: the written artifact
//! - [`Waveform`]: multi-channel audio buffer
//! - [`ModelConfig`]: MusicGen architecture parameters

mod config;
mod params;
mod request;
mod result;
mod waveform;

pub use config::{ModelConfig, CODEBOOKS};
pub use params::{
    GenerationParams, DEFAULT_CFG_COEF, DEFAULT_DURATION_SEC, DEFAULT_TEMPERATURE, DEFAULT_TOP_K,
    MAX_DURATION_SEC, MIN_DURATION_SEC,
};
pub use request::{Conditioning, GenerationRequest};
pub use result::GenerationResult;
pub use waveform::Waveform;
