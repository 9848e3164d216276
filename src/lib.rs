//! songstarter: text and melody conditioned music generation.
//!
//! Turns a short description of genre, mood, instruments, key and tempo,
//! plus an optional melody file, into one loudness-normalized WAV file
//! generated by MusicGen through ONNX Runtime.
//!
//! # Modules
//!
//! - [`generation`]: the [`ModelProvider`] seam and the [`GenerationService`]
//! - [`models`]: the MusicGen ONNX provider and model download
//! - [`audio`]: melody decoding, resampling, loudness and WAV writing
//! - [`output`]: uniquely named output files and retention sweeps
//! - [`rpc`], [`cli`]: front-end hosts
//! - [`types`], [`config`], [`error`], [`logging`]: shared plumbing
//!
//! # Example
//!
//! ```rust,ignore
//! use songstarter::{GenerationRequest, GenerationService, OutputStore};
//! use songstarter::models::{MusicGen, SessionOptions};
//!
//! let provider = MusicGen::load(&model_dir, &SessionOptions::default())?;
//! let service = GenerationService::new(provider, OutputStore::temp());
//!
//! let result = service.generate(
//!     &GenerationRequest::new("acoustic, guitar, melody, trap, d minor, 90 bpm", 10),
//! )?;
//! let (download, playback) = result.paths();
//! ```

pub mod audio;
pub mod cli;
pub mod config;
pub mod error;
pub mod generation;
pub mod logging;
pub mod models;
pub mod output;
pub mod rpc;
pub mod types;

pub use config::{Device, ServiceConfig};
pub use error::{ErrorCode, Result, ServiceError};
pub use generation::{GenerationService, ModelProvider, TEXT_CANDIDATES};
pub use output::OutputStore;
pub use types::{Conditioning, GenerationParams, GenerationRequest, GenerationResult, Waveform};
