//! Music generation.
//!
//! - [`ModelProvider`]: the pretrained model seam
//! - [`GenerationService`]: request to file, shared across callers

pub mod provider;
pub mod service;

pub use provider::ModelProvider;
pub use service::{GenerationService, ModelInfo, TEXT_CANDIDATES};
