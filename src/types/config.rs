//! ModelConfig type for MusicGen model parameters.
//!
//! Contains the configuration parameters for the MusicGen ONNX model
//! ensemble, matching the model's architecture requirements.

use serde::{Deserialize, Serialize};

/// Number of EnCodec codebooks the decoder generates in parallel.
pub const CODEBOOKS: u32 = 4;

/// Configuration parameters for the MusicGen model architecture.
///
/// These values are derived from the model's config.json and are required
/// for proper tensor shape allocation and inference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Token vocabulary size (typically 2048 for MusicGen).
    pub vocab_size: u32,

    /// Number of decoder transformer layers.
    pub num_hidden_layers: u32,

    /// Number of attention heads in each layer.
    pub num_attention_heads: u32,

    /// Hidden dimension size (embedding dimension).
    pub d_model: u32,

    /// Key/value dimension per attention head.
    /// Typically d_model / num_attention_heads.
    pub d_kv: u32,

    /// Number of output audio channels (1 for mono checkpoints, 2 for stereo).
    pub audio_channels: u16,

    /// Output sample rate in Hz.
    pub sample_rate: u32,

    /// Codec frames per second of audio.
    pub frame_rate: u32,

    /// Number of EnCodec codebooks (always 4 for MusicGen).
    pub codebooks: u32,

    /// Padding token ID for the decoder.
    pub pad_token_id: i64,

    /// Whether the checkpoint carries a chroma (melody) conditioner.
    pub melody_conditioning: bool,
}

impl ModelConfig {
    /// Creates a ModelConfig for the musicgen-small model.
    ///
    /// This is the default configuration matching the fp16 small model
    /// from gabotechs/music_gen on HuggingFace.
    pub fn musicgen_small() -> Self {
        Self {
            vocab_size: 2048,
            num_hidden_layers: 24,
            num_attention_heads: 16,
            d_model: 1024,
            d_kv: 64, // 1024 / 16 = 64
            audio_channels: 1,
            sample_rate: 32000,
            frame_rate: 50,
            codebooks: CODEBOOKS,
            pad_token_id: 2048, // vocab_size is used as pad token
            melody_conditioning: false,
        }
    }

    /// Validates the configuration for consistency.
    ///
    /// Returns an error message if validation fails, None otherwise.
    pub fn validate(&self) -> Option<String> {
        if self.vocab_size == 0 {
            return Some("vocab_size must be > 0".to_string());
        }

        if self.num_hidden_layers == 0 {
            return Some("num_hidden_layers must be > 0".to_string());
        }

        if self.num_attention_heads == 0 {
            return Some("num_attention_heads must be > 0".to_string());
        }

        if self.d_model == 0 {
            return Some("d_model must be > 0".to_string());
        }

        // d_kv should typically be d_model / num_attention_heads
        let expected_d_kv = self.d_model / self.num_attention_heads;
        if self.d_kv != expected_d_kv {
            return Some(format!(
                "d_kv ({}) should be d_model / num_attention_heads ({})",
                self.d_kv, expected_d_kv
            ));
        }

        if !(1..=2).contains(&self.audio_channels) {
            return Some(format!(
                "audio_channels must be 1 or 2, got {}",
                self.audio_channels
            ));
        }

        if self.sample_rate == 0 || self.frame_rate == 0 {
            return Some("sample_rate and frame_rate must be > 0".to_string());
        }

        if self.sample_rate % self.frame_rate != 0 {
            return Some(format!(
                "sample_rate ({}) must be a multiple of frame_rate ({})",
                self.sample_rate, self.frame_rate
            ));
        }

        if self.codebooks != CODEBOOKS {
            return Some(format!(
                "codebooks must be {}, got {}",
                CODEBOOKS, self.codebooks
            ));
        }

        None
    }

    /// Audio samples produced per codec frame.
    pub fn samples_per_frame(&self) -> usize {
        (self.sample_rate / self.frame_rate) as usize
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::musicgen_small()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn musicgen_small_config() {
        let config = ModelConfig::musicgen_small();
        assert_eq!(config.vocab_size, 2048);
        assert_eq!(config.num_hidden_layers, 24);
        assert_eq!(config.sample_rate, 32000);
        assert_eq!(config.codebooks, 4);
        assert!(!config.melody_conditioning);
        assert!(config.validate().is_none());
    }

    #[test]
    fn config_validation() {
        let mut config = ModelConfig::musicgen_small();
        config.d_kv = 128; // Wrong value
        assert!(config.validate().is_some());

        let mut config = ModelConfig::musicgen_small();
        config.audio_channels = 3;
        assert!(config.validate().is_some());
    }

    #[test]
    fn samples_per_frame() {
        // 32000 samples/sec / 50 frames/sec
        assert_eq!(ModelConfig::musicgen_small().samples_per_frame(), 640);
    }
}
