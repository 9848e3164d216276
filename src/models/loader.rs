//! Model loader for MusicGen ONNX models.
//!
//! Handles loading all required model components and configuration.

use std::path::Path;

use serde_json::Value;

use crate::error::{Result, ServiceError};
use crate::types::ModelConfig;

use super::audio_codec::MusicGenAudioCodec;
use super::decoder::MusicGenDecoder;
use super::session::SessionOptions;
use super::text_encoder::MusicGenTextEncoder;

/// Complete set of loaded MusicGen models.
pub struct MusicGenModels {
    /// Text encoder for converting prompts to embeddings.
    pub text_encoder: MusicGenTextEncoder,
    /// Decoder for autoregressive token generation.
    pub decoder: MusicGenDecoder,
    /// Audio codec for converting tokens to audio samples.
    pub audio_codec: MusicGenAudioCodec,
    /// Model configuration.
    pub config: ModelConfig,
    /// Model version string.
    pub version: String,
}

/// Required model files for MusicGen.
pub const REQUIRED_MODEL_FILES: &[&str] = &[
    "tokenizer.json",
    "text_encoder.onnx",
    "decoder_model.onnx",
    "decoder_with_past_model.onnx",
    "encodec_decode.onnx",
];

/// Checks if all required model files exist in the directory.
///
/// Returns Ok(()) if all files exist, or an error listing missing files.
pub fn check_models(model_dir: &Path) -> Result<()> {
    let missing = missing_model_files(model_dir);

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ServiceError::model_not_found(format!(
            "Missing model files in {}: {}",
            model_dir.display(),
            missing.join(", ")
        )))
    }
}

/// Lists required model files absent from `model_dir`.
pub fn missing_model_files(model_dir: &Path) -> Vec<&'static str> {
    REQUIRED_MODEL_FILES
        .iter()
        .copied()
        .filter(|file| !model_dir.join(file).exists())
        .collect()
}

/// Loads all MusicGen model sessions from a directory.
///
/// The directory should contain:
/// - `tokenizer.json` - HuggingFace tokenizer
/// - `text_encoder.onnx` - T5 text encoder
/// - `decoder_model.onnx` - First pass decoder
/// - `decoder_with_past_model.onnx` - Decoder with KV cache
/// - `encodec_decode.onnx` - EnCodec audio decoder
///
/// Optionally:
/// - `config.json` - Model configuration (uses defaults if not present)
pub fn load_sessions(model_dir: &Path, options: &SessionOptions) -> Result<MusicGenModels> {
    check_models(model_dir)?;

    let config = load_or_default_config(model_dir)?;
    if let Some(reason) = config.validate() {
        return Err(ServiceError::model_load_failed(format!(
            "invalid model config: {}",
            reason
        )));
    }

    tracing::info!(dir = %model_dir.display(), device = %options.device, "loading text encoder");
    let text_encoder = MusicGenTextEncoder::load(model_dir, options)?;

    tracing::info!("loading decoder models");
    let decoder = MusicGenDecoder::load(model_dir, config.clone(), options)?;

    tracing::info!("loading audio codec");
    let audio_codec = MusicGenAudioCodec::load(model_dir, config.sample_rate, options)?;

    let version = detect_model_version(model_dir);
    tracing::info!(
        version = %version,
        sample_rate = config.sample_rate,
        channels = config.audio_channels,
        melody = config.melody_conditioning,
        "all models loaded"
    );

    Ok(MusicGenModels {
        text_encoder,
        decoder,
        audio_codec,
        config,
        version,
    })
}

/// Loads model configuration from config.json or uses defaults.
fn load_or_default_config(model_dir: &Path) -> Result<ModelConfig> {
    let config_path = model_dir.join("config.json");

    if !config_path.exists() {
        return Ok(ModelConfig::musicgen_small());
    }

    let content = std::fs::read_to_string(&config_path).map_err(|e| {
        ServiceError::model_load_failed(format!("Failed to read config.json: {}", e))
    })?;
    parse_config(&content)
}

/// Parses a HuggingFace MusicGen `config.json`.
///
/// Missing fields fall back to musicgen-small values.
pub fn parse_config(content: &str) -> Result<ModelConfig> {
    let json: Value = serde_json::from_str(content).map_err(|e| {
        ServiceError::model_load_failed(format!("Failed to parse config.json: {}", e))
    })?;

    let decoder = json.get("decoder").ok_or_else(|| {
        ServiceError::model_load_failed("config.json missing 'decoder' section")
    })?;
    let audio_encoder = json.get("audio_encoder");

    let defaults = ModelConfig::musicgen_small();
    let uint = |section: Option<&Value>, key: &str, default: u32| -> u32 {
        section
            .and_then(|s| s.get(key))
            .and_then(Value::as_u64)
            .map_or(default, |v| v as u32)
    };

    let sample_rate = uint(audio_encoder, "sampling_rate", defaults.sample_rate);

    // EnCodec hop length is the product of its upsampling ratios
    let hop_length: u64 = audio_encoder
        .and_then(|a| a.get("upsampling_ratios"))
        .and_then(Value::as_array)
        .map(|ratios| ratios.iter().filter_map(Value::as_u64).product())
        .unwrap_or(0);
    let frame_rate = if hop_length > 0 {
        (u64::from(sample_rate) / hop_length) as u32
    } else {
        defaults.frame_rate
    };

    let audio_channels = decoder
        .get("audio_channels")
        .or_else(|| json.get("audio_channels"))
        .and_then(Value::as_u64)
        .map_or(defaults.audio_channels, |v| v as u16);

    let melody_conditioning = json
        .get("model_type")
        .and_then(Value::as_str)
        .is_some_and(|model_type| model_type.contains("melody"));

    let num_attention_heads = uint(
        Some(decoder),
        "num_attention_heads",
        defaults.num_attention_heads,
    );
    let d_model = uint(Some(decoder), "hidden_size", defaults.d_model);

    Ok(ModelConfig {
        vocab_size: uint(Some(decoder), "vocab_size", defaults.vocab_size),
        num_hidden_layers: uint(Some(decoder), "num_hidden_layers", defaults.num_hidden_layers),
        num_attention_heads,
        d_model,
        d_kv: d_model / num_attention_heads.max(1),
        audio_channels,
        sample_rate,
        frame_rate,
        codebooks: uint(Some(decoder), "num_codebooks", defaults.codebooks),
        pad_token_id: decoder
            .get("pad_token_id")
            .and_then(Value::as_i64)
            .unwrap_or(defaults.pad_token_id),
        melody_conditioning,
    })
}

/// Detects model version from directory structure.
fn detect_model_version(model_dir: &Path) -> String {
    let dir_name = model_dir
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown");

    let size = if dir_name.contains("medium") {
        "medium"
    } else if dir_name.contains("large") {
        "large"
    } else {
        "small"
    };
    let variant = if dir_name.contains("melody") {
        "-melody"
    } else if dir_name.contains("stereo") {
        "-stereo"
    } else {
        ""
    };
    let precision = if dir_name.contains("fp32") { "fp32" } else { "fp16" };

    format!("musicgen{variant}-{size}-{precision}-v1")
}

/// HuggingFace model URLs for musicgen-small-fp16.
pub const MODEL_URLS: &[(&str, &str)] = &[
    (
        "config.json",
        "https://huggingface.co/gabotechs/music_gen/resolve/main/small/config.json",
    ),
    (
        "tokenizer.json",
        "https://huggingface.co/gabotechs/music_gen/resolve/main/small/tokenizer.json",
    ),
    (
        "text_encoder.onnx",
        "https://huggingface.co/gabotechs/music_gen/resolve/main/small_fp16/text_encoder.onnx",
    ),
    (
        "decoder_model.onnx",
        "https://huggingface.co/gabotechs/music_gen/resolve/main/small_fp16/decoder_model.onnx",
    ),
    (
        "decoder_with_past_model.onnx",
        "https://huggingface.co/gabotechs/music_gen/resolve/main/small_fp16/decoder_with_past_model.onnx",
    ),
    (
        "encodec_decode.onnx",
        "https://huggingface.co/gabotechs/music_gen/resolve/main/small_fp16/encodec_decode.onnx",
    ),
];
