//! Text encoder wrapper for MusicGen.
//!
//! Handles tokenization and T5 text encoding for text prompts.

use std::borrow::Cow;
use std::path::Path;

use ort::session::{Session, SessionInputValue};
use ort::value::{DynValue, Tensor};
use tokenizers::Tokenizer;

use crate::error::{Result, ServiceError};

use super::session::{load_session, SessionOptions};

/// MusicGen text encoder combining tokenizer and T5 encoder.
pub struct MusicGenTextEncoder {
    tokenizer: Tokenizer,
    text_encoder: Session,
}

impl MusicGenTextEncoder {
    /// Creates a new text encoder from model directory.
    ///
    /// Loads `tokenizer.json` and `text_encoder.onnx` from the given directory.
    pub fn load(model_dir: &Path, options: &SessionOptions) -> Result<Self> {
        let tokenizer_path = model_dir.join("tokenizer.json");
        let encoder_path = model_dir.join("text_encoder.onnx");

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path).map_err(|e| {
            ServiceError::model_load_failed(format!("Failed to load tokenizer: {}", e))
        })?;

        tokenizer
            .with_padding(None)
            .with_truncation(None)
            .map_err(|e| {
                ServiceError::model_load_failed(format!("Failed to configure tokenizer: {}", e))
            })?;

        let text_encoder = load_session(&encoder_path, options)?;

        Ok(Self {
            tokenizer,
            text_encoder,
        })
    }

    /// Encodes text into embeddings and attention mask.
    ///
    /// Returns a tuple of (last_hidden_state, attention_mask) as DynValue tensors.
    pub fn encode(&mut self, text: &str) -> Result<(DynValue, DynValue)> {
        let tokens = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| ServiceError::generation_failed(format!("Tokenization failed: {}", e)))?
            .get_ids()
            .iter()
            .map(|e| *e as i64)
            .collect::<Vec<_>>();

        let tokens_len = tokens.len();
        tracing::trace!(tokens = tokens_len, "tokenized description");

        let input_ids = Tensor::from_array(([1, tokens_len], tokens)).map_err(|e| {
            ServiceError::generation_failed(format!("Failed to create input tensor: {}", e))
        })?;

        let attention_mask = Tensor::from_array(([1, tokens_len], vec![1i64; tokens_len]))
            .map_err(|e| {
                ServiceError::generation_failed(format!("Failed to create attention mask: {}", e))
            })?;

        let session_inputs: Vec<(Cow<str>, SessionInputValue)> = vec![
            (Cow::from("input_ids"), SessionInputValue::from(input_ids.view())),
            (
                Cow::from("attention_mask"),
                SessionInputValue::from(attention_mask.view()),
            ),
        ];

        let mut output = self.text_encoder.run(session_inputs).map_err(|e| {
            ServiceError::generation_failed(format!("Text encoder inference failed: {}", e))
        })?;

        let last_hidden_state = output.remove("last_hidden_state").ok_or_else(|| {
            ServiceError::generation_failed("last_hidden_state not found in output")
        })?;

        Ok((last_hidden_state, attention_mask.into_dyn()))
    }
}
