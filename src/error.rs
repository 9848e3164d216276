//! Error types for songstarter.
//!
//! Every failure that can reach a front-end host is a [`ServiceError`]
//! carrying an [`ErrorCode`]. Generation requests can only fail with
//! `DecodeError`, `GenerationError` or `EncodeError`; the remaining codes
//! are raised while bringing the model up or by front-end validation.

use std::fmt;

/// Error codes surfaced to callers.
///
/// These codes are used in JSON-RPC error responses and allow clients
/// to programmatically handle specific error conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// ONNX model files not found at expected path.
    /// Trigger: Model files missing from cache directory.
    ModelNotFound,

    /// Failed to load ONNX model into memory.
    /// Trigger: Corrupt file, wrong format, or OOM during load.
    ModelLoadFailed,

    /// Failed to download model from remote source.
    /// Trigger: Network error, disk full during download.
    ModelDownloadFailed,

    /// Melody input could not be decoded as audio.
    /// Trigger: Missing file, non-audio file, unsupported codec.
    DecodeError,

    /// The model provider failed during inference.
    /// Trigger: OOM, invalid duration, melody on a non-melody checkpoint.
    GenerationError,

    /// The generated audio could not be written to disk.
    /// Trigger: Disk full, permission denied, missing output directory.
    EncodeError,

    /// Requested duration is outside the range the front-end accepts.
    /// Trigger: Duration outside 5-30 seconds.
    InvalidDuration,
}

impl ErrorCode {
    /// Returns the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ModelNotFound => "MODEL_NOT_FOUND",
            ErrorCode::ModelLoadFailed => "MODEL_LOAD_FAILED",
            ErrorCode::ModelDownloadFailed => "MODEL_DOWNLOAD_FAILED",
            ErrorCode::DecodeError => "DECODE_ERROR",
            ErrorCode::GenerationError => "GENERATION_ERROR",
            ErrorCode::EncodeError => "ENCODE_ERROR",
            ErrorCode::InvalidDuration => "INVALID_DURATION",
        }
    }

    /// Returns a human-readable description of the error.
    pub fn description(&self) -> &'static str {
        match self {
            ErrorCode::ModelNotFound => "ONNX model files not found at expected path",
            ErrorCode::ModelLoadFailed => "Failed to load ONNX model into memory",
            ErrorCode::ModelDownloadFailed => "Failed to download model from remote source",
            ErrorCode::DecodeError => "Melody audio could not be decoded",
            ErrorCode::GenerationError => "Model inference failed during generation",
            ErrorCode::EncodeError => "Generated audio could not be written",
            ErrorCode::InvalidDuration => "Duration must be between 5 and 30 seconds",
        }
    }

    /// Returns a recovery hint suggesting how to resolve this error.
    pub fn recovery_hint(&self) -> &'static str {
        match self {
            ErrorCode::ModelNotFound => {
                "Run once with network access to download models automatically, \
                 or manually download from https://huggingface.co/gabotechs/music_gen"
            }
            ErrorCode::ModelLoadFailed => {
                "Check available memory (4GB+ recommended), verify model files are not corrupted, \
                 or delete the model directory and re-download"
            }
            ErrorCode::ModelDownloadFailed => {
                "Check internet connection, verify disk space (500MB+ required), \
                 or try again later if HuggingFace is unavailable"
            }
            ErrorCode::DecodeError => {
                "Upload a readable audio file (wav, flac, mp3, ogg) or leave the melody empty"
            }
            ErrorCode::GenerationError => {
                "Try a shorter duration, drop the melody if the model has no melody conditioner, \
                 or use CPU-only mode with SONGSTARTER_DEVICE=cpu"
            }
            ErrorCode::EncodeError => {
                "Check free disk space and that SONGSTARTER_OUTPUT_DIR exists and is writable"
            }
            ErrorCode::InvalidDuration => {
                "Specify a duration between 5 and 30 seconds (e.g., duration_sec: 10)"
            }
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Main error type for service operations.
#[derive(Debug)]
pub struct ServiceError {
    /// The error code identifying the type of error.
    pub code: ErrorCode,
    /// Human-readable error message with context.
    pub message: String,
    /// Optional underlying cause of the error.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ServiceError {
    /// Creates a new ServiceError with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new ServiceError with an underlying cause.
    pub fn with_source(
        code: ErrorCode,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a MODEL_NOT_FOUND error.
    pub fn model_not_found(path: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ModelNotFound,
            format!("Model files not found at: {}", path.into()),
        )
    }

    /// Creates a MODEL_LOAD_FAILED error.
    pub fn model_load_failed(reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ModelLoadFailed,
            format!("Failed to load model: {}", reason.into()),
        )
    }

    /// Creates a MODEL_DOWNLOAD_FAILED error.
    pub fn model_download_failed(reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ModelDownloadFailed,
            format!("Failed to download model: {}", reason.into()),
        )
    }

    /// Creates a DECODE_ERROR error.
    pub fn decode_failed(reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::DecodeError,
            format!("Failed to decode melody: {}", reason.into()),
        )
    }

    /// Creates a GENERATION_ERROR error.
    pub fn generation_failed(reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::GenerationError,
            format!("Generation failed: {}", reason.into()),
        )
    }

    /// Creates an ENCODE_ERROR error.
    pub fn encode_failed(reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::EncodeError,
            format!("Failed to write audio: {}", reason.into()),
        )
    }

    /// Creates an INVALID_DURATION error.
    pub fn invalid_duration(duration: u32) -> Self {
        Self::new(
            ErrorCode::InvalidDuration,
            format!(
                "Invalid duration: {} seconds (must be between 5 and 30)",
                duration
            ),
        )
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}. Recovery: {}",
            self.code,
            self.message,
            self.code.recovery_hint()
        )
    }
}

impl std::error::Error for ServiceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Result type alias using ServiceError.
pub type Result<T> = std::result::Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_as_str() {
        assert_eq!(ErrorCode::ModelNotFound.as_str(), "MODEL_NOT_FOUND");
        assert_eq!(ErrorCode::ModelLoadFailed.as_str(), "MODEL_LOAD_FAILED");
        assert_eq!(ErrorCode::ModelDownloadFailed.as_str(), "MODEL_DOWNLOAD_FAILED");
        assert_eq!(ErrorCode::DecodeError.as_str(), "DECODE_ERROR");
        assert_eq!(ErrorCode::GenerationError.as_str(), "GENERATION_ERROR");
        assert_eq!(ErrorCode::EncodeError.as_str(), "ENCODE_ERROR");
        assert_eq!(ErrorCode::InvalidDuration.as_str(), "INVALID_DURATION");
    }

    #[test]
    fn every_code_has_description_and_hint() {
        let codes = [
            ErrorCode::ModelNotFound,
            ErrorCode::ModelLoadFailed,
            ErrorCode::ModelDownloadFailed,
            ErrorCode::DecodeError,
            ErrorCode::GenerationError,
            ErrorCode::EncodeError,
            ErrorCode::InvalidDuration,
        ];
        for code in codes {
            assert!(!code.description().is_empty(), "{code} has no description");
            assert!(!code.recovery_hint().is_empty(), "{code} has no recovery hint");
        }
    }

    #[test]
    fn service_error_display() {
        let err = ServiceError::invalid_duration(45);
        assert!(err.to_string().contains("INVALID_DURATION"));
        assert!(err.to_string().contains("45"));
        assert!(err.to_string().contains("Recovery:"));
    }

    #[test]
    fn with_source_exposes_cause() {
        use std::error::Error;

        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let err = ServiceError::with_source(ErrorCode::EncodeError, "cannot create output", io);
        assert_eq!(err.code, ErrorCode::EncodeError);
        assert!(err.source().is_some());
    }
}
