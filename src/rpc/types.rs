//! JSON-RPC types for the songstarter protocol.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{ErrorCode, ServiceError};
use crate::types::{GenerationRequest, DEFAULT_DURATION_SEC, MAX_DURATION_SEC, MIN_DURATION_SEC};

/// JSON-RPC version constant.
pub const JSONRPC_VERSION: &str = "2.0";

/// A JSON-RPC request ID.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RequestId {
    Integer(i64),
    String(String),
}

impl From<i64> for RequestId {
    fn from(id: i64) -> Self {
        RequestId::Integer(id)
    }
}

impl From<String> for RequestId {
    fn from(id: String) -> Self {
        RequestId::String(id)
    }
}

/// A JSON-RPC request wrapper.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    pub id: RequestId,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// A JSON-RPC response wrapper.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse<T: Serialize> {
    pub jsonrpc: &'static str,
    pub id: RequestId,
    pub result: T,
}

impl<T: Serialize> JsonRpcResponse<T> {
    pub fn new(id: RequestId, result: T) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result,
        }
    }
}

/// A JSON-RPC error response.
#[derive(Debug, Serialize)]
pub struct JsonRpcErrorResponse {
    pub jsonrpc: &'static str,
    pub id: Option<RequestId>,
    pub error: JsonRpcError,
}

impl JsonRpcErrorResponse {
    pub fn new(id: Option<RequestId>, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            error,
        }
    }
}

/// A JSON-RPC error object.
#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<JsonRpcErrorData>,
}

/// Extended error data for application-specific errors.
#[derive(Debug, Serialize)]
pub struct JsonRpcErrorData {
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl JsonRpcError {
    /// Creates a parse error (-32700).
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::plain(-32700, message)
    }

    /// Creates an invalid request error (-32600).
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::plain(-32600, message)
    }

    /// Creates a method not found error (-32601).
    pub fn method_not_found(method: &str) -> Self {
        Self::plain(-32601, format!("Method not found: {}", method))
    }

    /// Creates an invalid params error (-32602).
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::plain(-32602, message)
    }

    /// Creates an internal error (-32603).
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::plain(-32603, message)
    }

    /// Creates an invalid duration error (-32005).
    pub fn invalid_duration(duration: u32) -> Self {
        Self::from(&ServiceError::invalid_duration(duration))
    }

    fn plain(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Application error code for a service error.
    pub fn code_for(code: ErrorCode) -> i32 {
        match code {
            ErrorCode::ModelNotFound => -32000,
            ErrorCode::ModelLoadFailed => -32001,
            ErrorCode::ModelDownloadFailed => -32002,
            ErrorCode::GenerationError => -32003,
            ErrorCode::DecodeError => -32004,
            ErrorCode::InvalidDuration => -32005,
            ErrorCode::EncodeError => -32006,
        }
    }
}

impl From<&ServiceError> for JsonRpcError {
    fn from(err: &ServiceError) -> Self {
        Self {
            code: Self::code_for(err.code),
            message: err.code.description().to_string(),
            data: Some(JsonRpcErrorData {
                error_code: err.code.as_str().to_string(),
                details: Some(err.message.clone()),
            }),
        }
    }
}

impl From<ServiceError> for JsonRpcError {
    fn from(err: ServiceError) -> Self {
        Self::from(&err)
    }
}

// ============================================================================
// generate
// ============================================================================

/// Parameters for a generate request.
#[derive(Debug, Deserialize)]
pub struct GenerateParams {
    /// Genre, mood, instruments, key and tempo, passed to the model verbatim.
    pub description: String,

    /// Length of the generated audio in seconds (5-30).
    #[serde(default = "default_duration")]
    pub duration_sec: u32,

    /// Optional melody file.
    #[serde(default)]
    pub melody_path: Option<PathBuf>,

    /// Random seed for reproducibility; null for random.
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_duration() -> u32 {
    DEFAULT_DURATION_SEC
}

impl GenerateParams {
    /// Validates the request parameters.
    pub fn validate(&self) -> Result<(), JsonRpcError> {
        if !(MIN_DURATION_SEC..=MAX_DURATION_SEC).contains(&self.duration_sec) {
            return Err(JsonRpcError::invalid_duration(self.duration_sec));
        }
        Ok(())
    }

    /// Converts into a service request.
    pub fn into_request(self) -> GenerationRequest {
        GenerationRequest {
            description: self.description,
            duration_sec: self.duration_sec,
            melody_path: self.melody_path,
            seed: self.seed,
        }
    }
}

/// Response for a generate request.
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateResult {
    /// Path offered for download.
    pub download_path: PathBuf,

    /// Path offered to an inline player (same file).
    pub playback_path: PathBuf,

    /// Audio sample rate in Hz.
    pub sample_rate: u32,

    /// Number of audio channels.
    pub channels: u16,

    /// Length of the written audio.
    pub duration_sec: f32,

    /// Wall-clock time for generation.
    pub generation_time_sec: f32,
}

// ============================================================================
// model_info / sweep_outputs
// ============================================================================

/// Response for a model_info request.
#[derive(Debug, Serialize, Deserialize)]
pub struct ModelInfoResult {
    pub model_version: String,
    pub sample_rate: u32,
    pub channels: usize,
    pub supports_melody: bool,
}

/// Parameters for a sweep_outputs request.
#[derive(Debug, Deserialize)]
pub struct SweepParams {
    /// Files older than this many seconds are removed.
    pub max_age_sec: u64,
}

/// Response for a sweep_outputs request.
#[derive(Debug, Serialize, Deserialize)]
pub struct SweepResult {
    pub removed: usize,
}
