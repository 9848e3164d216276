//! JSON-RPC method handlers.

use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::Value;

use crate::generation::ModelProvider;

use super::server::ServerState;
use super::types::{
    GenerateParams, GenerateResult, JsonRpcError, ModelInfoResult, SweepParams, SweepResult,
};

/// Handles a JSON-RPC method call.
pub fn handle_request<P: ModelProvider>(
    method: &str,
    params: Value,
    state: &ServerState<P>,
) -> Result<Value, JsonRpcError> {
    match method {
        "generate" => handle_generate(params, state),
        "model_info" => handle_model_info(state),
        "sweep_outputs" => handle_sweep_outputs(params, state),
        "ping" => handle_ping(),
        "shutdown" => handle_shutdown(state),
        _ => Err(JsonRpcError::method_not_found(method)),
    }
}

fn to_value<T: Serialize>(result: T) -> Result<Value, JsonRpcError> {
    serde_json::to_value(result)
        .map_err(|e| JsonRpcError::internal_error(format!("Failed to serialize result: {}", e)))
}

/// Handles the ping method for health checks.
fn handle_ping() -> Result<Value, JsonRpcError> {
    Ok(serde_json::json!({ "status": "ok" }))
}

/// Handles the shutdown method.
fn handle_shutdown<P: ModelProvider>(state: &ServerState<P>) -> Result<Value, JsonRpcError> {
    state.shutdown();
    Ok(serde_json::json!({ "status": "shutting_down" }))
}

/// Handles the generate method.
fn handle_generate<P: ModelProvider>(
    params: Value,
    state: &ServerState<P>,
) -> Result<Value, JsonRpcError> {
    let params: GenerateParams = serde_json::from_value(params)
        .map_err(|e| JsonRpcError::invalid_params(format!("Invalid params: {}", e)))?;
    params.validate()?;

    let start = Instant::now();
    let result = state.service.generate(&params.into_request()).map_err(|e| {
        tracing::warn!(error = %e, "generate request failed");
        JsonRpcError::from(&e)
    })?;

    let (download, playback) = result.paths();
    to_value(GenerateResult {
        download_path: download.to_path_buf(),
        playback_path: playback.to_path_buf(),
        sample_rate: result.sample_rate,
        channels: result.channels,
        duration_sec: result.duration_sec,
        generation_time_sec: start.elapsed().as_secs_f32(),
    })
}

/// Handles the model_info method.
fn handle_model_info<P: ModelProvider>(state: &ServerState<P>) -> Result<Value, JsonRpcError> {
    let info = state.service.model_info();
    to_value(ModelInfoResult {
        model_version: info.version.clone(),
        sample_rate: info.sample_rate,
        channels: info.channels,
        supports_melody: info.supports_melody,
    })
}

/// Handles the sweep_outputs method.
fn handle_sweep_outputs<P: ModelProvider>(
    params: Value,
    state: &ServerState<P>,
) -> Result<Value, JsonRpcError> {
    let params: SweepParams = serde_json::from_value(params)
        .map_err(|e| JsonRpcError::invalid_params(format!("Invalid params: {}", e)))?;

    let removed = state
        .service
        .store()
        .sweep(Duration::from_secs(params.max_age_sec))
        .map_err(|e| JsonRpcError::from(&e))?;
    to_value(SweepResult { removed })
}
