//! ONNX Runtime session construction.

use std::path::Path;

use ort::execution_providers::{
    CPUExecutionProvider, CUDAExecutionProvider, CoreMLExecutionProvider,
    ExecutionProviderDispatch,
};
use ort::session::Session;

use crate::config::{Device, ServiceConfig};
use crate::error::{Result, ServiceError};

/// Options shared by every session of the model ensemble.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionOptions {
    pub device: Device,
    pub threads: Option<u32>,
}

impl From<&ServiceConfig> for SessionOptions {
    fn from(config: &ServiceConfig) -> Self {
        Self {
            device: config.device,
            threads: config.threads,
        }
    }
}

/// Returns the execution providers to try for a device, in priority order.
///
/// CPU is always last; ONNX Runtime falls through providers that are not
/// available in the linked build.
pub fn execution_providers(device: Device) -> Vec<ExecutionProviderDispatch> {
    let cpu = CPUExecutionProvider::default().build();
    match device {
        Device::Cpu => vec![cpu],
        Device::Cuda => vec![CUDAExecutionProvider::default().build(), cpu],
        Device::Metal => vec![CoreMLExecutionProvider::default().build(), cpu],
        Device::Auto => {
            if cfg!(target_os = "macos") {
                vec![CoreMLExecutionProvider::default().build(), cpu]
            } else {
                vec![CUDAExecutionProvider::default().build(), cpu]
            }
        }
    }
}

/// Loads one ONNX file into a session.
pub fn load_session(path: &Path, options: &SessionOptions) -> Result<Session> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let mut builder = Session::builder()
        .map_err(|e| ServiceError::model_load_failed(format!("Failed to create session: {}", e)))?
        .with_execution_providers(execution_providers(options.device))
        .map_err(|e| {
            ServiceError::model_load_failed(format!("Failed to set execution providers: {}", e))
        })?;

    if let Some(threads) = options.threads {
        builder = builder.with_intra_threads(threads as usize).map_err(|e| {
            ServiceError::model_load_failed(format!("Failed to set thread count: {}", e))
        })?;
    }

    let session = builder
        .commit_from_file(path)
        .map_err(|e| ServiceError::model_load_failed(format!("Failed to load {}: {}", name, e)))?;

    tracing::debug!(model = %name, device = %options.device, "loaded session");
    Ok(session)
}
