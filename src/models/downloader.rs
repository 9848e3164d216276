//! Model downloader for MusicGen ONNX models.
//!
//! Downloads model files from HuggingFace if not present locally.

use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use crate::error::{Result, ServiceError};

use super::loader::{missing_model_files, MODEL_URLS};

/// Downloads all required model files if not present.
///
/// Returns Ok(()) if all files exist or were successfully downloaded.
pub fn ensure_models(model_dir: &Path) -> Result<()> {
    if !model_dir.exists() {
        fs::create_dir_all(model_dir).map_err(|e| {
            ServiceError::model_download_failed(format!(
                "Failed to create model directory {}: {}",
                model_dir.display(),
                e
            ))
        })?;
    }

    let missing = missing_model_files(model_dir);
    if missing.is_empty() {
        tracing::debug!(dir = %model_dir.display(), "all model files present");
        return Ok(());
    }

    tracing::info!(
        count = missing.len(),
        dir = %model_dir.display(),
        "downloading missing model files (this may take several minutes on first run)"
    );

    for file in &missing {
        let url = model_url(file).ok_or_else(|| {
            ServiceError::model_download_failed(format!("No download URL for {}", file))
        })?;
        download_file_streaming(url, model_dir, file)?;
    }

    // config.json is optional; defaults cover its absence
    if !model_dir.join("config.json").exists() {
        if let Some(url) = model_url("config.json") {
            if let Err(e) = download_file_streaming(url, model_dir, "config.json") {
                tracing::warn!(error = %e, "config.json unavailable, using defaults");
            }
        }
    }

    tracing::info!("all models downloaded");
    Ok(())
}

fn model_url(file: &str) -> Option<&'static str> {
    MODEL_URLS
        .iter()
        .find(|(name, _)| *name == file)
        .map(|(_, url)| *url)
}

/// Streams `url` into `model_dir/file`.
///
/// The body is written to a temporary file in the same directory and
/// renamed into place once complete, so an interrupted download never
/// looks like a present model file.
fn download_file_streaming(url: &str, model_dir: &Path, file: &str) -> Result<()> {
    tracing::info!(file, "downloading");

    let client = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(3600))
        .build()
        .map_err(|e| {
            ServiceError::model_download_failed(format!("Failed to create HTTP client: {}", e))
        })?;

    let mut response = client.get(url).send().map_err(|e| {
        ServiceError::model_download_failed(format!("Failed to download {}: {}", url, e))
    })?;

    if !response.status().is_success() {
        return Err(ServiceError::model_download_failed(format!(
            "HTTP {} for {}",
            response.status(),
            url
        )));
    }

    let total_size = response.content_length().unwrap_or(0);

    let mut partial = tempfile::Builder::new()
        .prefix(".download-")
        .tempfile_in(model_dir)
        .map_err(|e| {
            ServiceError::model_download_failed(format!(
                "Failed to create file in {}: {}",
                model_dir.display(),
                e
            ))
        })?;

    let mut downloaded: u64 = 0;
    let mut buffer = [0u8; 65536];
    let mut last_progress = 0;

    loop {
        let bytes_read = response.read(&mut buffer).map_err(|e| {
            ServiceError::model_download_failed(format!("Failed to read response: {}", e))
        })?;

        if bytes_read == 0 {
            break;
        }

        partial.write_all(&buffer[..bytes_read]).map_err(|e| {
            ServiceError::model_download_failed(format!("Failed to write file: {}", e))
        })?;

        downloaded += bytes_read as u64;

        if total_size > 0 {
            let progress = (downloaded * 100 / total_size) as usize;
            if progress >= last_progress + 10 {
                tracing::debug!(file, progress, "download progress");
                last_progress = progress;
            }
        }
    }

    partial.persist(model_dir.join(file)).map_err(|e| {
        ServiceError::model_download_failed(format!("Failed to save {}: {}", file, e))
    })?;

    let size_mb = downloaded as f64 / (1024.0 * 1024.0);
    tracing::info!(file, size_mb, "downloaded");

    Ok(())
}
