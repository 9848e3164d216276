//! Service configuration module.
//!
//! Contains the runtime configuration for songstarter: execution device,
//! model and output locations, and output retention.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Execution device for ONNX inference.
///
/// Determines which hardware backend to use for model inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    /// Automatically detect and use the best available device.
    /// Priority: Metal (macOS) > CUDA (Linux/Windows) > CPU
    #[default]
    Auto,

    /// Force CPU execution.
    /// Slowest but universally available.
    Cpu,

    /// Use CUDA for NVIDIA GPU acceleration.
    /// Requires CUDA toolkit and compatible GPU.
    Cuda,

    /// Use Metal/CoreML for Apple Silicon acceleration.
    /// Only available on macOS with Apple Silicon.
    Metal,
}

impl Device {
    /// Returns the string representation of the device.
    pub fn as_str(&self) -> &'static str {
        match self {
            Device::Auto => "auto",
            Device::Cpu => "cpu",
            Device::Cuda => "cuda",
            Device::Metal => "metal",
        }
    }

    /// Parses a device from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "auto" => Some(Device::Auto),
            "cpu" => Some(Device::Cpu),
            "cuda" => Some(Device::Cuda),
            "metal" | "coreml" => Some(Device::Metal),
            _ => None,
        }
    }
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Runtime configuration for the service.
///
/// Loaded from environment variables at startup, then overridden by
/// command-line flags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Path to the directory containing MusicGen ONNX model files.
    /// If None, uses the platform-specific default cache location.
    pub model_path: Option<PathBuf>,

    /// Directory generated WAV files are written to.
    /// If None, uses the system temporary directory.
    pub output_dir: Option<PathBuf>,

    /// Execution device for inference.
    pub device: Device,

    /// Number of threads for intra-op parallelism in ONNX Runtime.
    /// If None, uses ONNX Runtime's default (typically number of CPU cores).
    pub threads: Option<u32>,

    /// Generated files older than this are swept at daemon startup.
    /// If None, nothing is swept automatically.
    pub retention_secs: Option<u64>,
}

impl ServiceConfig {
    /// Creates a new ServiceConfig with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a ServiceConfig from environment variables.
    ///
    /// Reads the following environment variables:
    /// - `SONGSTARTER_MODEL_PATH` - Path to MusicGen model directory
    /// - `SONGSTARTER_OUTPUT_DIR` - Directory for generated files
    /// - `SONGSTARTER_DEVICE` - Device selection (auto, cpu, cuda, metal)
    /// - `SONGSTARTER_THREADS` - Number of threads for CPU execution
    /// - `SONGSTARTER_RETENTION_SECS` - Maximum age of generated files
    ///
    /// Falls back to defaults for unset or unparsable variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(path) = var("SONGSTARTER_MODEL_PATH") {
            config.model_path = Some(PathBuf::from(path));
        }

        if let Some(path) = var("SONGSTARTER_OUTPUT_DIR") {
            config.output_dir = Some(PathBuf::from(path));
        }

        if let Some(device_str) = var("SONGSTARTER_DEVICE") {
            match Device::parse(&device_str) {
                Some(device) => config.device = device,
                None => tracing::warn!(value = %device_str, "ignoring unknown SONGSTARTER_DEVICE"),
            }
        }

        if let Some(threads) = var("SONGSTARTER_THREADS").and_then(|s| s.parse::<u32>().ok()) {
            if threads > 0 {
                config.threads = Some(threads);
            }
        }

        if let Some(secs) = var("SONGSTARTER_RETENTION_SECS").and_then(|s| s.parse::<u64>().ok()) {
            if secs > 0 {
                config.retention_secs = Some(secs);
            }
        }

        config
    }

    /// Returns the effective model path, using platform defaults if not specified.
    pub fn effective_model_path(&self) -> PathBuf {
        self.model_path.clone().unwrap_or_else(default_model_path)
    }

    /// Returns the effective output directory, using the system temp dir if not specified.
    pub fn effective_output_dir(&self) -> PathBuf {
        self.output_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    /// Returns the retention window, if one is configured.
    pub fn retention(&self) -> Option<Duration> {
        self.retention_secs.map(Duration::from_secs)
    }

    /// Validates the configuration.
    ///
    /// Returns an error message if validation fails, None otherwise.
    pub fn validate(&self) -> Option<String> {
        if let Some(threads) = self.threads {
            if threads == 0 {
                return Some("threads must be > 0".to_string());
            }
            if threads > 256 {
                return Some(format!("threads too high: {} (max 256)", threads));
            }
        }

        if let Some(dir) = &self.output_dir {
            if dir.exists() && !dir.is_dir() {
                return Some(format!("output_dir is not a directory: {}", dir.display()));
            }
        }

        None
    }
}

/// Returns the platform-specific default model storage path.
///
/// Uses the `directories` crate to find appropriate locations:
/// - macOS: ~/Library/Caches/songstarter/musicgen
/// - Linux: ~/.cache/songstarter/musicgen
/// - Windows: C:\Users\<user>\AppData\Local\songstarter\cache\musicgen
fn default_model_path() -> PathBuf {
    if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "songstarter") {
        proj_dirs.cache_dir().join("musicgen")
    } else {
        PathBuf::from("./models")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn device_parsing() {
        assert_eq!(Device::parse("auto"), Some(Device::Auto));
        assert_eq!(Device::parse("CPU"), Some(Device::Cpu));
        assert_eq!(Device::parse("cuda"), Some(Device::Cuda));
        assert_eq!(Device::parse("metal"), Some(Device::Metal));
        assert_eq!(Device::parse("coreml"), Some(Device::Metal));
        assert_eq!(Device::parse("invalid"), None);
    }

    #[test]
    fn device_display() {
        assert_eq!(Device::Auto.to_string(), "auto");
        assert_eq!(Device::Cpu.to_string(), "cpu");
    }

    #[test]
    fn config_validation() {
        let mut config = ServiceConfig::new();
        assert!(config.validate().is_none());

        config.threads = Some(0);
        assert!(config.validate().is_some());

        config.threads = Some(4);
        assert!(config.validate().is_none());
    }

    #[test]
    fn output_dir_must_be_a_directory() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let config = ServiceConfig {
            output_dir: Some(file.path().to_path_buf()),
            ..ServiceConfig::default()
        };
        assert!(config.validate().is_some());
    }

    #[test]
    fn effective_paths() {
        let config = ServiceConfig::new();
        assert!(!config.effective_model_path().as_os_str().is_empty());
        assert_eq!(config.effective_output_dir(), std::env::temp_dir());
        assert!(config.retention().is_none());
    }

    #[test]
    fn from_env_defaults() {
        let config = ServiceConfig::from_lookup(lookup(&[]));
        assert_eq!(config, ServiceConfig::default());
    }

    #[test]
    fn from_env_reads_every_variable() {
        let config = ServiceConfig::from_lookup(lookup(&[
            ("SONGSTARTER_MODEL_PATH", "/models"),
            ("SONGSTARTER_OUTPUT_DIR", "/srv/out"),
            ("SONGSTARTER_DEVICE", "cuda"),
            ("SONGSTARTER_THREADS", "8"),
            ("SONGSTARTER_RETENTION_SECS", "3600"),
        ]));
        assert_eq!(config.model_path, Some(PathBuf::from("/models")));
        assert_eq!(config.effective_output_dir(), PathBuf::from("/srv/out"));
        assert_eq!(config.device, Device::Cuda);
        assert_eq!(config.threads, Some(8));
        assert_eq!(config.retention(), Some(Duration::from_secs(3600)));
    }

    #[test]
    fn from_env_ignores_bad_values() {
        let config = ServiceConfig::from_lookup(lookup(&[
            ("SONGSTARTER_DEVICE", "tpu"),
            ("SONGSTARTER_THREADS", "0"),
            ("SONGSTARTER_RETENTION_SECS", "soon"),
        ]));
        assert_eq!(config.device, Device::Auto);
        assert!(config.threads.is_none());
        assert!(config.retention_secs.is_none());
    }
}
