//! Command-line interface.
//!
//! One-shot generation from the shell, or `--daemon` for the JSON-RPC host.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::{Device, ServiceConfig};
use crate::types::{GenerationRequest, MAX_DURATION_SEC, MIN_DURATION_SEC};

/// Execution device selectable on the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum DeviceArg {
    /// Pick the best available accelerator
    #[default]
    Auto,
    /// CPU only
    Cpu,
    /// NVIDIA GPU through CUDA
    Cuda,
    /// Apple Silicon through CoreML
    Metal,
}

impl From<DeviceArg> for Device {
    fn from(arg: DeviceArg) -> Self {
        match arg {
            DeviceArg::Auto => Device::Auto,
            DeviceArg::Cpu => Device::Cpu,
            DeviceArg::Cuda => Device::Cuda,
            DeviceArg::Metal => Device::Metal,
        }
    }
}

/// songstarter: generate a song starter from a text description
#[derive(Parser, Debug)]
#[command(name = "songstarter")]
#[command(about = "Text and melody conditioned music generation with MusicGen")]
#[command(version)]
pub struct Cli {
    /// Genre, mood, instruments, key and tempo of the music to generate
    #[arg(long)]
    pub description: Option<String>,

    /// Length of the generated audio in seconds
    #[arg(
        short,
        long,
        default_value = "10",
        value_parser = clap::value_parser!(u32).range(MIN_DURATION_SEC as i64..=MAX_DURATION_SEC as i64)
    )]
    pub duration: u32,

    /// Audio file whose melody conditions the generation. The ONNX MusicGen
    /// models reject it unless their decoder accepts melody input
    #[arg(long)]
    pub melody: Option<PathBuf>,

    /// Random seed for reproducible generation
    #[arg(short, long)]
    pub seed: Option<u64>,

    /// Directory containing the ONNX model files
    #[arg(short, long)]
    pub model_dir: Option<PathBuf>,

    /// Directory generated files are written to
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Execution device (overrides SONGSTARTER_DEVICE)
    #[arg(long, value_enum)]
    pub device: Option<DeviceArg>,

    /// Intra-op thread count (overrides SONGSTARTER_THREADS)
    #[arg(long)]
    pub threads: Option<u32>,

    /// Run in daemon mode (JSON-RPC over stdio)
    #[arg(long)]
    pub daemon: bool,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Returns true if running in CLI mode (not daemon mode).
    pub fn is_cli_mode(&self) -> bool {
        !self.daemon && self.description.is_some()
    }

    /// Returns true if running in daemon mode.
    pub fn is_daemon_mode(&self) -> bool {
        self.daemon
    }

    /// Applies flags on top of an environment-derived configuration.
    pub fn apply_to(&self, config: &mut ServiceConfig) {
        if let Some(dir) = &self.model_dir {
            config.model_path = Some(dir.clone());
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = Some(dir.clone());
        }
        if let Some(device) = self.device {
            config.device = device.into();
        }
        if let Some(threads) = self.threads {
            config.threads = Some(threads);
        }
    }

    /// Builds the generation request described by the flags.
    pub fn request(&self) -> Option<GenerationRequest> {
        let description = self.description.as_ref()?;
        let mut request = GenerationRequest::new(description.clone(), self.duration);
        request.melody_path = self.melody.clone();
        request.seed = self.seed;
        Some(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("songstarter").chain(args.iter().copied()))
    }

    #[test]
    fn duration_defaults_to_ten() {
        let cli = parse(&["--description", "lofi"]).unwrap();
        assert_eq!(cli.duration, 10);
        assert!(cli.is_cli_mode());
        assert!(!cli.is_daemon_mode());
    }

    #[test]
    fn duration_is_bounded() {
        assert!(parse(&["--description", "lofi", "--duration", "4"]).is_err());
        assert!(parse(&["--description", "lofi", "--duration", "31"]).is_err());
        assert_eq!(
            parse(&["--description", "lofi", "--duration", "30"])
                .unwrap()
                .duration,
            30
        );
    }

    #[test]
    fn request_carries_melody_and_seed() {
        let cli = parse(&[
            "--description",
            "acoustic, guitar, melody, trap, d minor, 90 bpm",
            "--melody",
            "/tmp/hum.wav",
            "--seed",
            "7",
        ])
        .unwrap();
        let request = cli.request().unwrap();
        assert_eq!(request.duration_sec, 10);
        assert_eq!(request.melody_path, Some(PathBuf::from("/tmp/hum.wav")));
        assert_eq!(request.seed, Some(7));
    }

    #[test]
    fn melody_help_names_model_requirement() {
        let command = Cli::command();
        let melody = command
            .get_arguments()
            .find(|arg| arg.get_id() == "melody")
            .unwrap();
        let help = melody.get_help().unwrap().to_string();
        assert!(help.contains("reject it unless"), "got {help}");
    }

    #[test]
    fn daemon_mode_needs_no_description() {
        let cli = parse(&["--daemon"]).unwrap();
        assert!(cli.is_daemon_mode());
        assert!(!cli.is_cli_mode());
        assert!(cli.request().is_none());
    }

    #[test]
    fn flags_override_config() {
        let cli = parse(&["--daemon", "--device", "cpu", "--threads", "2", "-m", "/models"]).unwrap();
        let mut config = ServiceConfig {
            device: Device::Cuda,
            ..ServiceConfig::default()
        };
        cli.apply_to(&mut config);
        assert_eq!(config.device, Device::Cpu);
        assert_eq!(config.threads, Some(2));
        assert_eq!(config.model_path, Some(PathBuf::from("/models")));
        assert!(config.output_dir.is_none());
    }
}
