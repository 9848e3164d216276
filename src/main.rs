//! songstarter: text and melody conditioned music generation with MusicGen.
//!
//! This binary can run in two modes:
//! - CLI mode: generate one file and print its download and playback paths
//! - Daemon mode: JSON-RPC server over stdio

use clap::CommandFactory;

use songstarter::cli::Cli;
use songstarter::config::ServiceConfig;
use songstarter::error::{Result, ServiceError};
use songstarter::generation::GenerationService;
use songstarter::logging::init_logging;
use songstarter::models::{ensure_models, MusicGen, SessionOptions};
use songstarter::output::OutputStore;
use songstarter::rpc::{run_server, ServerState};

fn main() {
    init_logging();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse_args();

    let mut config = ServiceConfig::from_env();
    cli.apply_to(&mut config);
    if let Some(reason) = config.validate() {
        return Err(ServiceError::model_load_failed(format!(
            "invalid configuration: {}",
            reason
        )));
    }

    if cli.is_daemon_mode() {
        run_daemon_mode(&config)
    } else if cli.is_cli_mode() {
        run_cli_mode(&cli, &config)
    } else {
        let _ = Cli::command().print_help();
        Ok(())
    }
}

/// Downloads missing model files and loads the MusicGen provider.
fn load_service(config: &ServiceConfig) -> Result<GenerationService<MusicGen>> {
    let model_dir = config.effective_model_path();
    ensure_models(&model_dir)?;

    let provider = MusicGen::load(&model_dir, &SessionOptions::from(config))?;
    let store = OutputStore::new(config.effective_output_dir());
    tracing::info!(output_dir = %store.dir().display(), "output store ready");
    Ok(GenerationService::new(provider, store))
}

/// Generates one file and prints its download and playback paths.
fn run_cli_mode(cli: &Cli, config: &ServiceConfig) -> Result<()> {
    let Some(request) = cli.request() else {
        return Ok(());
    };

    let service = load_service(config)?;
    let result = service.generate(&request)?;

    println!("{}", result);
    tracing::info!(
        sample_rate = result.sample_rate,
        channels = result.channels,
        duration_sec = result.duration_sec,
        "done"
    );
    Ok(())
}

/// Runs the daemon mode (JSON-RPC server).
fn run_daemon_mode(config: &ServiceConfig) -> Result<()> {
    let service = load_service(config)?;

    if let Some(max_age) = config.retention() {
        match service.store().sweep(max_age) {
            Ok(removed) => tracing::info!(removed, "swept old outputs"),
            Err(e) => tracing::warn!(error = %e, "output sweep failed"),
        }
    }

    let info = service.model_info();
    tracing::info!(
        version = %info.version,
        sample_rate = info.sample_rate,
        channels = info.channels,
        melody = info.supports_melody,
        "model ready"
    );

    let state = ServerState::new(service);
    run_server(&state)
}
