use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use beatsync::{analyze_file, AnalysisReport, AudioLoader, Config};

const USAGE: &str = "Usage: beatsync <audio_file_path>";

#[derive(Parser)]
#[command(
    name = "beatsync",
    version,
    about = "Extract tempo, beats, onsets and dramatic moments from a music file",
    long_about = "Beatsync analyzes an audio file and prints a single JSON record with its tempo, beat grid, onsets, dramatic moments, and coarse spectral centroid and energy curves."
)]
struct Cli {
    /// Audio file path (WAV, MP3, FLAC, OGG, M4A, AAC)
    audio: Option<PathBuf>,

    /// Configuration file (optional)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Pretty-print the JSON record
    #[arg(long)]
    pretty: bool,

    /// Only check that every decoder is available
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            return emit(&AnalysisReport::failure(e.to_string().trim()), false, ExitCode::FAILURE)
        }
    };

    if let Err(e) = init_logging(cli.verbose) {
        return emit(&AnalysisReport::failure(format!("{:#}", e)), cli.pretty, ExitCode::FAILURE);
    }

    if cli.check {
        return match AudioLoader::check_decoders() {
            Ok(()) => {
                println!("{}", serde_json::json!({ "success": true }));
                ExitCode::SUCCESS
            }
            Err(e) => emit(&AnalysisReport::from(e), cli.pretty, ExitCode::FAILURE),
        };
    }

    let Some(audio) = cli.audio else {
        return emit(&AnalysisReport::failure(USAGE), cli.pretty, ExitCode::FAILURE);
    };

    let config = match load_config(cli.config.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            let report = AnalysisReport::failure(format!("{:#}", e));
            return emit(&report, cli.pretty, ExitCode::FAILURE);
        }
    };

    if let Err(e) = AudioLoader::ensure_decoder(&audio) {
        return emit(&AnalysisReport::from(e), cli.pretty, ExitCode::FAILURE);
    }

    info!("Starting beatsync v{}", env!("CARGO_PKG_VERSION"));
    info!("Audio: {:?}", audio);

    // Analysis failures are reported in the record itself
    let report = analyze_file(&audio, &config).await;
    emit(&report, cli.pretty, ExitCode::SUCCESS)
}

fn init_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    let config = match path {
        Some(config_path) => {
            info!("Loading configuration from {:?}", config_path);
            Config::from_file(config_path).with_context(|| {
                format!("Failed to load configuration from {}", config_path.display())
            })?
        }
        None => Config::default(),
    };
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Print the record on stdout and pass the exit code through
fn emit(report: &AnalysisReport, pretty: bool, code: ExitCode) -> ExitCode {
    let rendered = if pretty { report.to_json_pretty() } else { report.to_json() };
    match rendered {
        Ok(json) => {
            println!("{}", json);
            code
        }
        Err(e) => {
            println!("{}", serde_json::json!({ "success": false, "error": e.to_string() }));
            ExitCode::FAILURE
        }
    }
}
