//! # Beatsync
//!
//! Extract the musical features a video editor needs to cut to music.
//!
//! Given an audio file, or a mono waveform that has already been decoded,
//! beatsync estimates the tempo and beat grid, detects onsets and "dramatic
//! moments", and samples the spectral centroid and RMS energy about once per
//! second. The result is a single [`AnalysisReport`] that serializes to JSON.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use beatsync::{analyze_file, Config};
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let report = analyze_file("song.wav", &Config::default()).await;
//! println!("{}", report.to_json()?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`audio`] - Loading, the analysis stages, and the output record
//! - [`config`] - Configuration management
//! - [`error`] - Error types
//!
//! Analysis itself is synchronous and deterministic; only file decoding runs
//! on a tokio blocking task.

pub mod audio;
pub mod config;
pub mod error;

use std::path::PathBuf;

// Re-export commonly used types for convenience
pub use crate::{
    audio::{AnalysisReport, AnalysisResult, AudioAnalyzer, AudioLoader, FeatureSeries, Waveform},
    config::Config,
    error::{AudioError, BeatsyncError, ConfigError, Result},
};

/// What to analyze: a file on disk or an already decoded mono waveform
#[derive(Debug, Clone)]
pub enum AudioInput {
    Path(PathBuf),
    Waveform(Waveform),
}

impl From<PathBuf> for AudioInput {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<&std::path::Path> for AudioInput {
    fn from(path: &std::path::Path) -> Self {
        Self::Path(path.to_path_buf())
    }
}

impl From<&str> for AudioInput {
    fn from(path: &str) -> Self {
        Self::Path(PathBuf::from(path))
    }
}

impl From<Waveform> for AudioInput {
    fn from(waveform: Waveform) -> Self {
        Self::Waveform(waveform)
    }
}

/// Analyze a file or waveform. Never fails: errors become a failure report.
pub async fn analyze<I: Into<AudioInput>>(input: I, config: &Config) -> AnalysisReport {
    match input.into() {
        AudioInput::Path(path) => analyze_file(path, config).await,
        AudioInput::Waveform(waveform) => analyze_waveform(&waveform, config),
    }
}

/// Analyze an already decoded waveform at its own sample rate
pub fn analyze_waveform(waveform: &Waveform, config: &Config) -> AnalysisReport {
    AudioAnalyzer::with_config(config.clone()).analyze(waveform)
}

/// Decode, downmix and resample a file, then analyze it
pub async fn analyze_file<P: Into<PathBuf>>(path: P, config: &Config) -> AnalysisReport {
    let path = path.into();
    match AudioLoader::load_waveform(&path, config.analysis.sample_rate).await {
        Ok(waveform) => analyze_waveform(&waveform, config),
        Err(e) => {
            tracing::error!("Failed to load {}: {}", path.display(), e);
            AnalysisReport::from(e)
        }
    }
}
