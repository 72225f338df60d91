//! # Audio Analysis Module
//!
//! Turns a mono waveform into the feature set a video editor needs to cut to
//! music: tempo, beat grid, onsets, dramatic moments, and coarse brightness
//! and loudness curves.
//!
//! ## Pipeline
//!
//! - **Spectrum**: centered STFT shared by every stage ([`spectrum`])
//! - **Onsets**: log-mel spectral flux and peak picking ([`onset`])
//! - **Tempo & Beats**: autocorrelation tempogram plus dynamic-programming beat tracking ([`tempo`])
//! - **Dramatic Moments**: frames close to the loudest onset ([`peaks`])
//! - **Profile**: spectral centroid and RMS, about one point per second ([`profile`])
//! - **Result**: bounded, rounded output record ([`result`])
//!
//! ## Usage
//!
//! ```rust,no_run
//! use beatsync::audio::{AudioAnalyzer, AudioLoader};
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let waveform = AudioLoader::load_waveform("song.wav", 22050).await?;
//!
//! let analyzer = AudioAnalyzer::new();
//! let result = analyzer.try_analyze(&waveform)?;
//!
//! println!("Detected BPM: {}", result.bpm);
//! println!("Found {} beats", result.beats.len());
//! # Ok(())
//! # }
//! ```

pub mod analyzer;
pub mod loader;
pub mod onset;
pub mod peaks;
pub mod profile;
pub mod result;
pub mod spectrum;
pub mod synth;
pub mod tempo;
pub mod types;

pub use analyzer::AudioAnalyzer;
pub use loader::AudioLoader;
pub use result::{AnalysisReport, AnalysisResult, RawFeatures};
pub use tempo::TempoEstimate;
pub use types::{AudioData, AudioFormat, FeatureSeries, FrameGrid, OnsetEnvelope, Waveform};
