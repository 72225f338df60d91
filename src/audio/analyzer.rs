use crate::audio::onset::{onset_strength, OnsetDetector};
use crate::audio::peaks::PeakSelector;
use crate::audio::profile::{profile, SpectralProfile};
use crate::audio::result::{AnalysisReport, AnalysisResult, RawFeatures, ResultAssembler};
use crate::audio::spectrum::{Spectrogram, Stft};
use crate::audio::tempo::{BeatTracker, TempoEstimate, TempoEstimator};
use crate::audio::types::{FrameGrid, Waveform};
use crate::config::Config;
use crate::error::Result;

/// Rhythm and texture analysis of a mono waveform.
///
/// Runs the stages in a fixed order: spectrum, onset envelope, onsets, tempo,
/// beats, dramatic moments, spectral/energy profile, then bounds and rounds
/// the lot into an [`AnalysisResult`].
pub struct AudioAnalyzer {
    config: Config,
}

/// Output of the onset chain
struct Rhythm {
    bpm: f64,
    beats: Vec<f64>,
    onsets: Vec<f64>,
    peaks: Vec<f64>,
}

impl AudioAnalyzer {
    /// Create a new analyzer with default configuration
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Create a new analyzer with custom configuration
    pub fn with_config(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Analyze a waveform, folding any failure into the report.
    pub fn analyze(&self, waveform: &Waveform) -> AnalysisReport {
        match self.try_analyze(waveform) {
            Ok(result) => AnalysisReport::Success(result),
            Err(e) => {
                tracing::error!("Analysis failed: {}", e);
                AnalysisReport::from(e)
            }
        }
    }

    /// Analyze a waveform into the bounded, rounded result
    pub fn try_analyze(&self, waveform: &Waveform) -> Result<AnalysisResult> {
        let raw = self.extract(waveform)?;
        Ok(ResultAssembler::new(self.config.output.clone()).assemble(raw))
    }

    /// Run every stage and return the unbounded feature set
    pub fn extract(&self, waveform: &Waveform) -> Result<RawFeatures> {
        self.config.validate()?;

        tracing::info!(
            "Starting analysis of {:.2} seconds of audio at {} Hz",
            waveform.duration(),
            waveform.sample_rate()
        );

        let analysis = &self.config.analysis;
        let grid = analysis.frame_grid(waveform.sample_rate());
        let spectrogram = Stft::new(analysis.n_fft, analysis.hop_length)
            .magnitudes(waveform.samples(), waveform.sample_rate())?;
        tracing::debug!(
            "Spectrogram: {} frames x {} bins",
            spectrogram.n_frames(),
            spectrogram.n_bins()
        );

        let (rhythm, texture) = if analysis.parallel_stages {
            rayon::join(
                || self.rhythm(&spectrogram, &grid),
                || profile(waveform.samples(), &spectrogram, &grid),
            )
        } else {
            (
                self.rhythm(&spectrogram, &grid),
                profile(waveform.samples(), &spectrogram, &grid),
            )
        };

        tracing::info!(
            "Analysis complete: {:.1} BPM, {} beats, {} onsets, {} peaks",
            rhythm.bpm,
            rhythm.beats.len(),
            rhythm.onsets.len(),
            rhythm.peaks.len()
        );

        let SpectralProfile { spectral, energy } = texture;
        Ok(RawFeatures {
            duration: waveform.duration(),
            bpm: rhythm.bpm,
            beats: rhythm.beats,
            onsets: rhythm.onsets,
            peaks: rhythm.peaks,
            spectral,
            energy,
        })
    }

    fn rhythm(&self, spectrogram: &Spectrogram, grid: &FrameGrid) -> Rhythm {
        let envelope = onset_strength(spectrogram, &self.config.analysis);

        let onsets = OnsetDetector::new(self.config.onset.clone(), *grid).detect_times(&envelope);

        let estimate = TempoEstimator::new(self.config.tempo.clone(), *grid).estimate(&envelope);
        let bpm = estimate.bpm_or(self.config.tempo.fallback_bpm);
        let beats = match estimate {
            TempoEstimate::Estimated(bpm) => {
                BeatTracker::new(self.config.tempo.clone(), *grid).track_times(&envelope, bpm)
            }
            TempoEstimate::NoEstimate => Vec::new(),
        };

        let peaks = PeakSelector::new(&self.config.peaks).select_times(&envelope, grid);

        Rhythm { bpm, beats, onsets, peaks }
    }
}

impl Default for AudioAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}
