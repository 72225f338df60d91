use std::path::Path;
use serde::{Deserialize, Serialize};

use crate::{
    audio::types::FrameGrid,
    error::{ConfigError, Result},
};

/// Main configuration for beatsync
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Framing and spectrum settings shared by every stage
    pub analysis: AnalysisConfig,

    /// Onset peak picking
    pub onset: OnsetConfig,

    /// Tempo estimation and beat tracking
    pub tempo: TempoConfig,

    /// Dramatic moment selection
    pub peaks: PeakConfig,

    /// Output bounds and rounding
    pub output: OutputConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound { path: path.display().to_string() })?;

        let config: Config = toml::from_str(&content)
            .map_err(|_| ConfigError::ParseFailed { path: path.display().to_string() })?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::InvalidValue {
                key: "config".to_string(),
                value: e.to_string()
            })?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.analysis.validate()?;
        self.onset.validate()?;
        self.tempo.validate()?;
        self.peaks.validate()?;
        self.output.validate()?;
        Ok(())
    }
}

fn invalid(key: &str, value: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

/// Framing and spectrum configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Rate the loader resamples to (Hz)
    pub sample_rate: u32,

    /// Samples between consecutive frames
    pub hop_length: usize,

    /// FFT window size
    pub n_fft: usize,

    /// Number of mel bands in the onset spectrogram
    pub n_mels: usize,

    /// Dynamic range kept in the log-mel spectrogram (dB)
    pub top_db: f32,

    /// Run the spectral/energy profiler alongside the onset chain
    pub parallel_stages: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sample_rate: 22050,
            hop_length: 512,
            n_fft: 2048,
            n_mels: 128,
            top_db: 80.0,
            parallel_stages: false,
        }
    }
}

impl AnalysisConfig {
    /// Frame grid for audio at `sample_rate`
    pub fn frame_grid(&self, sample_rate: u32) -> FrameGrid {
        FrameGrid::new(sample_rate, self.hop_length)
    }

    fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(invalid("analysis.sample_rate", self.sample_rate).into());
        }

        if self.n_fft == 0 || !self.n_fft.is_power_of_two() {
            return Err(invalid("analysis.n_fft", self.n_fft).into());
        }

        if self.hop_length == 0 || self.hop_length > self.n_fft {
            return Err(invalid("analysis.hop_length", self.hop_length).into());
        }

        if self.n_mels == 0 {
            return Err(invalid("analysis.n_mels", self.n_mels).into());
        }

        if !(self.top_db > 0.0) {
            return Err(invalid("analysis.top_db", self.top_db).into());
        }

        Ok(())
    }
}

/// Onset peak-picking configuration; windows are in seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OnsetConfig {
    pub pre_max: f64,
    pub post_max: f64,
    pub pre_avg: f64,
    pub post_avg: f64,

    /// Minimum gap after an onset before the next one may fire
    pub wait: f64,

    /// Margin above the local mean a peak must clear (normalized units)
    pub delta: f32,

    /// Move each onset back to the preceding envelope minimum
    pub backtrack: bool,
}

impl Default for OnsetConfig {
    fn default() -> Self {
        Self {
            pre_max: 0.03,
            post_max: 0.0,
            pre_avg: 0.10,
            post_avg: 0.10,
            wait: 0.03,
            delta: 0.07,
            backtrack: true,
        }
    }
}

impl OnsetConfig {
    fn validate(&self) -> Result<()> {
        let windows = [
            ("onset.pre_max", self.pre_max),
            ("onset.post_max", self.post_max),
            ("onset.pre_avg", self.pre_avg),
            ("onset.post_avg", self.post_avg),
            ("onset.wait", self.wait),
        ];
        for (key, value) in windows {
            if !(value >= 0.0) {
                return Err(invalid(key, value).into());
            }
        }

        if !(self.delta >= 0.0) {
            return Err(invalid("onset.delta", self.delta).into());
        }

        Ok(())
    }
}

/// Tempo estimation and beat tracking configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TempoConfig {
    /// Center of the log-normal tempo prior
    pub start_bpm: f64,

    /// Width of the tempo prior in octaves
    pub std_bpm: f64,

    /// Tempi at or above this are never reported
    pub max_tempo: f64,

    /// Autocorrelation window (seconds)
    pub ac_size: f64,

    /// Tempo used when no estimate can be made
    pub fallback_bpm: f64,

    /// How strictly beats follow the estimated period
    pub tightness: f64,

    /// Drop weak beats at the start and end
    pub trim: bool,
}

impl Default for TempoConfig {
    fn default() -> Self {
        Self {
            start_bpm: 120.0,
            std_bpm: 1.0,
            max_tempo: 320.0,
            ac_size: 8.0,
            fallback_bpm: 120.0,
            tightness: 100.0,
            trim: true,
        }
    }
}

impl TempoConfig {
    fn validate(&self) -> Result<()> {
        if !(self.start_bpm > 0.0) {
            return Err(invalid("tempo.start_bpm", self.start_bpm).into());
        }

        if !(self.std_bpm > 0.0) {
            return Err(invalid("tempo.std_bpm", self.std_bpm).into());
        }

        if !(self.max_tempo > 0.0) {
            return Err(invalid("tempo.max_tempo", self.max_tempo).into());
        }

        if !(self.ac_size > 0.0) {
            return Err(invalid("tempo.ac_size", self.ac_size).into());
        }

        if !(self.fallback_bpm > 0.0) {
            return Err(invalid("tempo.fallback_bpm", self.fallback_bpm).into());
        }

        if !(self.tightness > 0.0) {
            return Err(invalid("tempo.tightness", self.tightness).into());
        }

        Ok(())
    }
}

/// Dramatic moment selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeakConfig {
    /// Normalized onset strength a frame must strictly exceed
    pub threshold: f64,

    /// Added to the envelope maximum before normalizing
    pub epsilon: f64,
}

impl Default for PeakConfig {
    fn default() -> Self {
        Self {
            threshold: 0.7,
            epsilon: 1e-6,
        }
    }
}

impl PeakConfig {
    fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.threshold) {
            return Err(invalid("peaks.threshold", self.threshold).into());
        }

        if !(self.epsilon > 0.0) {
            return Err(invalid("peaks.epsilon", self.epsilon).into());
        }

        Ok(())
    }
}

/// Bounds and rounding applied when assembling the result record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub max_onsets: usize,
    pub max_peaks: usize,

    /// Cap for both spectral and energy series
    pub max_series_points: usize,

    /// Decimal places for duration and every timestamp
    pub time_decimals: u32,

    pub bpm_decimals: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            max_onsets: 100,
            max_peaks: 50,
            max_series_points: 60,
            time_decimals: 3,
            bpm_decimals: 1,
        }
    }
}

impl OutputConfig {
    fn validate(&self) -> Result<()> {
        // 10^15 is the last power of ten an f64 scales without losing integers
        if self.time_decimals > 15 {
            return Err(invalid("output.time_decimals", self.time_decimals).into());
        }

        if self.bpm_decimals > 15 {
            return Err(invalid("output.bpm_decimals", self.bpm_decimals).into());
        }

        Ok(())
    }
}
