//! Result record and the assembler that bounds and rounds it.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::audio::types::FeatureSeries;
use crate::config::OutputConfig;
use crate::error::{BeatsyncError, Result};

/// Unbounded, unrounded pipeline output
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawFeatures {
    pub duration: f64,
    pub bpm: f64,
    pub beats: Vec<f64>,
    pub onsets: Vec<f64>,
    pub peaks: Vec<f64>,
    pub spectral: FeatureSeries,
    pub energy: FeatureSeries,
}

/// Bounded feature set handed to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Seconds
    pub duration: f64,
    pub bpm: f64,
    pub beats: Vec<f64>,
    pub onsets: Vec<f64>,
    pub peaks: Vec<f64>,
    pub spectral: FeatureSeries,
    pub energy: FeatureSeries,
}

/// Terminal record of one analysis: either the full result or an error message
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisReport {
    Success(AnalysisResult),
    Failure { error: String },
}

impl AnalysisReport {
    pub fn failure<S: Into<String>>(error: S) -> Self {
        Self::Failure { error: error.into() }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn result(&self) -> Option<&AnalysisResult> {
        match self {
            Self::Success(result) => Some(result),
            Self::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Success(_) => None,
            Self::Failure { error } => Some(error),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| BeatsyncError::generic(e.to_string()))
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| BeatsyncError::generic(e.to_string()))
    }

    /// Parse a record produced by [`AnalysisReport::to_json`].
    ///
    /// Anything that is not a well-formed success record becomes a failure,
    /// carrying its `error` field when present.
    pub fn from_json(text: &str) -> Self {
        let value: serde_json::Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(_) => return Self::failure("Failed to parse analysis output"),
        };

        if value.get("success").and_then(|s| s.as_bool()) == Some(true) {
            return match serde_json::from_value::<AnalysisResult>(value) {
                Ok(result) => Self::Success(result),
                Err(e) => Self::failure(format!("Malformed analysis output: {}", e)),
            };
        }

        let error = value
            .get("error")
            .and_then(|e| e.as_str())
            .unwrap_or("Analysis failed without an error message");
        Self::failure(error)
    }
}

impl From<BeatsyncError> for AnalysisReport {
    fn from(err: BeatsyncError) -> Self {
        Self::failure(err.user_message())
    }
}

impl Serialize for AnalysisReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Success(result) => {
                let mut map = serializer.serialize_map(Some(8))?;
                map.serialize_entry("success", &true)?;
                map.serialize_entry("duration", &result.duration)?;
                map.serialize_entry("bpm", &result.bpm)?;
                map.serialize_entry("beats", &result.beats)?;
                map.serialize_entry("onsets", &result.onsets)?;
                map.serialize_entry("peaks", &result.peaks)?;
                map.serialize_entry("spectral", &result.spectral)?;
                map.serialize_entry("energy", &result.energy)?;
                map.end()
            }
            Self::Failure { error } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("success", &false)?;
                map.serialize_entry("error", error)?;
                map.end()
            }
        }
    }
}

/// Round half away from zero to `decimals` places
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let scale = 10f64.powi(decimals as i32);
    (value * scale).round() / scale
}

/// Applies output limits and rounding to raw pipeline output
pub struct ResultAssembler {
    limits: OutputConfig,
}

impl ResultAssembler {
    pub fn new(limits: OutputConfig) -> Self {
        Self { limits }
    }

    pub fn assemble(&self, raw: RawFeatures) -> AnalysisResult {
        let time = |t: f64| round_to(t, self.limits.time_decimals);
        let times = |values: &[f64], limit: usize| -> Vec<f64> {
            values.iter().take(limit).map(|&t| time(t)).collect()
        };
        let series = |s: &FeatureSeries| {
            let bounded = s.truncated(self.limits.max_series_points);
            FeatureSeries {
                times: bounded.times.iter().map(|&t| time(t)).collect(),
                values: bounded.values,
            }
        };

        AnalysisResult {
            duration: time(raw.duration),
            bpm: round_to(raw.bpm, self.limits.bpm_decimals),
            beats: times(&raw.beats, usize::MAX),
            onsets: times(&raw.onsets, self.limits.max_onsets),
            peaks: times(&raw.peaks, self.limits.max_peaks),
            spectral: series(&raw.spectral),
            energy: series(&raw.energy),
        }
    }
}
