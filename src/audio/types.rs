use serde::{Deserialize, Serialize};

use crate::error::{AudioError, Result};

/// Decoded audio exactly as it came out of the container
#[derive(Debug, Clone)]
pub struct AudioData {
    /// Audio samples (interleaved for stereo, mono for single channel)
    pub samples: Vec<f32>,

    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Number of channels (1 = mono, 2 = stereo)
    pub channels: u16,

    /// Duration in seconds
    pub duration: f64,

    /// Audio format information
    pub format: AudioFormat,
}

impl AudioData {
    /// Get mono mix of all channels
    pub fn mono_samples(&self) -> Vec<f32> {
        if self.channels <= 1 {
            return self.samples.clone();
        }

        self.samples
            .chunks(self.channels as usize)
            .map(|frame| frame.iter().sum::<f32>() / self.channels as f32)
            .collect()
    }
}

/// Audio file format information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioFormat {
    /// File extension (wav, mp3, flac, etc.)
    pub extension: String,

    /// Codec name as reported by the decoder
    pub codec: String,
}

/// Mono waveform at a known sample rate, the sole input of the pipeline.
///
/// Construction rejects empty sample buffers and a zero sample rate, so every
/// stage downstream can rely on both being present.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl Waveform {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(AudioError::InvalidSampleRate { sample_rate }.into());
        }
        if samples.is_empty() {
            return Err(AudioError::Empty { path: "<memory>".to_string() }.into());
        }
        Ok(Self { samples, sample_rate })
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the waveform holds no samples
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Mapping between analysis frame indices and timestamps.
///
/// Every frame-indexed series (onset envelope, spectral centroid, RMS) lives on
/// the same grid: `time(frame) = frame * hop_length / sample_rate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameGrid {
    pub sample_rate: u32,
    pub hop_length: usize,
}

impl FrameGrid {
    pub fn new(sample_rate: u32, hop_length: usize) -> Self {
        Self { sample_rate, hop_length }
    }

    /// Exact frame rate in frames per second
    pub fn frame_rate(&self) -> f64 {
        self.sample_rate as f64 / self.hop_length as f64
    }

    /// Whole frames per second, `floor(sample_rate / hop_length)`.
    ///
    /// Used as the stride when downsampling frame series to roughly one point
    /// per second. Never zero.
    pub fn frames_per_second(&self) -> usize {
        (self.sample_rate as usize / self.hop_length.max(1)).max(1)
    }

    pub fn frame_to_time(&self, frame: usize) -> f64 {
        (frame * self.hop_length) as f64 / self.sample_rate as f64
    }

    pub fn frames_to_times(&self, frames: &[usize]) -> Vec<f64> {
        frames.iter().map(|&f| self.frame_to_time(f)).collect()
    }

    /// Number of centered frames covering `n_samples`
    pub fn frame_count(&self, n_samples: usize) -> usize {
        1 + n_samples / self.hop_length
    }

    /// Convert a duration to a whole number of frames (rounded down)
    pub fn seconds_to_frames(&self, seconds: f64) -> usize {
        (seconds * self.frame_rate()).floor().max(0.0) as usize
    }
}

/// Frame-wise onset strength, one non-negative value per frame
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OnsetEnvelope {
    values: Vec<f32>,
}

impl OnsetEnvelope {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn max(&self) -> f32 {
        self.values.iter().copied().fold(0.0f32, f32::max)
    }

    /// True when no frame carries any onset energy
    pub fn is_silent(&self) -> bool {
        self.values.iter().all(|&v| v <= 0.0)
    }
}

/// Downsampled time series: `times[i]` is the timestamp of `values[i]`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureSeries {
    pub times: Vec<f64>,
    pub values: Vec<f32>,
}

impl FeatureSeries {
    /// Take every `stride`-th frame of `values`, starting at frame 0
    pub fn from_frames(values: &[f32], grid: &FrameGrid, stride: usize) -> Self {
        let (times, values) = values
            .iter()
            .enumerate()
            .step_by(stride.max(1))
            .map(|(frame, &value)| (grid.frame_to_time(frame), value))
            .unzip();
        Self { times, values }
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Keep at most the first `limit` points
    pub fn truncated(&self, limit: usize) -> Self {
        Self {
            times: self.times.iter().copied().take(limit).collect(),
            values: self.values.iter().copied().take(limit).collect(),
        }
    }
}
