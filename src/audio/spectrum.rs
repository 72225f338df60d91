//! Short-time Fourier transform and mel-scale helpers.
//!
//! Frames are centered: the signal is zero padded by `n_fft / 2` on both
//! sides, so frame `t` is centered on sample `t * hop_length` and a waveform
//! of `n` samples yields `1 + n / hop_length` frames.

use std::f32::consts::PI;
use std::sync::Arc;

use realfft::{RealFftPlanner, RealToComplex};

use crate::error::{AudioError, Result};

/// Magnitude spectrogram, `frames[t][k]` = |X(t, k)|
#[derive(Debug, Clone)]
pub struct Spectrogram {
    frames: Vec<Vec<f32>>,
    n_fft: usize,
    sample_rate: u32,
}

impl Spectrogram {
    pub fn frames(&self) -> &[Vec<f32>] {
        &self.frames
    }

    pub fn n_frames(&self) -> usize {
        self.frames.len()
    }

    pub fn n_bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    pub fn n_fft(&self) -> usize {
        self.n_fft
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Center frequency of bin `k` in Hz
    pub fn bin_frequency(&self, k: usize) -> f32 {
        k as f32 * self.sample_rate as f32 / self.n_fft as f32
    }
}

/// Reusable STFT plan
pub struct Stft {
    n_fft: usize,
    hop_length: usize,
    window: Vec<f32>,
    fft: Arc<dyn RealToComplex<f32>>,
}

impl Stft {
    pub fn new(n_fft: usize, hop_length: usize) -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(n_fft);

        Self {
            n_fft,
            hop_length,
            window: hann_window(n_fft),
            fft,
        }
    }

    /// Compute the magnitude spectrogram of `samples`
    pub fn magnitudes(&self, samples: &[f32], sample_rate: u32) -> Result<Spectrogram> {
        let n_frames = 1 + samples.len() / self.hop_length;
        let pad = self.n_fft / 2;

        let mut input_buffer = self.fft.make_input_vec();
        let mut spectrum_buffer = self.fft.make_output_vec();
        let mut frames = Vec::with_capacity(n_frames);

        for frame_idx in 0..n_frames {
            // Position of the window's first sample in the unpadded signal
            let origin = (frame_idx * self.hop_length) as isize - pad as isize;

            for (i, slot) in input_buffer.iter_mut().enumerate() {
                let pos = origin + i as isize;
                let sample = if pos >= 0 && (pos as usize) < samples.len() {
                    samples[pos as usize]
                } else {
                    0.0
                };
                *slot = sample * self.window[i];
            }

            self.fft
                .process(&mut input_buffer, &mut spectrum_buffer)
                .map_err(|_| AudioError::AnalysisFailed {
                    reason: "FFT processing failed".to_string(),
                })?;

            frames.push(spectrum_buffer.iter().map(|c| c.norm()).collect());
        }

        tracing::debug!(
            "STFT: {} frames x {} bins (n_fft={}, hop={})",
            frames.len(),
            self.n_fft / 2 + 1,
            self.n_fft,
            self.hop_length
        );

        Ok(Spectrogram {
            frames,
            n_fft: self.n_fft,
            sample_rate,
        })
    }
}

/// Periodic Hann window of length `size`
pub fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / size as f32).cos()))
        .collect()
}

const MEL_F_SP: f64 = 200.0 / 3.0;
const MEL_MIN_LOG_HZ: f64 = 1000.0;
const MEL_MIN_LOG_MEL: f64 = MEL_MIN_LOG_HZ / MEL_F_SP;

fn mel_log_step() -> f64 {
    6.4f64.ln() / 27.0
}

/// Slaney mel scale: linear below 1 kHz, logarithmic above
pub fn hz_to_mel(hz: f64) -> f64 {
    if hz >= MEL_MIN_LOG_HZ {
        MEL_MIN_LOG_MEL + (hz / MEL_MIN_LOG_HZ).ln() / mel_log_step()
    } else {
        hz / MEL_F_SP
    }
}

pub fn mel_to_hz(mel: f64) -> f64 {
    if mel >= MEL_MIN_LOG_MEL {
        MEL_MIN_LOG_HZ * (mel_log_step() * (mel - MEL_MIN_LOG_MEL)).exp()
    } else {
        MEL_F_SP * mel
    }
}

/// One triangular mel band, stored sparsely from its first non-zero bin
#[derive(Debug, Clone)]
struct MelBand {
    start: usize,
    weights: Vec<f32>,
}

/// Area-normalized triangular filterbank mapping FFT bins to mel bands
#[derive(Debug, Clone)]
pub struct MelFilterbank {
    bands: Vec<MelBand>,
}

impl MelFilterbank {
    pub fn new(sample_rate: u32, n_fft: usize, n_mels: usize, fmin: f64, fmax: f64) -> Self {
        let n_bins = n_fft / 2 + 1;
        let bin_hz = |k: usize| k as f64 * sample_rate as f64 / n_fft as f64;

        let mel_min = hz_to_mel(fmin);
        let mel_max = hz_to_mel(fmax);
        let edges: Vec<f64> = (0..n_mels + 2)
            .map(|i| mel_to_hz(mel_min + (mel_max - mel_min) * i as f64 / (n_mels + 1) as f64))
            .collect();

        let bands = (0..n_mels)
            .map(|m| {
                let (lo, center, hi) = (edges[m], edges[m + 1], edges[m + 2]);
                let enorm = 2.0 / (hi - lo);

                let dense: Vec<f64> = (0..n_bins)
                    .map(|k| {
                        let f = bin_hz(k);
                        let lower = (f - lo) / (center - lo);
                        let upper = (hi - f) / (hi - center);
                        lower.min(upper).max(0.0) * enorm
                    })
                    .collect();

                let start = dense.iter().position(|&w| w > 0.0).unwrap_or(n_bins);
                let end = dense.iter().rposition(|&w| w > 0.0).map_or(start, |p| p + 1);
                MelBand {
                    start,
                    weights: dense[start..end].iter().map(|&w| w as f32).collect(),
                }
            })
            .collect();

        Self { bands }
    }

    pub fn n_mels(&self) -> usize {
        self.bands.len()
    }

    /// Project one power spectrum frame onto the mel bands
    pub fn apply(&self, power: &[f32]) -> Vec<f32> {
        self.bands
            .iter()
            .map(|band| {
                power
                    .iter()
                    .skip(band.start)
                    .zip(&band.weights)
                    .map(|(&p, &w)| p * w)
                    .sum()
            })
            .collect()
    }
}

/// Log-mel spectrogram in dB, `frames[t][m]`.
///
/// Uses `10 * log10(max(1e-10, S))` and clips everything more than `top_db`
/// below the loudest cell.
pub fn log_mel_spectrogram(spectrogram: &Spectrogram, n_mels: usize, top_db: f32) -> Vec<Vec<f32>> {
    const AMIN: f32 = 1e-10;

    let filterbank = MelFilterbank::new(
        spectrogram.sample_rate(),
        spectrogram.n_fft(),
        n_mels,
        0.0,
        spectrogram.sample_rate() as f64 / 2.0,
    );

    let mut db: Vec<Vec<f32>> = spectrogram
        .frames()
        .iter()
        .map(|magnitudes| {
            let power: Vec<f32> = magnitudes.iter().map(|m| m * m).collect();
            filterbank
                .apply(&power)
                .into_iter()
                .map(|s| 10.0 * s.max(AMIN).log10())
                .collect()
        })
        .collect();

    let peak = db
        .iter()
        .flat_map(|frame| frame.iter().copied())
        .fold(f32::NEG_INFINITY, f32::max);
    let floor = peak - top_db;
    for value in db.iter_mut().flat_map(|frame| frame.iter_mut()) {
        *value = value.max(floor);
    }

    db
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sine(freq: f32, sample_rate: u32, seconds: f32) -> Vec<f32> {
        (0..(sample_rate as f32 * seconds) as usize)
            .map(|i| (2.0 * PI * freq * i as f32 / sample_rate as f32).sin() * 0.5)
            .collect()
    }

    #[test]
    fn test_frame_count_matches_grid() {
        let stft = Stft::new(2048, 512);
        let samples = vec![0.0; 22050];
        let spec = stft.magnitudes(&samples, 22050).unwrap();
        assert_eq!(spec.n_frames(), 1 + 22050 / 512);
        assert_eq!(spec.n_bins(), 1025);
    }

    #[test]
    fn test_sine_peaks_at_expected_bin() {
        let stft = Stft::new(2048, 512);
        let spec = stft.magnitudes(&sine(1000.0, 22050, 1.0), 22050).unwrap();

        let middle = &spec.frames()[spec.n_frames() / 2];
        let (peak_bin, _) = middle
            .iter()
            .enumerate()
            .fold((0, 0.0f32), |best, (k, &m)| if m > best.1 { (k, m) } else { best });

        let expected = (1000.0 / spec.bin_frequency(1)).round() as usize;
        assert!((peak_bin as isize - expected as isize).abs() <= 1);
    }

    #[test]
    fn test_mel_scale_roundtrip() {
        for hz in [0.0, 440.0, 999.0, 1000.0, 4000.0, 11025.0] {
            assert_relative_eq!(mel_to_hz(hz_to_mel(hz)), hz, epsilon = 1e-6, max_relative = 1e-9);
        }
        assert_relative_eq!(hz_to_mel(1000.0), 15.0, epsilon = 1e-12);
    }

    #[test]
    fn test_filterbank_covers_spectrum() {
        let bank = MelFilterbank::new(22050, 2048, 128, 0.0, 11025.0);
        assert_eq!(bank.n_mels(), 128);

        let flat = vec![1.0f32; 1025];
        let mel = bank.apply(&flat);
        assert!(mel.iter().all(|&v| v >= 0.0));
        assert!(mel.iter().filter(|&&v| v > 0.0).count() > 100);
    }

    #[test]
    fn test_log_mel_floor() {
        let stft = Stft::new(2048, 512);
        let spec = stft.magnitudes(&sine(440.0, 22050, 0.5), 22050).unwrap();
        let db = log_mel_spectrogram(&spec, 64, 80.0);

        let peak = db.iter().flatten().copied().fold(f32::NEG_INFINITY, f32::max);
        let low = db.iter().flatten().copied().fold(f32::INFINITY, f32::min);
        assert!(peak - low <= 80.0 + 1e-3);
    }
}
