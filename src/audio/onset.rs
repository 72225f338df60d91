//! Onset strength envelope and onset picking.
//!
//! The envelope is log-mel spectral flux: for each frame, the mean over mel
//! bands of the positive dB increase since the previous frame. Onsets are
//! peaks of the normalized envelope, optionally moved back to the envelope
//! minimum that precedes them so the timestamp marks where the transient
//! starts to rise.

use crate::audio::spectrum::{log_mel_spectrogram, Spectrogram};
use crate::audio::types::{FrameGrid, OnsetEnvelope};
use crate::config::{AnalysisConfig, OnsetConfig};

/// Compute the onset strength envelope on the spectrogram's frame grid
pub fn onset_strength(spectrogram: &Spectrogram, config: &AnalysisConfig) -> OnsetEnvelope {
    let n_frames = spectrogram.n_frames();
    let log_mel = log_mel_spectrogram(spectrogram, config.n_mels, config.top_db);

    let flux: Vec<f32> = log_mel
        .windows(2)
        .map(|pair| {
            let rise: f32 = pair[1]
                .iter()
                .zip(&pair[0])
                .map(|(&cur, &prev)| (cur - prev).max(0.0))
                .sum();
            rise / pair[1].len().max(1) as f32
        })
        .collect();

    // Centered windows see a transient n_fft / 2 samples early; shift the
    // flux so it lands on the transient's own frame.
    let delay = 1 + config.n_fft / (2 * config.hop_length);
    let mut values = vec![0.0f32; delay.min(n_frames)];
    values.extend(flux);
    values.truncate(n_frames);

    OnsetEnvelope::new(values)
}

/// Picks discrete onset frames from an onset envelope
pub struct OnsetDetector {
    config: OnsetConfig,
    grid: FrameGrid,
}

impl OnsetDetector {
    pub fn new(config: OnsetConfig, grid: FrameGrid) -> Self {
        Self { config, grid }
    }

    /// Onset frames in chronological order
    pub fn detect(&self, envelope: &OnsetEnvelope) -> Vec<usize> {
        if envelope.is_silent() {
            return Vec::new();
        }

        let normalized = normalize_min_max(envelope.values());
        let frames = |seconds: f64| self.grid.seconds_to_frames(seconds);

        let peaks = peak_pick(
            &normalized,
            PeakWindows {
                pre_max: frames(self.config.pre_max),
                post_max: frames(self.config.post_max) + 1,
                pre_avg: frames(self.config.pre_avg),
                post_avg: frames(self.config.post_avg) + 1,
                wait: frames(self.config.wait),
            },
            self.config.delta,
        );

        let onsets = if self.config.backtrack {
            backtrack(&peaks, &normalized)
        } else {
            peaks
        };

        tracing::debug!("Detected {} onsets", onsets.len());
        onsets
    }

    /// Onset timestamps in seconds
    pub fn detect_times(&self, envelope: &OnsetEnvelope) -> Vec<f64> {
        self.grid.frames_to_times(&self.detect(envelope))
    }
}

fn normalize_min_max(values: &[f32]) -> Vec<f32> {
    let min = values.iter().copied().fold(f32::INFINITY, f32::min);
    let shifted: Vec<f32> = values.iter().map(|&v| v - min).collect();
    let max = shifted.iter().copied().fold(0.0f32, f32::max);
    shifted.iter().map(|&v| v / (max + f32::MIN_POSITIVE)).collect()
}

/// Window sizes for [`peak_pick`], in frames
#[derive(Debug, Clone, Copy)]
pub struct PeakWindows {
    pub pre_max: usize,
    pub post_max: usize,
    pub pre_avg: usize,
    pub post_avg: usize,
    pub wait: usize,
}

/// Frames `i` where `x[i]` is the maximum of `x[i - pre_max .. i + post_max]`,
/// at least `delta` above the mean of `x[i - pre_avg .. i + post_avg]`, and more
/// than `wait` frames after the previous pick.
pub fn peak_pick(x: &[f32], windows: PeakWindows, delta: f32) -> Vec<usize> {
    let n = x.len();
    let mut peaks = Vec::new();
    let mut last: Option<usize> = None;

    for i in 0..n {
        let max_window = around(x, i, windows.pre_max, windows.post_max);
        let local_max = max_window.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        if x[i] != local_max {
            continue;
        }

        let avg_window = around(x, i, windows.pre_avg, windows.post_avg);
        let local_mean = avg_window.iter().sum::<f32>() / avg_window.len() as f32;
        if x[i] < local_mean + delta {
            continue;
        }

        if last.is_some_and(|prev| i <= prev + windows.wait) {
            continue;
        }

        peaks.push(i);
        last = Some(i);
    }

    peaks
}

/// `x[i - pre .. i + post]`, clipped to the slice and never empty
fn around(x: &[f32], i: usize, pre: usize, post: usize) -> &[f32] {
    &x[i.saturating_sub(pre)..(i + post).min(x.len()).max(i + 1)]
}

/// Move each event back to the latest local minimum of `energy` at or before it.
///
/// A frame is a minimum when it is no larger than its left neighbor and
/// strictly smaller than its right neighbor; frame 0 always counts.
pub fn backtrack(events: &[usize], energy: &[f32]) -> Vec<usize> {
    let mut minima = vec![0usize];
    minima.extend(
        (1..energy.len().saturating_sub(1))
            .filter(|&i| energy[i] <= energy[i - 1] && energy[i] < energy[i + 1]),
    );

    events
        .iter()
        .map(|&event| {
            let idx = minima.partition_point(|&m| m <= event);
            minima[idx.saturating_sub(1)]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::spectrum::Stft;

    fn windows() -> PeakWindows {
        PeakWindows { pre_max: 1, post_max: 1, pre_avg: 4, post_avg: 5, wait: 1 }
    }

    fn bursts(sample_rate: u32, seconds: f32, every: f32) -> Vec<f32> {
        let mut signal = vec![0.0f32; (sample_rate as f32 * seconds) as usize];
        let step = (sample_rate as f32 * every) as usize;
        for start in (step / 2..signal.len()).step_by(step) {
            for j in 0..800 {
                if start + j < signal.len() {
                    let t = j as f32 / sample_rate as f32;
                    signal[start + j] += 0.7
                        * (-(j as f32) / 150.0).exp()
                        * (2.0 * std::f32::consts::PI * 1500.0 * t).sin();
                }
            }
        }
        signal
    }

    #[test]
    fn test_peak_pick_isolated_spikes() {
        let mut x = vec![0.0f32; 40];
        x[10] = 1.0;
        x[25] = 0.8;
        assert_eq!(peak_pick(&x, windows(), 0.07), vec![10, 25]);
    }

    #[test]
    fn test_peak_pick_respects_wait() {
        let mut x = vec![0.0f32; 20];
        x[5] = 1.0;
        x[6] = 1.0;
        let peaks = peak_pick(&x, windows(), 0.07);
        assert_eq!(peaks, vec![5]);
    }

    #[test]
    fn test_peak_pick_requires_delta() {
        let x = vec![0.5f32; 20];
        assert!(peak_pick(&x, windows(), 0.07).is_empty());
    }

    #[test]
    fn test_backtrack_to_rise_start() {
        //                       0    1    2    3    4    5    6    7    8
        let energy = vec![0.2, 0.1, 0.0, 0.0, 0.3, 0.9, 0.4, 0.2, 0.5];
        assert_eq!(backtrack(&[5], &energy), vec![3]);
        assert_eq!(backtrack(&[8], &energy), vec![7]);
        assert_eq!(backtrack(&[0], &energy), vec![0]);
    }

    #[test]
    fn test_silent_envelope_has_no_onsets() {
        let detector = OnsetDetector::new(OnsetConfig::default(), FrameGrid::new(22050, 512));
        assert!(detector.detect(&OnsetEnvelope::new(vec![0.0; 100])).is_empty());
    }

    #[test]
    fn test_envelope_length_and_sign() {
        let config = AnalysisConfig::default();
        let samples = bursts(22050, 3.0, 0.5);
        let spec = Stft::new(config.n_fft, config.hop_length)
            .magnitudes(&samples, 22050)
            .unwrap();
        let env = onset_strength(&spec, &config);

        assert_eq!(env.len(), 1 + samples.len() / config.hop_length);
        assert!(env.values().iter().all(|&v| v >= 0.0));
        assert!(env.max() > 0.0);
    }

    #[test]
    fn test_onsets_found_near_bursts() {
        let config = AnalysisConfig::default();
        let grid = config.frame_grid(22050);
        let samples = bursts(22050, 4.0, 0.5);
        let spec = Stft::new(config.n_fft, config.hop_length)
            .magnitudes(&samples, 22050)
            .unwrap();
        let env = onset_strength(&spec, &config);

        let detector = OnsetDetector::new(OnsetConfig::default(), grid);
        let times = detector.detect_times(&env);

        // Bursts start at 0.25 s and then every 0.5 s
        assert!(times.len() >= 6, "expected onsets, got {:?}", times);
        assert!(times.windows(2).all(|w| w[0] <= w[1]));
        for burst in [0.75, 1.25, 1.75, 2.25] {
            assert!(
                times.iter().any(|&t| (t - burst).abs() < 0.08),
                "no onset near {} in {:?}",
                burst,
                times
            );
        }
    }
}
