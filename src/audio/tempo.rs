//! Tempo estimation and dynamic-programming beat tracking.
//!
//! Tempo comes from an autocorrelation tempogram of the onset envelope,
//! weighted by a log-normal prior around a preferred tempo. Beats are the
//! highest-scoring frame sequence that both lands on strong onsets and keeps
//! gaps close to the estimated beat period.

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

use crate::audio::types::{FrameGrid, OnsetEnvelope};
use crate::config::TempoConfig;

/// Outcome of tempo estimation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TempoEstimate {
    /// A validated, strictly positive tempo in BPM
    Estimated(f64),

    /// The envelope carried no periodicity to measure (silence, too short)
    NoEstimate,
}

impl TempoEstimate {
    pub fn bpm(&self) -> Option<f64> {
        match self {
            Self::Estimated(bpm) => Some(*bpm),
            Self::NoEstimate => None,
        }
    }

    pub fn bpm_or(&self, fallback: f64) -> f64 {
        self.bpm().unwrap_or(fallback)
    }
}

/// A tempo hypothesis with its prior-weighted tempogram score
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempoCandidate {
    pub bpm: f64,
    pub score: f64,
}

/// Global tempo estimator
pub struct TempoEstimator {
    config: TempoConfig,
    grid: FrameGrid,
}

impl TempoEstimator {
    pub fn new(config: TempoConfig, grid: FrameGrid) -> Self {
        Self { config, grid }
    }

    /// Autocorrelation window length in frames
    pub fn window_length(&self) -> usize {
        self.grid.seconds_to_frames(self.config.ac_size).max(2)
    }

    /// Time-averaged autocorrelation tempogram, indexed by lag in frames.
    ///
    /// Each frame's window is Hann weighted, autocorrelated and scaled so its
    /// largest lag is 1; silent windows contribute zeros.
    pub fn mean_tempogram(&self, envelope: &OnsetEnvelope) -> Vec<f64> {
        let win = self.window_length();
        let half = win / 2;
        let values = envelope.values();
        let n = values.len();
        if n == 0 {
            return vec![0.0; win];
        }

        let padded = ramp_pad(values, half);
        let taper: Vec<f64> = (0..win)
            .map(|i| 0.5 - 0.5 * (2.0 * std::f64::consts::PI * i as f64 / win as f64).cos())
            .collect();

        let fft_size = (2 * win).next_power_of_two();
        let mut planner = FftPlanner::<f64>::new();
        let forward = planner.plan_fft_forward(fft_size);
        let inverse = planner.plan_fft_inverse(fft_size);
        let mut buffer = vec![Complex::new(0.0, 0.0); fft_size];

        let mut mean = vec![0.0f64; win];
        for t in 0..n {
            let frame = &padded[t..t + win];
            if frame.iter().all(|&v| v == 0.0) {
                continue;
            }

            for (i, slot) in buffer.iter_mut().enumerate() {
                let value = if i < win { frame[i] as f64 * taper[i] } else { 0.0 };
                *slot = Complex::new(value, 0.0);
            }
            forward.process(&mut buffer);
            for c in buffer.iter_mut() {
                *c = Complex::new(c.norm_sqr(), 0.0);
            }
            inverse.process(&mut buffer);

            let peak = buffer[..win].iter().map(|c| c.re.abs()).fold(0.0f64, f64::max);
            if peak <= f64::EPSILON {
                continue;
            }
            for (lag, acc) in mean.iter_mut().enumerate() {
                *acc += buffer[lag].re / peak;
            }
        }

        mean.iter_mut().for_each(|v| *v /= n as f64);
        mean
    }

    /// Tempo candidates ranked by score, best first.
    ///
    /// Empty when the envelope has no periodic energy in the allowed range.
    pub fn candidates(&self, envelope: &OnsetEnvelope) -> Vec<TempoCandidate> {
        if envelope.len() < 2 || envelope.is_silent() {
            return Vec::new();
        }

        let tempogram = self.mean_tempogram(envelope);
        let frame_rate = self.grid.frame_rate();
        let lag_to_bpm = |lag: f64| 60.0 * frame_rate / lag;

        let scores: Vec<Option<f64>> = tempogram
            .iter()
            .enumerate()
            .map(|(lag, &energy)| {
                if lag == 0 || energy <= 1e-9 {
                    return None;
                }
                let bpm = lag_to_bpm(lag as f64);
                if bpm >= self.config.max_tempo {
                    return None;
                }
                Some((1.0 + 1e6 * energy).ln() + self.log_prior(bpm))
            })
            .collect();

        let at = |lag: isize| -> Option<f64> {
            if lag < 0 {
                None
            } else {
                scores.get(lag as usize).copied().flatten()
            }
        };

        let mut candidates: Vec<TempoCandidate> = (1..scores.len())
            .filter_map(|lag| {
                let here = scores[lag]?;
                let left = at(lag as isize - 1);
                let right = at(lag as isize + 1);
                let is_peak = left.map_or(true, |l| here > l) && right.map_or(true, |r| here >= r);
                if !is_peak {
                    return None;
                }

                // Parabolic refinement needs both neighbors
                let offset = match (left, right) {
                    (Some(l), Some(r)) => {
                        let curvature = l - 2.0 * here + r;
                        if curvature < 0.0 {
                            (0.5 * (l - r) / curvature).clamp(-0.5, 0.5)
                        } else {
                            0.0
                        }
                    }
                    _ => 0.0,
                };

                Some(TempoCandidate {
                    bpm: lag_to_bpm(lag as f64 + offset),
                    score: here,
                })
            })
            .collect();

        candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
        candidates
    }

    /// Single dominant tempo: the first candidate, if any
    pub fn estimate(&self, envelope: &OnsetEnvelope) -> TempoEstimate {
        match self.candidates(envelope).first() {
            Some(best) if best.bpm.is_finite() && best.bpm > 0.0 => {
                tracing::debug!("Tempo estimate: {:.2} BPM (score {:.3})", best.bpm, best.score);
                TempoEstimate::Estimated(best.bpm)
            }
            _ => {
                tracing::debug!("No tempo estimate available");
                TempoEstimate::NoEstimate
            }
        }
    }

    fn log_prior(&self, bpm: f64) -> f64 {
        let octaves = (bpm.log2() - self.config.start_bpm.log2()) / self.config.std_bpm;
        -0.5 * octaves * octaves
    }
}

/// Pad with `width` values on each side, ramping linearly from 0 to the edge value
fn ramp_pad(values: &[f32], width: usize) -> Vec<f32> {
    let first = values[0];
    let last = values[values.len() - 1];
    let mut padded = Vec::with_capacity(values.len() + 2 * width);
    padded.extend((0..width).map(|i| first * i as f32 / width as f32));
    padded.extend_from_slice(values);
    padded.extend((0..width).map(|i| last * (width - i) as f32 / width as f32));
    padded
}

/// Dynamic-programming beat tracker
pub struct BeatTracker {
    config: TempoConfig,
    grid: FrameGrid,
}

impl BeatTracker {
    pub fn new(config: TempoConfig, grid: FrameGrid) -> Self {
        Self { config, grid }
    }

    /// Beat frames for a tempo of `bpm`, in chronological order
    pub fn track(&self, envelope: &OnsetEnvelope, bpm: f64) -> Vec<usize> {
        if envelope.len() < 3 || envelope.is_silent() || !(bpm > 0.0) {
            return Vec::new();
        }

        let period = 60.0 * self.grid.frame_rate() / bpm;
        let local = local_score(&normalize_by_std(envelope.values()), period);
        let (cumulative, backlinks) = self.dynamic_program(&local, period);

        let Some(last) = last_beat(&cumulative) else {
            return Vec::new();
        };

        let mut beats = vec![last];
        while let Some(prev) = backlinks[*beats.last().unwrap_or(&last)] {
            beats.push(prev);
        }
        beats.reverse();

        let beats = trim_beats(&local, &beats, self.config.trim);
        tracing::debug!("Tracked {} beats at {:.1} BPM", beats.len(), bpm);
        beats
    }

    /// Beat timestamps in seconds
    pub fn track_times(&self, envelope: &OnsetEnvelope, bpm: f64) -> Vec<f64> {
        self.grid.frames_to_times(&self.track(envelope, bpm))
    }

    fn dynamic_program(&self, local: &[f64], period: f64) -> (Vec<f64>, Vec<Option<usize>>) {
        let n = local.len();
        let mut cumulative = vec![0.0f64; n];
        let mut backlinks: Vec<Option<usize>> = vec![None; n];

        let nearest = (period / 2.0).round() as isize;
        let farthest = (2.0 * period).round() as isize;
        let log_period = period.ln();
        let threshold = 0.01 * local.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mut first_beat = true;

        for i in 0..n {
            let mut best: Option<(usize, f64)> = None;
            let mut gap = nearest.max(1);
            while gap <= farthest && i as isize - gap >= 0 {
                let loc = (i as isize - gap) as usize;
                let penalty = (gap as f64).ln() - log_period;
                let score = cumulative[loc] - self.config.tightness * penalty * penalty;
                if best.map_or(true, |(_, s)| score > s) {
                    best = Some((loc, score));
                }
                gap += 1;
            }

            cumulative[i] = local[i] + best.map_or(0.0, |(_, s)| s);

            // Until the first real onset, frames start fresh chains
            if first_beat && local[i] < threshold {
                backlinks[i] = None;
            } else {
                backlinks[i] = best.map(|(loc, _)| loc);
                first_beat = false;
            }
        }

        (cumulative, backlinks)
    }
}

fn normalize_by_std(values: &[f32]) -> Vec<f64> {
    let n = values.len() as f64;
    let mean = values.iter().map(|&v| v as f64).sum::<f64>() / n;
    let squares: f64 = values.iter().map(|&v| (v as f64 - mean).powi(2)).sum();
    let variance = squares / (n - 1.0).max(1.0);
    let std = variance.sqrt();
    values
        .iter()
        .map(|&v| if std > 0.0 { v as f64 / std } else { v as f64 })
        .collect()
}

/// Envelope smoothed with a Gaussian whose width is `period / 32`
fn local_score(onsets: &[f64], period: f64) -> Vec<f64> {
    let radius = period.round().max(1.0) as isize;
    let kernel: Vec<f64> = (-radius..=radius)
        .map(|k| (-0.5 * (k as f64 * 32.0 / period).powi(2)).exp())
        .collect();

    let n = onsets.len() as isize;
    (0..n)
        .map(|t| {
            kernel
                .iter()
                .enumerate()
                .filter_map(|(k, &w)| {
                    let j = t + k as isize - radius;
                    (0..n).contains(&j).then(|| onsets[j as usize] * w)
                })
                .sum()
        })
        .collect()
}

/// Final beat: the last local maximum of the cumulative score that reaches
/// half the median of all local maxima
fn last_beat(cumulative: &[f64]) -> Option<usize> {
    let n = cumulative.len();
    let is_local_max = |i: usize| {
        i > 0
            && cumulative[i] > cumulative[i - 1]
            && (i + 1 == n || cumulative[i] >= cumulative[i + 1])
    };

    let maxima: Vec<usize> = (0..n).filter(|&i| is_local_max(i)).collect();
    if maxima.is_empty() {
        return None;
    }

    let mut values: Vec<f64> = maxima.iter().map(|&i| cumulative[i]).collect();
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    let median = if values.len() % 2 == 1 {
        values[mid]
    } else {
        0.5 * (values[mid - 1] + values[mid])
    };

    maxima.into_iter().rev().find(|&i| cumulative[i] >= 0.5 * median)
}

/// Drop weak beats at either end of the sequence
fn trim_beats(local: &[f64], beats: &[usize], trim: bool) -> Vec<usize> {
    if beats.is_empty() {
        return Vec::new();
    }

    const HANN5: [f64; 5] = [0.0, 0.5, 1.0, 0.5, 0.0];
    let strengths: Vec<f64> = beats.iter().map(|&b| local[b]).collect();
    let smoothed: Vec<f64> = (0..strengths.len() as isize)
        .map(|i| {
            HANN5
                .iter()
                .enumerate()
                .filter_map(|(k, &w)| strengths.get((i + k as isize - 2) as usize).map(|&s| s * w))
                .sum()
        })
        .collect();

    let threshold = if trim {
        0.5 * (smoothed.iter().map(|s| s * s).sum::<f64>() / smoothed.len() as f64).sqrt()
    } else {
        0.0
    };

    let Some(start) = smoothed.iter().position(|&s| s > threshold) else {
        return Vec::new();
    };
    let end = smoothed.iter().rposition(|&s| s > threshold).unwrap_or(start);
    beats[start..=end].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> FrameGrid {
        FrameGrid::new(22050, 512)
    }

    /// Envelope with a short bump every `period` frames
    fn pulse_envelope(period: f64, frames: usize) -> OnsetEnvelope {
        let mut values = vec![0.0f32; frames];
        let mut pos = period;
        while (pos as usize) + 2 < frames {
            let p = pos.round() as usize;
            values[p] = 1.0;
            values[p + 1] = 0.6;
            values[p + 2] = 0.1;
            pos += period;
        }
        OnsetEnvelope::new(values)
    }

    fn frames_per_beat(bpm: f64) -> f64 {
        60.0 * grid().frame_rate() / bpm
    }

    #[test]
    fn test_estimate_120_bpm() {
        let estimator = TempoEstimator::new(TempoConfig::default(), grid());
        let env = pulse_envelope(frames_per_beat(120.0), 860);

        let bpm = estimator.estimate(&env).bpm().expect("tempo should be found");
        assert!((bpm - 120.0).abs() < 3.0, "estimated {}", bpm);
    }

    #[test]
    fn test_candidates_ranked() {
        let estimator = TempoEstimator::new(TempoConfig::default(), grid());
        let env = pulse_envelope(frames_per_beat(100.0), 860);

        let candidates = estimator.candidates(&env);
        assert!(candidates.len() > 1);
        assert!(candidates.windows(2).all(|w| w[0].score >= w[1].score));
        assert!(candidates.iter().all(|c| c.bpm > 0.0 && c.bpm < 320.0));
    }

    #[test]
    fn test_silence_gives_no_estimate() {
        let estimator = TempoEstimator::new(TempoConfig::default(), grid());
        let env = OnsetEnvelope::new(vec![0.0; 500]);

        assert!(estimator.candidates(&env).is_empty());
        assert_eq!(estimator.estimate(&env), TempoEstimate::NoEstimate);
        assert_eq!(estimator.estimate(&env).bpm_or(120.0), 120.0);
    }

    #[test]
    fn test_tempogram_normalized() {
        let estimator = TempoEstimator::new(TempoConfig::default(), grid());
        let tempogram = estimator.mean_tempogram(&pulse_envelope(20.0, 400));

        assert_eq!(tempogram.len(), estimator.window_length());
        assert!(tempogram.iter().all(|&v| v <= 1.0 + 1e-9));
        assert!(tempogram[0] > tempogram[10]);
    }

    #[test]
    fn test_beats_follow_period() {
        let tracker = BeatTracker::new(TempoConfig::default(), grid());
        let period = frames_per_beat(120.0);
        let env = pulse_envelope(period, 430);

        let times = tracker.track_times(&env, 120.0);
        assert!(times.len() >= 15, "only {} beats", times.len());
        for pair in times.windows(2) {
            let interval = pair[1] - pair[0];
            assert!((interval - 0.5).abs() < 0.05, "interval {}", interval);
        }
    }

    #[test]
    fn test_silence_has_no_beats() {
        let tracker = BeatTracker::new(TempoConfig::default(), grid());
        assert!(tracker.track(&OnsetEnvelope::new(vec![0.0; 300]), 120.0).is_empty());
    }

    #[test]
    fn test_last_beat_and_trim_helpers() {
        let cumulative = vec![0.0, 1.0, 0.5, 2.0, 1.0, 3.0, 2.5];
        assert_eq!(last_beat(&cumulative), Some(5));

        let local = vec![0.0, 5.0, 5.0, 5.0, 5.0, 5.0, 0.0];
        let beats = vec![0, 1, 2, 3, 4, 5, 6];
        let trimmed = trim_beats(&local, &beats, true);
        assert_eq!(trimmed.first(), Some(&1));
        assert_eq!(trimmed.last(), Some(&5));
    }
}
