//! Synthetic test signals.

use std::f32::consts::PI;
use std::path::Path;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::audio::types::Waveform;
use crate::error::{BeatsyncError, Result};

/// Length of one click in samples
const CLICK_LENGTH: usize = 1024;

/// Metronome-style click track: a decaying 1 kHz burst on every beat,
/// the first one at t = 0.
#[derive(Debug, Clone)]
pub struct ClickTrack {
    pub bpm: f64,
    pub seconds: f64,
    pub sample_rate: u32,
    pub amplitude: f32,
    noise: Option<(f32, u64)>,
}

impl ClickTrack {
    pub fn new(bpm: f64, seconds: f64, sample_rate: u32) -> Self {
        Self {
            bpm,
            seconds,
            sample_rate,
            amplitude: 0.8,
            noise: None,
        }
    }

    /// Add uniform white noise of the given peak level, reproducible from `seed`
    pub fn with_noise(mut self, level: f32, seed: u64) -> Self {
        self.noise = Some((level, seed));
        self
    }

    /// Click onset times in seconds
    pub fn beat_times(&self) -> Vec<f64> {
        if !(self.bpm > 0.0) {
            return Vec::new();
        }
        let interval = 60.0 / self.bpm;
        (0..)
            .map(|i| i as f64 * interval)
            .take_while(|&t| t < self.seconds)
            .collect()
    }

    pub fn render(&self) -> Result<Waveform> {
        let sr = self.sample_rate as f32;
        let mut samples = vec![0.0f32; (self.seconds * self.sample_rate as f64) as usize];

        for time in self.beat_times() {
            let start = (time * self.sample_rate as f64).round() as usize;
            for (j, slot) in samples.iter_mut().skip(start).take(CLICK_LENGTH).enumerate() {
                let j = j as f32;
                *slot += self.amplitude * (-j / 200.0).exp() * (2.0 * PI * 1000.0 * j / sr).sin();
            }
        }

        if let Some((level, seed)) = self.noise {
            let mut rng = SmallRng::seed_from_u64(seed);
            for sample in samples.iter_mut() {
                *sample += rng.gen_range(-level..=level);
            }
        }

        Waveform::new(samples, self.sample_rate)
    }
}

/// Write a waveform as 16-bit mono PCM
pub fn write_wav<P: AsRef<Path>>(waveform: &Waveform, path: P) -> Result<()> {
    let path = path.as_ref();
    let failed = |e: hound::Error| {
        BeatsyncError::generic(format!("Failed to write '{}': {}", path.display(), e))
    };

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: waveform.sample_rate(),
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).map_err(failed)?;
    for &sample in waveform.samples() {
        let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        writer.write_sample(value).map_err(failed)?;
    }
    writer.finalize().map_err(failed)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_beat_times() {
        let track = ClickTrack::new(120.0, 2.0, 22050);
        assert_eq!(track.beat_times(), vec![0.0, 0.5, 1.0, 1.5]);
    }

    #[test]
    fn test_render_length_and_clicks() {
        let waveform = ClickTrack::new(120.0, 2.0, 22050).render().unwrap();
        assert_eq!(waveform.len(), 44100);

        // Silence between clicks, energy right after each one
        assert_eq!(waveform.samples()[3000], 0.0);
        assert!(waveform.samples()[11025..11025 + 100].iter().any(|s| s.abs() > 0.1));
    }

    #[test]
    fn test_noise_is_seeded() {
        let a = ClickTrack::new(100.0, 1.0, 8000).with_noise(0.05, 7).render().unwrap();
        let b = ClickTrack::new(100.0, 1.0, 8000).with_noise(0.05, 7).render().unwrap();
        assert_eq!(a, b);
        assert!(a.samples()[3000].abs() <= 0.05 + f32::EPSILON);
        assert_ne!(a.samples()[3000], 0.0);
    }
}
