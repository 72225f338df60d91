//! Spectral brightness and loudness curves.

use crate::audio::spectrum::Spectrogram;
use crate::audio::types::{FeatureSeries, FrameGrid};

/// Downsampled spectral centroid and RMS energy
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpectralProfile {
    /// Spectral centroid in Hz
    pub spectral: FeatureSeries,

    /// RMS amplitude
    pub energy: FeatureSeries,
}

/// Compute both curves and keep roughly one point per second of audio
pub fn profile(samples: &[f32], spectrogram: &Spectrogram, grid: &FrameGrid) -> SpectralProfile {
    let centroid = spectral_centroid(spectrogram);
    let energy = rms(samples, spectrogram.n_fft(), grid.hop_length);
    let stride = grid.frames_per_second();

    tracing::debug!(
        "Profiling {} centroid / {} RMS frames with stride {}",
        centroid.len(),
        energy.len(),
        stride
    );

    SpectralProfile {
        spectral: FeatureSeries::from_frames(&centroid, grid, stride),
        energy: FeatureSeries::from_frames(&energy, grid, stride),
    }
}

/// Magnitude-weighted mean frequency of each frame; 0 Hz for silent frames
pub fn spectral_centroid(spectrogram: &Spectrogram) -> Vec<f32> {
    spectrogram
        .frames()
        .iter()
        .map(|magnitudes| {
            let total: f64 = magnitudes.iter().map(|&m| m as f64).sum();
            if total <= f64::MIN_POSITIVE {
                return 0.0;
            }
            let weighted: f64 = magnitudes
                .iter()
                .enumerate()
                .map(|(k, &m)| spectrogram.bin_frequency(k) as f64 * m as f64)
                .sum();
            (weighted / total) as f32
        })
        .collect()
}

/// Root-mean-square amplitude over centered, zero padded frames
pub fn rms(samples: &[f32], frame_length: usize, hop_length: usize) -> Vec<f32> {
    let n_frames = 1 + samples.len() / hop_length;
    let pad = frame_length / 2;

    (0..n_frames)
        .map(|frame_idx| {
            let center = frame_idx * hop_length;
            let start = center.saturating_sub(pad);
            let end = (center + frame_length - pad).min(samples.len());
            let energy: f64 = samples
                .get(start..end)
                .unwrap_or(&[])
                .iter()
                .map(|&s| s as f64 * s as f64)
                .sum();
            (energy / frame_length as f64).sqrt() as f32
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::spectrum::Stft;
    use std::f32::consts::PI;

    fn sine(freq: f32, amplitude: f32, seconds: f32) -> Vec<f32> {
        (0..(22050.0 * seconds) as usize)
            .map(|i| (2.0 * PI * freq * i as f32 / 22050.0).sin() * amplitude)
            .collect()
    }

    #[test]
    fn test_rms_of_sine() {
        let samples = sine(440.0, 0.5, 2.0);
        let values = rms(&samples, 2048, 512);

        assert_eq!(values.len(), 1 + samples.len() / 512);
        let middle = values[values.len() / 2];
        assert!((middle - 0.5 / 2f32.sqrt()).abs() < 0.01, "rms {}", middle);
        // First frame is half padding
        assert!(values[0] < middle);
    }

    #[test]
    fn test_rms_of_silence() {
        assert!(rms(&vec![0.0; 4096], 2048, 512).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_centroid_tracks_frequency() {
        let stft = Stft::new(2048, 512);
        let low = stft.magnitudes(&sine(500.0, 0.5, 1.0), 22050).unwrap();
        let high = stft.magnitudes(&sine(4000.0, 0.5, 1.0), 22050).unwrap();

        let low_c = spectral_centroid(&low);
        let high_c = spectral_centroid(&high);
        let mid = low_c.len() / 2;
        assert!((low_c[mid] - 500.0).abs() < 100.0, "centroid {}", low_c[mid]);
        assert!(high_c[mid] > low_c[mid] * 4.0);
    }

    #[test]
    fn test_profile_downsampling() {
        let samples = sine(1000.0, 0.3, 5.0);
        let stft = Stft::new(2048, 512);
        let spec = stft.magnitudes(&samples, 22050).unwrap();
        let grid = FrameGrid::new(22050, 512);

        let profile = profile(&samples, &spec, &grid);
        let frames = 1 + samples.len() / 512;
        let expected = frames.div_ceil(43);

        assert_eq!(profile.spectral.len(), expected);
        assert_eq!(profile.energy.len(), expected);
        assert_eq!(profile.spectral.times, profile.energy.times);
        assert_eq!(profile.spectral.times[0], 0.0);
        assert!((profile.spectral.times[1] - 43.0 * 512.0 / 22050.0).abs() < 1e-12);
    }
}
