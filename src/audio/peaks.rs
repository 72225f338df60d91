//! "Dramatic moments": frames where the onset envelope comes close to its
//! global maximum.

use crate::audio::types::{FrameGrid, OnsetEnvelope};
use crate::config::PeakConfig;

pub struct PeakSelector {
    threshold: f64,
    epsilon: f64,
}

impl PeakSelector {
    pub fn new(config: &PeakConfig) -> Self {
        Self {
            threshold: config.threshold,
            epsilon: config.epsilon,
        }
    }

    /// Envelope scaled by `max + epsilon`, so values lie in `[0, 1)`
    pub fn normalized(&self, envelope: &OnsetEnvelope) -> Vec<f64> {
        let denominator = envelope.max() as f64 + self.epsilon;
        envelope
            .values()
            .iter()
            .map(|&v| v as f64 / denominator)
            .collect()
    }

    /// Every frame whose normalized strength is strictly above the threshold.
    ///
    /// Neighboring frames are all reported; there is no minimum spacing.
    pub fn select_frames(&self, envelope: &OnsetEnvelope) -> Vec<usize> {
        self.normalized(envelope)
            .iter()
            .enumerate()
            .filter(|&(_, &v)| v > self.threshold)
            .map(|(frame, _)| frame)
            .collect()
    }

    pub fn select_times(&self, envelope: &OnsetEnvelope, grid: &FrameGrid) -> Vec<f64> {
        let frames = self.select_frames(envelope);
        tracing::debug!("Selected {} dramatic moments", frames.len());
        grid.frames_to_times(&frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selector() -> PeakSelector {
        PeakSelector::new(&PeakConfig::default())
    }

    #[test]
    fn test_threshold_is_strict() {
        // 7.0 is exactly 0.7 of the max; epsilon leaves it just under
        let env = OnsetEnvelope::new(vec![0.0, 10.0, 7.0, 7.5, 2.0]);
        assert_eq!(selector().select_frames(&env), vec![1, 3]);
    }

    #[test]
    fn test_adjacent_frames_kept() {
        let env = OnsetEnvelope::new(vec![0.0, 0.9, 1.0, 0.95, 0.1]);
        assert_eq!(selector().select_frames(&env), vec![1, 2, 3]);
    }

    #[test]
    fn test_silence_selects_nothing() {
        let env = OnsetEnvelope::new(vec![0.0; 64]);
        assert!(selector().select_frames(&env).is_empty());
        assert!(selector().normalized(&env).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_every_selected_frame_exceeds_threshold() {
        let values: Vec<f32> = (0..200).map(|i| ((i * 37) % 101) as f32 / 10.0).collect();
        let env = OnsetEnvelope::new(values);
        let sel = selector();
        let normalized = sel.normalized(&env);
        let frames = sel.select_frames(&env);

        for (frame, &value) in normalized.iter().enumerate() {
            assert_eq!(frames.contains(&frame), value > 0.7);
        }
    }

    #[test]
    fn test_times_use_frame_grid() {
        let env = OnsetEnvelope::new(vec![0.0, 0.0, 1.0]);
        let times = selector().select_times(&env, &FrameGrid::new(22050, 512));
        assert_eq!(times, vec![1024.0 / 22050.0]);
    }
}
