//! Per-frame "is this a blow?" tests. Every comparison is strictly greater
//! than its threshold, so a value sitting exactly on a threshold never fires.

use super::features::FeatureFrame;

pub const DEFAULT_LOW_FREQ_THRESHOLD: f32 = 180.0;
pub const DEFAULT_LOW_FREQ_PEAK_THRESHOLD: f32 = 200.0;
pub const DEFAULT_AMPLITUDE_THRESHOLD: f32 = 60.0;
pub const DEFAULT_LOW_FREQ_WEIGHT: f32 = 1.5;
pub const DEFAULT_AMPLITUDE_WEIGHT: f32 = 0.5;
pub const DEFAULT_COMBINED_THRESHOLD: f32 = 100.0;
pub const DEFAULT_AVERAGE_THRESHOLD: f32 = 100.0;

/// Instantaneous blow test applied to every tick's features.
pub trait BlowPolicy: Send {
    fn is_blow(&self, frame: &FeatureFrame) -> bool;

    fn name(&self) -> &'static str {
        "unknown_policy"
    }

    /// Whether this policy needs sustained frames before confirming.
    fn wants_debounce(&self) -> bool {
        false
    }
}

/// Three independent gates: low-band energy, low-band peak and waveform
/// peak. Speech carries less low-band energy at the same loudness, so it
/// rarely clears all three.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DualGatePolicy {
    pub low_freq_threshold: f32,
    pub low_freq_peak_threshold: f32,
    pub amplitude_threshold: f32,
}

impl Default for DualGatePolicy {
    fn default() -> Self {
        Self {
            low_freq_threshold: DEFAULT_LOW_FREQ_THRESHOLD,
            low_freq_peak_threshold: DEFAULT_LOW_FREQ_PEAK_THRESHOLD,
            amplitude_threshold: DEFAULT_AMPLITUDE_THRESHOLD,
        }
    }
}

impl BlowPolicy for DualGatePolicy {
    fn is_blow(&self, frame: &FeatureFrame) -> bool {
        frame.low_frequency_average > self.low_freq_threshold
            && frame.low_frequency_peak > self.low_freq_peak_threshold
            && frame.time_domain_peak > self.amplitude_threshold
    }

    fn name(&self) -> &'static str {
        "dual_gate"
    }

    fn wants_debounce(&self) -> bool {
        true
    }
}

/// Weighted mean of low-band energy and waveform level against one soft
/// threshold. More permissive; suits quiet microphones.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedScorePolicy {
    pub low_freq_weight: f32,
    pub amplitude_weight: f32,
    pub threshold: f32,
}

impl Default for WeightedScorePolicy {
    fn default() -> Self {
        Self {
            low_freq_weight: DEFAULT_LOW_FREQ_WEIGHT,
            amplitude_weight: DEFAULT_AMPLITUDE_WEIGHT,
            threshold: DEFAULT_COMBINED_THRESHOLD,
        }
    }
}

impl WeightedScorePolicy {
    pub fn score(&self, frame: &FeatureFrame) -> f32 {
        let weight_sum = self.low_freq_weight + self.amplitude_weight;
        if weight_sum <= f32::EPSILON {
            return 0.0;
        }
        (frame.low_frequency_average * self.low_freq_weight
            + frame.time_domain_average * self.amplitude_weight)
            / weight_sum
    }
}

impl BlowPolicy for WeightedScorePolicy {
    fn is_blow(&self, frame: &FeatureFrame) -> bool {
        self.score(frame) > self.threshold
    }

    fn name(&self) -> &'static str {
        "weighted_score"
    }
}

/// Single threshold on the low-band average. With a low-frequency fraction
/// of 1.0 this is a plain whole-spectrum loudness gate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AverageLevelPolicy {
    pub threshold: f32,
}

impl Default for AverageLevelPolicy {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_AVERAGE_THRESHOLD,
        }
    }
}

impl BlowPolicy for AverageLevelPolicy {
    fn is_blow(&self, frame: &FeatureFrame) -> bool {
        frame.low_frequency_average > self.threshold
    }

    fn name(&self) -> &'static str {
        "average_level"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(low_avg: f32, low_peak: f32, time_peak: f32, time_avg: f32) -> FeatureFrame {
        FeatureFrame {
            low_frequency_average: low_avg,
            low_frequency_peak: low_peak,
            time_domain_peak: time_peak,
            time_domain_average: time_avg,
        }
    }

    #[test]
    fn dual_gate_requires_every_gate() {
        let policy = DualGatePolicy::default();
        assert!(policy.is_blow(&frame(200.0, 210.0, 70.0, 0.0)));
        assert!(!policy.is_blow(&frame(170.0, 210.0, 70.0, 0.0)));
        assert!(!policy.is_blow(&frame(200.0, 190.0, 70.0, 0.0)));
        assert!(!policy.is_blow(&frame(200.0, 210.0, 50.0, 0.0)));
    }

    #[test]
    fn dual_gate_boundary_values_do_not_trigger() {
        let policy = DualGatePolicy::default();
        assert!(!policy.is_blow(&frame(180.0, 210.0, 70.0, 0.0)));
        assert!(!policy.is_blow(&frame(200.0, 200.0, 70.0, 0.0)));
        assert!(!policy.is_blow(&frame(200.0, 210.0, 60.0, 0.0)));
    }

    #[test]
    fn weighted_score_matches_hand_computation() {
        let policy = WeightedScorePolicy::default();
        let quiet = frame(80.0, 0.0, 0.0, 40.0);
        assert!((policy.score(&quiet) - 65.0).abs() < 1e-4);
        assert!(!policy.is_blow(&quiet));
        assert!(policy.is_blow(&frame(140.0, 0.0, 0.0, 80.0)));
    }

    #[test]
    fn weighted_score_with_zero_weights_never_fires() {
        let policy = WeightedScorePolicy {
            low_freq_weight: 0.0,
            amplitude_weight: 0.0,
            threshold: 0.0,
        };
        assert!(!policy.is_blow(&frame(255.0, 255.0, 128.0, 128.0)));
    }

    #[test]
    fn zero_frame_never_fires_with_non_negative_thresholds() {
        let silent = FeatureFrame::default();
        let zeroed = DualGatePolicy {
            low_freq_threshold: 0.0,
            low_freq_peak_threshold: 0.0,
            amplitude_threshold: 0.0,
        };
        assert!(!zeroed.is_blow(&silent));
        assert!(!WeightedScorePolicy {
            threshold: 0.0,
            ..WeightedScorePolicy::default()
        }
        .is_blow(&silent));
        assert!(!AverageLevelPolicy { threshold: 0.0 }.is_blow(&silent));
    }

    #[test]
    fn only_dual_gate_asks_for_debounce() {
        assert!(DualGatePolicy::default().wants_debounce());
        assert!(!WeightedScorePolicy::default().wants_debounce());
        assert!(!AverageLevelPolicy::default().wants_debounce());
    }
}
