//! Stateful blow classifier: `Idle -> Armed -> Confirmed`, with a leaky
//! counter between the per-frame policy and the confirmation.

use super::features::FeatureFrame;
use super::policy::BlowPolicy;

pub const DEFAULT_REQUIRED_SUSTAINED_FRAMES: u32 = 3;
pub const DEFAULT_LEAK_RATE: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorPhase {
    /// Not listening; the state after construction, teardown or relight.
    Idle,
    /// Listening and accumulating evidence.
    Armed,
    /// Candles are out. Terminal until [`BlowClassifier::reset`] or re-arm.
    Confirmed,
}

/// The only detection state that survives from one tick to the next.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlowDetectionState {
    pub sustained_count: u32,
    pub is_listening: bool,
    pub is_blown_out: bool,
}

/// Leaky counter settings. A passing frame adds one (capped at
/// `required_frames`); a failing frame subtracts `decrement`, floored at 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Debounce {
    pub required_frames: u32,
    pub decrement: u32,
}

impl Default for Debounce {
    fn default() -> Self {
        Self {
            required_frames: DEFAULT_REQUIRED_SUSTAINED_FRAMES,
            decrement: DEFAULT_LEAK_RATE,
        }
    }
}

impl Debounce {
    /// Confirm on the first passing frame.
    pub fn immediate() -> Self {
        Self {
            required_frames: 1,
            decrement: DEFAULT_LEAK_RATE,
        }
    }

    fn required(&self) -> u32 {
        self.required_frames.max(1)
    }

    fn step(&self, count: u32, passed: bool) -> u32 {
        if passed {
            count.saturating_add(1).min(self.required())
        } else {
            count.saturating_sub(self.decrement)
        }
    }
}

/// Outcome of feeding one frame to the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    /// The policy passed on this frame alone.
    pub instantaneous: bool,
    pub sustained_count: u32,
    /// This frame moved the classifier into `Confirmed`.
    pub confirmed: bool,
}

pub struct BlowClassifier {
    policy: Box<dyn BlowPolicy>,
    debounce: Debounce,
    phase: DetectorPhase,
    state: BlowDetectionState,
}

impl BlowClassifier {
    pub fn new(policy: Box<dyn BlowPolicy>, debounce: Debounce) -> Self {
        Self {
            policy,
            debounce,
            phase: DetectorPhase::Idle,
            state: BlowDetectionState::default(),
        }
    }

    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    pub fn debounce(&self) -> Debounce {
        self.debounce
    }

    pub fn phase(&self) -> DetectorPhase {
        self.phase
    }

    pub fn state(&self) -> BlowDetectionState {
        self.state
    }

    /// Start listening from a clean slate (also re-arms after a blow-out).
    pub fn arm(&mut self) {
        self.phase = DetectorPhase::Armed;
        self.state = BlowDetectionState {
            sustained_count: 0,
            is_listening: true,
            is_blown_out: false,
        };
    }

    /// Stop listening without touching the blown-out flag.
    pub fn disarm(&mut self) {
        if self.phase == DetectorPhase::Armed {
            self.phase = DetectorPhase::Idle;
            self.state.sustained_count = 0;
        }
        self.state.is_listening = false;
    }

    /// Back to `Idle` with candles lit.
    pub fn reset(&mut self) {
        self.phase = DetectorPhase::Idle;
        self.state = BlowDetectionState::default();
    }

    /// Classify one frame. Frames seen outside `Armed` change nothing.
    pub fn observe(&mut self, frame: &FeatureFrame) -> Verdict {
        if self.phase != DetectorPhase::Armed {
            return Verdict {
                instantaneous: false,
                sustained_count: self.state.sustained_count,
                confirmed: false,
            };
        }

        let instantaneous = self.policy.is_blow(frame);
        self.state.sustained_count = self
            .debounce
            .step(self.state.sustained_count, instantaneous);

        let confirmed = self.state.sustained_count >= self.debounce.required();
        if confirmed {
            self.phase = DetectorPhase::Confirmed;
            self.state.is_blown_out = true;
            self.state.is_listening = false;
        }

        Verdict {
            instantaneous,
            sustained_count: self.state.sustained_count,
            confirmed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::policy::{DualGatePolicy, WeightedScorePolicy};

    fn passing() -> FeatureFrame {
        FeatureFrame {
            low_frequency_average: 200.0,
            low_frequency_peak: 210.0,
            time_domain_peak: 70.0,
            time_domain_average: 30.0,
        }
    }

    fn armed_dual_gate() -> BlowClassifier {
        let mut classifier =
            BlowClassifier::new(Box::new(DualGatePolicy::default()), Debounce::default());
        classifier.arm();
        classifier
    }

    #[test]
    fn starts_idle_and_ignores_frames() {
        let mut classifier =
            BlowClassifier::new(Box::new(DualGatePolicy::default()), Debounce::immediate());
        let verdict = classifier.observe(&passing());
        assert!(!verdict.instantaneous);
        assert_eq!(classifier.phase(), DetectorPhase::Idle);
        assert_eq!(classifier.state(), BlowDetectionState::default());
    }

    #[test]
    fn three_passing_frames_confirm() {
        let mut classifier = armed_dual_gate();
        assert!(!classifier.observe(&passing()).confirmed);
        assert!(!classifier.observe(&passing()).confirmed);
        let verdict = classifier.observe(&passing());
        assert!(verdict.confirmed);
        assert_eq!(classifier.phase(), DetectorPhase::Confirmed);
        let state = classifier.state();
        assert!(state.is_blown_out);
        assert!(!state.is_listening);
    }

    #[test]
    fn leaky_counter_follows_k_minus_misses() {
        for k in 0..3u32 {
            for misses in 0..5u32 {
                let mut classifier = armed_dual_gate();
                for _ in 0..k {
                    classifier.observe(&passing());
                }
                for _ in 0..misses {
                    classifier.observe(&FeatureFrame::default());
                }
                assert_eq!(
                    classifier.state().sustained_count,
                    k.saturating_sub(misses),
                    "k={k} misses={misses}"
                );
                assert_eq!(classifier.phase(), DetectorPhase::Armed);
            }
        }
    }

    #[test]
    fn brief_gap_keeps_progress() {
        let mut classifier = armed_dual_gate();
        classifier.observe(&passing());
        classifier.observe(&passing());
        classifier.observe(&FeatureFrame::default());
        assert_eq!(classifier.state().sustained_count, 1);
        classifier.observe(&passing());
        assert!(classifier.observe(&passing()).confirmed);
    }

    #[test]
    fn larger_decrement_drains_faster() {
        let mut classifier = BlowClassifier::new(
            Box::new(DualGatePolicy::default()),
            Debounce {
                required_frames: 5,
                decrement: 2,
            },
        );
        classifier.arm();
        for _ in 0..3 {
            classifier.observe(&passing());
        }
        classifier.observe(&FeatureFrame::default());
        assert_eq!(classifier.state().sustained_count, 1);
    }

    #[test]
    fn confirmed_is_terminal_until_reset() {
        let mut classifier =
            BlowClassifier::new(Box::new(DualGatePolicy::default()), Debounce::immediate());
        classifier.arm();
        assert!(classifier.observe(&passing()).confirmed);
        let verdict = classifier.observe(&passing());
        assert!(!verdict.confirmed);
        assert_eq!(classifier.phase(), DetectorPhase::Confirmed);

        classifier.disarm();
        assert!(classifier.state().is_blown_out);

        classifier.reset();
        assert_eq!(classifier.phase(), DetectorPhase::Idle);
        assert_eq!(classifier.state(), BlowDetectionState::default());
    }

    #[test]
    fn arm_after_blow_out_relights() {
        let mut classifier =
            BlowClassifier::new(Box::new(WeightedScorePolicy::default()), Debounce::immediate());
        classifier.arm();
        let loud = FeatureFrame {
            low_frequency_average: 200.0,
            time_domain_average: 100.0,
            ..FeatureFrame::default()
        };
        assert!(classifier.observe(&loud).confirmed);
        classifier.arm();
        let state = classifier.state();
        assert!(state.is_listening);
        assert!(!state.is_blown_out);
        assert_eq!(state.sustained_count, 0);
    }

    #[test]
    fn disarm_while_armed_returns_to_idle() {
        let mut classifier = armed_dual_gate();
        classifier.observe(&passing());
        classifier.disarm();
        assert_eq!(classifier.phase(), DetectorPhase::Idle);
        assert!(!classifier.state().is_listening);
        assert_eq!(classifier.state().sustained_count, 0);
    }
}
