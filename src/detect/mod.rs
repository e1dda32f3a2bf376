//! Blow detection: feature extraction, policy + debounce classification, and
//! the frame-paced loop that owns the capture session.

mod classifier;
mod features;
mod job;
mod policy;
mod scheduler;
mod status;

pub use classifier::{
    BlowClassifier, BlowDetectionState, Debounce, DetectorPhase, Verdict, DEFAULT_LEAK_RATE,
    DEFAULT_REQUIRED_SUSTAINED_FRAMES,
};
pub use features::{FeatureExtractor, FeatureFrame, DEFAULT_LOW_FREQ_FRACTION};
pub use job::{DetectionEvent, DetectionJob};
pub use policy::{
    AverageLevelPolicy, BlowPolicy, DualGatePolicy, WeightedScorePolicy,
    DEFAULT_AMPLITUDE_THRESHOLD, DEFAULT_AMPLITUDE_WEIGHT, DEFAULT_AVERAGE_THRESHOLD,
    DEFAULT_COMBINED_THRESHOLD, DEFAULT_LOW_FREQ_PEAK_THRESHOLD, DEFAULT_LOW_FREQ_THRESHOLD,
    DEFAULT_LOW_FREQ_WEIGHT,
};
pub use scheduler::{
    CancelToken, DetectionLoop, FrameClock, IntervalClock, LoopExit, StartOutcome, TickOutcome,
    UnpacedClock,
};
pub use status::{DetectionStatus, BLOWN_OUT_LABEL, IDLE_LABEL, LISTENING_LABEL};
