//! Command-line parsing, validation, and the runtime detector settings.

mod defaults;
mod validation;

use crate::audio::AnalyserSettings;
use crate::detect::{
    AverageLevelPolicy, BlowPolicy, Debounce, DualGatePolicy, IntervalClock, WeightedScorePolicy,
};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

pub use defaults::{
    DEFAULT_CALIBRATE_AMBIENT_MS, DEFAULT_CALIBRATE_BLOW_MS, DEFAULT_FFT_WINDOW,
    DEFAULT_FRAME_RATE, DEFAULT_LOW_FREQUENCY_FRACTION, DEFAULT_REPLAY_SAMPLE_RATE,
    DEFAULT_SMOOTHING_CONSTANT, MAX_CALIBRATE_SAMPLE_MS, MIN_CALIBRATE_SAMPLE_MS,
};

use crate::detect::{
    DEFAULT_AMPLITUDE_THRESHOLD, DEFAULT_AMPLITUDE_WEIGHT, DEFAULT_AVERAGE_THRESHOLD,
    DEFAULT_COMBINED_THRESHOLD, DEFAULT_LEAK_RATE, DEFAULT_LOW_FREQ_PEAK_THRESHOLD,
    DEFAULT_LOW_FREQ_THRESHOLD, DEFAULT_LOW_FREQ_WEIGHT, DEFAULT_REQUIRED_SUSTAINED_FRAMES,
};

/// CLI options for blowout. Every detection constant is a flag so tuning
/// never needs a rebuild.
#[derive(Debug, Parser, Clone)]
#[command(about = "Blowout: blow out the birthday candles through your microphone", author, version)]
pub struct AppConfig {
    /// Preferred audio input device name
    #[arg(long)]
    pub input_device: Option<String>,

    /// Print detected audio input devices and exit
    #[arg(long = "list-input-devices", default_value_t = false)]
    pub list_input_devices: bool,

    /// Analysis window in samples (power of two)
    #[arg(long = "fft-size", default_value_t = DEFAULT_FFT_WINDOW)]
    pub fft_size: usize,

    /// Spectrum smoothing between frames (0.0 = none, below 1.0)
    #[arg(long, default_value_t = DEFAULT_SMOOTHING_CONSTANT)]
    pub smoothing: f32,

    /// Fraction of frequency bins treated as low frequency
    #[arg(long = "low-freq-fraction", default_value_t = DEFAULT_LOW_FREQUENCY_FRACTION)]
    pub low_freq_fraction: f32,

    /// Blow detection policy
    #[arg(long, value_enum, default_value_t = PolicyKind::DualGate)]
    pub policy: PolicyKind,

    /// Dual gate: minimum low-frequency average (0-255, exclusive)
    #[arg(long = "low-freq-threshold", default_value_t = DEFAULT_LOW_FREQ_THRESHOLD)]
    pub low_freq_threshold: f32,

    /// Dual gate: minimum low-frequency peak (0-255, exclusive)
    #[arg(long = "low-freq-peak-threshold", default_value_t = DEFAULT_LOW_FREQ_PEAK_THRESHOLD)]
    pub low_freq_peak_threshold: f32,

    /// Dual gate: minimum waveform peak deviation (0-128, exclusive)
    #[arg(long = "amplitude-threshold", default_value_t = DEFAULT_AMPLITUDE_THRESHOLD)]
    pub amplitude_threshold: f32,

    /// Weighted: weight of the low-frequency average
    #[arg(long = "low-freq-weight", default_value_t = DEFAULT_LOW_FREQ_WEIGHT)]
    pub low_freq_weight: f32,

    /// Weighted: weight of the average waveform deviation
    #[arg(long = "amplitude-weight", default_value_t = DEFAULT_AMPLITUDE_WEIGHT)]
    pub amplitude_weight: f32,

    /// Weighted: score threshold (exclusive)
    #[arg(long = "combined-threshold", default_value_t = DEFAULT_COMBINED_THRESHOLD)]
    pub combined_threshold: f32,

    /// Average: low-frequency average threshold (exclusive)
    #[arg(long = "average-threshold", default_value_t = DEFAULT_AVERAGE_THRESHOLD)]
    pub average_threshold: f32,

    /// Frames the leaky counter must reach before the candles go out
    #[arg(long = "sustained-frames", default_value_t = DEFAULT_REQUIRED_SUSTAINED_FRAMES)]
    pub sustained_frames: u32,

    /// Amount the leaky counter drops on a non-blow frame
    #[arg(long = "leak-rate", default_value_t = DEFAULT_LEAK_RATE)]
    pub leak_rate: u32,

    /// Debounce the weighted and average policies too (dual gate always is)
    #[arg(long = "debounce-all", default_value_t = false)]
    pub debounce_all: bool,

    /// Detection ticks per second (display refresh stand-in)
    #[arg(long = "frame-rate", default_value_t = DEFAULT_FRAME_RATE)]
    pub frame_rate: u32,

    /// Run detection against raw mono f32le PCM instead of the microphone
    #[arg(long = "replay-pcm", value_name = "FILE")]
    pub replay_pcm: Option<PathBuf>,

    /// Sample rate of the --replay-pcm file (Hz)
    #[arg(long = "replay-sample-rate", default_value_t = DEFAULT_REPLAY_SAMPLE_RATE)]
    pub replay_sample_rate: u32,

    /// Number of times to relight and listen again after a blow-out
    #[arg(long, default_value_t = 1)]
    pub rounds: u32,

    /// Measure ambient and blowing levels, suggest thresholds, then exit
    #[arg(long, default_value_t = false)]
    pub calibrate: bool,

    /// Ambient sample duration for --calibrate (milliseconds)
    #[arg(long = "calibrate-ambient-ms", default_value_t = DEFAULT_CALIBRATE_AMBIENT_MS)]
    pub calibrate_ambient_ms: u64,

    /// Blowing sample duration for --calibrate (milliseconds)
    #[arg(long = "calibrate-blow-ms", default_value_t = DEFAULT_CALIBRATE_BLOW_MS)]
    pub calibrate_blow_ms: u64,

    /// Emit status changes as JSON lines
    #[arg(long = "json-status", default_value_t = false)]
    pub json_status: bool,

    /// Enable file logging (debug)
    #[arg(long = "logs", env = "BLOWOUT_LOGS", default_value_t = false)]
    pub logs: bool,

    /// Disable all file logging (overrides --logs)
    #[arg(long = "no-logs", env = "BLOWOUT_NO_LOGS", default_value_t = false)]
    pub no_logs: bool,

    /// Log every detection tick (trace level)
    #[arg(long)]
    pub log_timings: bool,
}

impl AppConfig {
    pub fn logging_enabled(&self) -> bool {
        (self.logs || self.log_timings) && !self.no_logs
    }

    /// Runtime detector settings derived from the validated flags.
    pub fn detector_config(&self) -> DetectorConfig {
        DetectorConfig {
            analyser: AnalyserSettings {
                fft_size: self.fft_size,
                smoothing: self.smoothing,
                ..AnalyserSettings::default()
            },
            low_freq_fraction: self.low_freq_fraction,
            policy: self.policy,
            dual_gate: DualGatePolicy {
                low_freq_threshold: self.low_freq_threshold,
                low_freq_peak_threshold: self.low_freq_peak_threshold,
                amplitude_threshold: self.amplitude_threshold,
            },
            weighted: WeightedScorePolicy {
                low_freq_weight: self.low_freq_weight,
                amplitude_weight: self.amplitude_weight,
                threshold: self.combined_threshold,
            },
            average: AverageLevelPolicy {
                threshold: self.average_threshold,
            },
            debounce: Debounce {
                required_frames: self.sustained_frames,
                decrement: self.leak_rate,
            },
            debounce_all: self.debounce_all,
            ticks_per_second: self.frame_rate,
            max_ticks: None,
        }
    }
}

/// Runtime-selectable blow policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PolicyKind {
    /// Low-band average, low-band peak and waveform peak must all pass
    DualGate,
    /// Weighted mean of low-band average and waveform level
    Weighted,
    /// Single low-band average threshold
    Average,
}

impl PolicyKind {
    pub fn label(self) -> &'static str {
        match self {
            PolicyKind::DualGate => "dual-gate",
            PolicyKind::Weighted => "weighted",
            PolicyKind::Average => "average",
        }
    }
}

/// Everything the detection loop needs, independent of the CLI.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    pub analyser: AnalyserSettings,
    pub low_freq_fraction: f32,
    pub policy: PolicyKind,
    pub dual_gate: DualGatePolicy,
    pub weighted: WeightedScorePolicy,
    pub average: AverageLevelPolicy,
    pub debounce: Debounce,
    /// Apply `debounce` to policies that default to confirming immediately.
    pub debounce_all: bool,
    pub ticks_per_second: u32,
    /// Stop after this many ticks without a verdict (offline replays).
    pub max_ticks: Option<u64>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            analyser: AnalyserSettings::default(),
            low_freq_fraction: DEFAULT_LOW_FREQUENCY_FRACTION,
            policy: PolicyKind::DualGate,
            dual_gate: DualGatePolicy::default(),
            weighted: WeightedScorePolicy::default(),
            average: AverageLevelPolicy::default(),
            debounce: Debounce::default(),
            debounce_all: false,
            ticks_per_second: DEFAULT_FRAME_RATE,
            max_ticks: None,
        }
    }
}

impl DetectorConfig {
    pub fn build_policy(&self) -> Box<dyn BlowPolicy> {
        match self.policy {
            PolicyKind::DualGate => Box::new(self.dual_gate),
            PolicyKind::Weighted => Box::new(self.weighted),
            PolicyKind::Average => Box::new(self.average),
        }
    }

    /// Live display-frame clock at `ticks_per_second`.
    pub fn frame_clock(&self) -> IntervalClock {
        IntervalClock::new(self.ticks_per_second)
    }

    /// Debounce actually applied for `policy`.
    pub fn effective_debounce(&self, policy: &dyn BlowPolicy) -> Debounce {
        if policy.wants_debounce() || self.debounce_all {
            self.debounce
        } else {
            Debounce::immediate()
        }
    }
}
