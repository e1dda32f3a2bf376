use crate::audio::{DEFAULT_FFT_SIZE, DEFAULT_SMOOTHING};
use crate::detect::DEFAULT_LOW_FREQ_FRACTION;

pub const DEFAULT_FFT_WINDOW: usize = DEFAULT_FFT_SIZE;
pub const DEFAULT_SMOOTHING_CONSTANT: f32 = DEFAULT_SMOOTHING;
pub const DEFAULT_LOW_FREQUENCY_FRACTION: f32 = DEFAULT_LOW_FREQ_FRACTION;

pub const DEFAULT_FRAME_RATE: u32 = 60;
pub const MAX_FRAME_RATE: u32 = 240;

pub const DEFAULT_REPLAY_SAMPLE_RATE: u32 = 48_000;
pub const MIN_REPLAY_SAMPLE_RATE: u32 = 8_000;
pub const MAX_REPLAY_SAMPLE_RATE: u32 = 192_000;

pub const MAX_SUSTAINED_FRAMES: u32 = 120;
pub const MAX_ROUNDS: u32 = 100;

pub const DEFAULT_CALIBRATE_AMBIENT_MS: u64 = 2_000;
pub const DEFAULT_CALIBRATE_BLOW_MS: u64 = 3_000;
pub const MIN_CALIBRATE_SAMPLE_MS: u64 = 500;
pub const MAX_CALIBRATE_SAMPLE_MS: u64 = 10_000;

/// Largest byte-scaled spectrum value.
pub const MAX_SPECTRUM_LEVEL: f32 = 255.0;
/// Largest deviation from the 8-bit waveform midpoint.
pub const MAX_WAVEFORM_DEVIATION: f32 = 128.0;
