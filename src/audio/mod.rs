//! Microphone capture and the FFT analysis node that the detector samples.
//!
//! Device audio arrives on a CPAL callback thread, is downmixed to mono and
//! pushed into an [`Analyser`]. The detection loop reads byte snapshots from
//! that analyser once per display frame; reads never block on the device.

/// Default analysis window. 512 samples gives 256 frequency bins.
pub const DEFAULT_FFT_SIZE: usize = 512;

/// Default exponential smoothing between successive spectrum reads.
pub const DEFAULT_SMOOTHING: f32 = 0.8;

/// Spectrum floor mapped to byte 0.
pub const DEFAULT_MIN_DECIBELS: f32 = -100.0;

/// Spectrum ceiling mapped to byte 255.
pub const DEFAULT_MAX_DECIBELS: f32 = -30.0;

/// Zero-crossing midpoint of the unsigned 8-bit time-domain encoding.
pub const BYTE_MIDPOINT: u8 = 128;

pub const MIN_FFT_SIZE: usize = 32;
pub const MAX_FFT_SIZE: usize = 32_768;

mod analyser;
mod capture;
mod dispatch;
mod mic;
mod replay;

pub use analyser::{Analyser, AnalyserSettings};
pub use capture::{AudioInput, AudioSession, CaptureError};
pub use mic::MicInput;
pub use replay::ReplayInput;
