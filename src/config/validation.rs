use super::defaults::{
    MAX_CALIBRATE_SAMPLE_MS, MAX_FRAME_RATE, MAX_REPLAY_SAMPLE_RATE, MAX_ROUNDS,
    MAX_SPECTRUM_LEVEL, MAX_SUSTAINED_FRAMES, MAX_WAVEFORM_DEVIATION, MIN_CALIBRATE_SAMPLE_MS,
    MIN_REPLAY_SAMPLE_RATE,
};
use super::AppConfig;
use crate::audio::{MAX_FFT_SIZE, MIN_FFT_SIZE};
use anyhow::{bail, Result};

const MAX_DEVICE_NAME_LEN: usize = 256;

impl AppConfig {
    /// Check CLI values before any device is touched.
    pub fn validate(&self) -> Result<()> {
        if !self.fft_size.is_power_of_two() || !(MIN_FFT_SIZE..=MAX_FFT_SIZE).contains(&self.fft_size)
        {
            bail!(
                "--fft-size must be a power of two between {MIN_FFT_SIZE} and {MAX_FFT_SIZE}, got {}",
                self.fft_size
            );
        }
        if !(0.0..1.0).contains(&self.smoothing) {
            bail!(
                "--smoothing must be >= 0.0 and < 1.0, got {}",
                self.smoothing
            );
        }
        if !(self.low_freq_fraction > 0.0 && self.low_freq_fraction <= 1.0) {
            bail!(
                "--low-freq-fraction must be greater than 0.0 and at most 1.0, got {}",
                self.low_freq_fraction
            );
        }

        check_level("--low-freq-threshold", self.low_freq_threshold, MAX_SPECTRUM_LEVEL)?;
        check_level(
            "--low-freq-peak-threshold",
            self.low_freq_peak_threshold,
            MAX_SPECTRUM_LEVEL,
        )?;
        check_level(
            "--amplitude-threshold",
            self.amplitude_threshold,
            MAX_WAVEFORM_DEVIATION,
        )?;
        check_level("--average-threshold", self.average_threshold, MAX_SPECTRUM_LEVEL)?;

        if !self.low_freq_weight.is_finite() || self.low_freq_weight < 0.0 {
            bail!("--low-freq-weight must be >= 0.0, got {}", self.low_freq_weight);
        }
        if !self.amplitude_weight.is_finite() || self.amplitude_weight < 0.0 {
            bail!(
                "--amplitude-weight must be >= 0.0, got {}",
                self.amplitude_weight
            );
        }
        if self.low_freq_weight + self.amplitude_weight <= 0.0 {
            bail!("--low-freq-weight and --amplitude-weight cannot both be zero");
        }
        if !self.combined_threshold.is_finite() || self.combined_threshold < 0.0 {
            bail!(
                "--combined-threshold must be >= 0.0, got {}",
                self.combined_threshold
            );
        }

        if !(1..=MAX_SUSTAINED_FRAMES).contains(&self.sustained_frames) {
            bail!(
                "--sustained-frames must be between 1 and {MAX_SUSTAINED_FRAMES}, got {}",
                self.sustained_frames
            );
        }
        if self.leak_rate == 0 || self.leak_rate > self.sustained_frames {
            bail!(
                "--leak-rate must be between 1 and --sustained-frames ({}), got {}",
                self.sustained_frames,
                self.leak_rate
            );
        }
        if !(1..=MAX_FRAME_RATE).contains(&self.frame_rate) {
            bail!(
                "--frame-rate must be between 1 and {MAX_FRAME_RATE}, got {}",
                self.frame_rate
            );
        }
        if !(MIN_REPLAY_SAMPLE_RATE..=MAX_REPLAY_SAMPLE_RATE).contains(&self.replay_sample_rate) {
            bail!(
                "--replay-sample-rate must be between {MIN_REPLAY_SAMPLE_RATE} and {MAX_REPLAY_SAMPLE_RATE} Hz, got {}",
                self.replay_sample_rate
            );
        }
        if !(1..=MAX_ROUNDS).contains(&self.rounds) {
            bail!("--rounds must be between 1 and {MAX_ROUNDS}, got {}", self.rounds);
        }
        if !(MIN_CALIBRATE_SAMPLE_MS..=MAX_CALIBRATE_SAMPLE_MS).contains(&self.calibrate_ambient_ms)
        {
            bail!(
                "--calibrate-ambient-ms must be between {MIN_CALIBRATE_SAMPLE_MS} and {MAX_CALIBRATE_SAMPLE_MS} ms"
            );
        }
        if !(MIN_CALIBRATE_SAMPLE_MS..=MAX_CALIBRATE_SAMPLE_MS).contains(&self.calibrate_blow_ms) {
            bail!(
                "--calibrate-blow-ms must be between {MIN_CALIBRATE_SAMPLE_MS} and {MAX_CALIBRATE_SAMPLE_MS} ms"
            );
        }

        if let Some(device) = &self.input_device {
            if device.trim().is_empty()
                || device.len() > MAX_DEVICE_NAME_LEN
                || device.chars().any(char::is_control)
            {
                bail!(
                    "--input-device must be 1-{MAX_DEVICE_NAME_LEN} characters with no control characters"
                );
            }
        }

        if let Some(path) = &self.replay_pcm {
            if !path.is_file() {
                bail!("--replay-pcm file not found: {}", path.display());
            }
            if self.calibrate {
                bail!("--calibrate needs a live microphone and cannot be combined with --replay-pcm");
            }
        }

        Ok(())
    }
}

fn check_level(flag: &str, value: f32, max: f32) -> Result<()> {
    if !(0.0..=max).contains(&value) {
        bail!("{flag} must be between 0 and {max}, got {value}");
    }
    Ok(())
}
