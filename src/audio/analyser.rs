//! FFT analysis node: keeps the latest window of mono samples and renders
//! byte-scaled spectrum and waveform snapshots on demand.
//!
//! Scaling follows the browser analyser convention the thresholds were tuned
//! against: Blackman window, magnitudes scaled by `1 / fft_size`, linear
//! smoothing across reads, then `[min_decibels, max_decibels]` mapped onto
//! `0..=255`. Time-domain bytes are `128 * (1 + x)`.

use super::{
    DEFAULT_FFT_SIZE, DEFAULT_MAX_DECIBELS, DEFAULT_MIN_DECIBELS, DEFAULT_SMOOTHING,
    MAX_FFT_SIZE, MIN_FFT_SIZE,
};
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;

const BLACKMAN_ALPHA: f32 = 0.16;

/// Shape of the analysis node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalyserSettings {
    /// Window length in samples; normalized to a power of two.
    pub fft_size: usize,
    /// Weight of the previous spectrum when smoothing (0 = none, <1).
    pub smoothing: f32,
    pub min_decibels: f32,
    pub max_decibels: f32,
}

impl Default for AnalyserSettings {
    fn default() -> Self {
        Self {
            fft_size: DEFAULT_FFT_SIZE,
            smoothing: DEFAULT_SMOOTHING,
            min_decibels: DEFAULT_MIN_DECIBELS,
            max_decibels: DEFAULT_MAX_DECIBELS,
        }
    }
}

impl AnalyserSettings {
    /// Window length actually used by [`Analyser`].
    pub fn normalized_fft_size(&self) -> usize {
        self.fft_size
            .clamp(MIN_FFT_SIZE, MAX_FFT_SIZE)
            .next_power_of_two()
    }

    pub fn frequency_bin_count(&self) -> usize {
        self.normalized_fft_size() / 2
    }
}

pub struct Analyser {
    fft: Arc<dyn Fft<f32>>,
    fft_size: usize,
    smoothing: f32,
    min_decibels: f32,
    max_decibels: f32,
    /// Ring of the most recent `fft_size` samples.
    ring: Vec<f32>,
    write_pos: usize,
    window: Vec<f32>,
    spectrum: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    smoothed: Vec<f32>,
    samples_seen: u64,
}

impl Analyser {
    pub fn new(settings: AnalyserSettings) -> Self {
        let fft_size = settings.normalized_fft_size();
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);
        let scratch_len = fft.get_inplace_scratch_len();

        let a0 = (1.0 - BLACKMAN_ALPHA) / 2.0;
        let a1 = 0.5;
        let a2 = BLACKMAN_ALPHA / 2.0;
        let window = (0..fft_size)
            .map(|i| {
                let phase = 2.0 * PI * i as f32 / fft_size as f32;
                a0 - a1 * phase.cos() + a2 * (2.0 * phase).cos()
            })
            .collect();

        let (min_decibels, max_decibels) = if settings.max_decibels > settings.min_decibels {
            (settings.min_decibels, settings.max_decibels)
        } else {
            (DEFAULT_MIN_DECIBELS, DEFAULT_MAX_DECIBELS)
        };

        Self {
            fft,
            fft_size,
            smoothing: settings.smoothing.clamp(0.0, 1.0),
            min_decibels,
            max_decibels,
            ring: vec![0.0; fft_size],
            write_pos: 0,
            window,
            spectrum: vec![Complex::new(0.0, 0.0); fft_size],
            scratch: vec![Complex::new(0.0, 0.0); scratch_len],
            smoothed: vec![0.0; fft_size / 2],
            samples_seen: 0,
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn frequency_bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Total samples pushed since creation.
    pub fn samples_seen(&self) -> u64 {
        self.samples_seen
    }

    /// Append mono samples; anything older than one window is forgotten.
    pub fn push_samples(&mut self, samples: &[f32]) {
        for &sample in samples {
            self.ring[self.write_pos] = if sample.is_finite() { sample } else { 0.0 };
            self.write_pos = (self.write_pos + 1) % self.fft_size;
        }
        self.samples_seen = self.samples_seen.saturating_add(samples.len() as u64);
    }

    #[inline]
    fn ordered(&self, index: usize) -> f32 {
        self.ring[(self.write_pos + index) % self.fft_size]
    }

    /// Write the current waveform, oldest sample first, as unsigned bytes.
    pub fn byte_time_domain_data(&self, out: &mut [u8]) {
        for (index, slot) in out.iter_mut().take(self.fft_size).enumerate() {
            let scaled = (f32::from(super::BYTE_MIDPOINT) * (1.0 + self.ordered(index))).floor();
            *slot = scaled.clamp(0.0, 255.0) as u8;
        }
    }

    /// Compute the smoothed spectrum of the current window and write it as
    /// unsigned bytes. Each call advances the smoothing state by one step.
    pub fn byte_frequency_data(&mut self, out: &mut [u8]) {
        self.update_spectrum();
        let range = self.max_decibels - self.min_decibels;
        let scale = 255.0 / range;
        for (slot, magnitude) in out.iter_mut().zip(self.smoothed.iter()) {
            *slot = if *magnitude > 0.0 {
                let db = 20.0 * magnitude.log10();
                (scale * (db - self.min_decibels)).floor().clamp(0.0, 255.0) as u8
            } else {
                0
            };
        }
    }

    fn update_spectrum(&mut self) {
        for index in 0..self.fft_size {
            let sample = self.ordered(index) * self.window[index];
            self.spectrum[index] = Complex::new(sample, 0.0);
        }
        self.fft.process_with_scratch(&mut self.spectrum, &mut self.scratch);

        let norm = 1.0 / self.fft_size as f32;
        let keep = self.smoothing;
        for (smoothed, bin) in self.smoothed.iter_mut().zip(self.spectrum.iter()) {
            let magnitude = bin.norm() * norm;
            let next = keep * *smoothed + (1.0 - keep) * magnitude;
            *smoothed = if next.is_finite() { next } else { 0.0 };
        }
    }
}
