//! Reduces one tick's spectrum and waveform snapshots to four scalars.

use crate::audio::BYTE_MIDPOINT;

/// Share of the spectrum treated as "low frequency". At 512-sample windows
/// this covers roughly the bottom 30% of the bins, where breath noise sits.
pub const DEFAULT_LOW_FREQ_FRACTION: f32 = 0.3;

/// Per-tick features; never outlives the tick that produced it.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FeatureFrame {
    /// Mean byte value over the low-frequency bins.
    pub low_frequency_average: f32,
    /// Largest byte value over the low-frequency bins.
    pub low_frequency_peak: f32,
    /// Largest absolute deviation from the waveform midpoint.
    pub time_domain_peak: f32,
    /// Mean absolute deviation from the waveform midpoint.
    pub time_domain_average: f32,
}

impl FeatureFrame {
    pub fn is_silent(&self) -> bool {
        *self == FeatureFrame::default()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FeatureExtractor {
    low_freq_fraction: f32,
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_LOW_FREQ_FRACTION)
    }
}

impl FeatureExtractor {
    /// `low_freq_fraction` is clamped into `(0, 1]`; non-finite values fall
    /// back to the default.
    pub fn new(low_freq_fraction: f32) -> Self {
        let low_freq_fraction = if low_freq_fraction.is_finite() && low_freq_fraction > 0.0 {
            low_freq_fraction.min(1.0)
        } else {
            DEFAULT_LOW_FREQ_FRACTION
        };
        Self { low_freq_fraction }
    }

    pub fn low_freq_fraction(&self) -> f32 {
        self.low_freq_fraction
    }

    /// Number of leading bins scanned for a spectrum of `bin_count` bins.
    /// Never zero for a non-empty spectrum.
    pub fn low_bin_count(&self, bin_count: usize) -> usize {
        let scaled = (bin_count as f32 * self.low_freq_fraction).floor() as usize;
        scaled.clamp(bin_count.min(1), bin_count)
    }

    pub fn extract(&self, frequency: &[u8], time_domain: &[u8]) -> FeatureFrame {
        let low_bins = &frequency[..self.low_bin_count(frequency.len())];
        let mut low_sum = 0u32;
        let mut low_peak = 0u8;
        for &value in low_bins {
            low_sum += u32::from(value);
            low_peak = low_peak.max(value);
        }

        let mut deviation_sum = 0u32;
        let mut deviation_peak = 0u8;
        for &sample in time_domain {
            let deviation = sample.abs_diff(BYTE_MIDPOINT);
            deviation_sum += u32::from(deviation);
            deviation_peak = deviation_peak.max(deviation);
        }

        FeatureFrame {
            low_frequency_average: low_sum as f32 / low_bins.len().max(1) as f32,
            low_frequency_peak: f32::from(low_peak),
            time_domain_peak: f32::from(deviation_peak),
            time_domain_average: deviation_sum as f32 / time_domain.len().max(1) as f32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn averages_only_the_low_fraction() {
        let extractor = FeatureExtractor::new(0.25);
        let mut frequency = vec![0u8; 16];
        frequency[..4].copy_from_slice(&[100, 200, 50, 50]);
        frequency[10] = 255;
        let frame = extractor.extract(&frequency, &[]);
        assert_eq!(frame.low_frequency_average, 100.0);
        assert_eq!(frame.low_frequency_peak, 200.0);
    }

    #[test]
    fn time_domain_uses_absolute_deviation_from_midpoint() {
        let extractor = FeatureExtractor::default();
        let frame = extractor.extract(&[], &[128, 198, 58, 128]);
        assert_eq!(frame.time_domain_peak, 70.0);
        assert_eq!(frame.time_domain_average, 35.0);
    }

    #[test]
    fn empty_buffers_yield_zero_frame() {
        let frame = FeatureExtractor::default().extract(&[], &[]);
        assert!(frame.is_silent());
    }

    #[test]
    fn silent_buffers_yield_zero_frame() {
        let frame = FeatureExtractor::default().extract(&[0; 256], &[128; 512]);
        assert!(frame.is_silent());
    }

    #[test]
    fn low_bin_count_never_drops_to_zero() {
        let extractor = FeatureExtractor::new(0.3);
        assert_eq!(extractor.low_bin_count(0), 0);
        assert_eq!(extractor.low_bin_count(2), 1);
        assert_eq!(extractor.low_bin_count(256), 76);
    }

    #[test]
    fn fraction_is_clamped() {
        assert_eq!(FeatureExtractor::new(4.0).low_freq_fraction(), 1.0);
        assert_eq!(
            FeatureExtractor::new(0.0).low_freq_fraction(),
            DEFAULT_LOW_FREQ_FRACTION
        );
        assert_eq!(
            FeatureExtractor::new(f32::NAN).low_freq_fraction(),
            DEFAULT_LOW_FREQ_FRACTION
        );
    }
}
