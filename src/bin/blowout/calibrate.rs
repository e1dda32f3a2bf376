//! `--calibrate`: sample the room, then a blow, and suggest dual-gate
//! thresholds that separate the two.

use anyhow::Result;
use blowout::audio::{AudioInput, AudioSession, MicInput, BYTE_MIDPOINT};
use blowout::config::AppConfig;
use blowout::detect::{CancelToken, FeatureExtractor, FeatureFrame, FrameClock, IntervalClock};
use blowout::log_debug;
use std::io::{self, Write};
use std::time::{Duration, Instant};

use crate::meter::{level_bar, DEFAULT_BAR_WIDTH};

const SPECTRUM_MAX: f32 = 255.0;
const WAVEFORM_MAX: f32 = 128.0;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct FieldStats {
    pub(crate) mean: f32,
    pub(crate) max: f32,
}

impl FieldStats {
    fn collect(values: impl Iterator<Item = f32>) -> Self {
        let mut count = 0usize;
        let mut sum = 0.0f32;
        let mut max = 0.0f32;
        for value in values {
            count += 1;
            sum += value;
            max = max.max(value);
        }
        if count == 0 {
            return Self::default();
        }
        Self {
            mean: sum / count as f32,
            max,
        }
    }
}

/// Summary of one calibration phase.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct PhaseStats {
    pub(crate) frames: usize,
    pub(crate) low_average: FieldStats,
    pub(crate) low_peak: FieldStats,
    pub(crate) time_peak: FieldStats,
}

impl PhaseStats {
    pub(crate) fn from_frames(frames: &[FeatureFrame]) -> Self {
        Self {
            frames: frames.len(),
            low_average: FieldStats::collect(frames.iter().map(|f| f.low_frequency_average)),
            low_peak: FieldStats::collect(frames.iter().map(|f| f.low_frequency_peak)),
            time_peak: FieldStats::collect(frames.iter().map(|f| f.time_domain_peak)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Suggestion {
    pub(crate) low_freq_threshold: f32,
    pub(crate) low_freq_peak_threshold: f32,
    pub(crate) amplitude_threshold: f32,
    pub(crate) warning: Option<&'static str>,
}

/// Place each threshold halfway between the loudest ambient frame and the
/// typical blowing frame.
pub(crate) fn recommend(ambient: &PhaseStats, blow: &PhaseStats) -> Suggestion {
    let (low_freq_threshold, low_ok) = split(ambient.low_average, blow.low_average, SPECTRUM_MAX);
    let (low_freq_peak_threshold, peak_ok) = split(ambient.low_peak, blow.low_peak, SPECTRUM_MAX);
    let (amplitude_threshold, amp_ok) = split(ambient.time_peak, blow.time_peak, WAVEFORM_MAX);

    let warning = if blow.frames == 0 || ambient.frames == 0 {
        Some("No audio frames were captured; check the selected input device.")
    } else if !(low_ok && peak_ok && amp_ok) {
        Some("Blowing is not clearly louder than the room; try blowing closer to the mic.")
    } else {
        None
    };

    Suggestion {
        low_freq_threshold,
        low_freq_peak_threshold,
        amplitude_threshold,
        warning,
    }
}

fn split(ambient: FieldStats, blow: FieldStats, ceiling: f32) -> (f32, bool) {
    if blow.mean > ambient.max {
        (((ambient.max + blow.mean) / 2.0).floor().clamp(0.0, ceiling), true)
    } else {
        ((ambient.max + 1.0).floor().clamp(0.0, ceiling), false)
    }
}

fn measure(
    session: &mut dyn AudioSession,
    extractor: &FeatureExtractor,
    duration: Duration,
    frame_rate: u32,
) -> Vec<FeatureFrame> {
    let mut frequency = vec![0u8; session.frequency_bin_count()];
    let mut time_domain = vec![BYTE_MIDPOINT; session.fft_size()];
    let mut clock = IntervalClock::new(frame_rate);
    let cancel = CancelToken::new();
    let deadline = Instant::now() + duration;
    let mut frames = Vec::new();
    while Instant::now() < deadline && clock.wait_next_frame(&cancel) {
        session.frequency_snapshot(&mut frequency);
        session.time_domain_snapshot(&mut time_domain);
        frames.push(extractor.extract(&frequency, &time_domain));
    }
    frames
}

fn print_phase(label: &str, stats: &PhaseStats, suggestion: &Suggestion) {
    println!("{label}");
    println!(
        "  low avg   {} {:>5.1}",
        level_bar(
            stats.low_average.mean,
            SPECTRUM_MAX,
            DEFAULT_BAR_WIDTH,
            Some(suggestion.low_freq_threshold)
        ),
        stats.low_average.mean
    );
    println!(
        "  low peak  {} {:>5.1}",
        level_bar(
            stats.low_peak.mean,
            SPECTRUM_MAX,
            DEFAULT_BAR_WIDTH,
            Some(suggestion.low_freq_peak_threshold)
        ),
        stats.low_peak.mean
    );
    println!(
        "  amplitude {} {:>5.1}",
        level_bar(
            stats.time_peak.mean,
            WAVEFORM_MAX,
            DEFAULT_BAR_WIDTH,
            Some(suggestion.amplitude_threshold)
        ),
        stats.time_peak.mean
    );
}

pub(crate) fn run(config: &AppConfig) -> Result<()> {
    let detector = config.detector_config();
    let extractor = FeatureExtractor::new(detector.low_freq_fraction);
    let mut input = MicInput::new(config.input_device.as_deref());
    let mut session = match input.open(&detector.analyser) {
        Ok(session) => session,
        Err(err) => {
            eprintln!("{}", err.user_message());
            return Err(err.into());
        }
    };

    println!(
        "Calibrating {}: stay quiet for {} ms...",
        input.describe(),
        config.calibrate_ambient_ms
    );
    let _ = io::stdout().flush();
    let ambient_frames = measure(
        session.as_mut(),
        &extractor,
        Duration::from_millis(config.calibrate_ambient_ms),
        detector.ticks_per_second,
    );

    println!(
        "Now blow steadily at the mic for {} ms...",
        config.calibrate_blow_ms
    );
    let _ = io::stdout().flush();
    let blow_frames = measure(
        session.as_mut(),
        &extractor,
        Duration::from_millis(config.calibrate_blow_ms),
        detector.ticks_per_second,
    );
    session.close();

    let ambient = PhaseStats::from_frames(&ambient_frames);
    let blow = PhaseStats::from_frames(&blow_frames);
    let suggestion = recommend(&ambient, &blow);
    log_debug(&format!(
        "calibration: ambient={ambient:?} blow={blow:?} suggestion={suggestion:?}"
    ));

    println!();
    print_phase("Ambient", &ambient, &suggestion);
    print_phase("Blowing", &blow, &suggestion);
    println!();
    if let Some(warning) = suggestion.warning {
        println!("Warning: {warning}");
    }
    println!(
        "Suggested flags: --low-freq-threshold {:.0} --low-freq-peak-threshold {:.0} --amplitude-threshold {:.0}",
        suggestion.low_freq_threshold,
        suggestion.low_freq_peak_threshold,
        suggestion.amplitude_threshold
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(low_avg: f32, low_peak: f32, time_peak: f32) -> FeatureFrame {
        FeatureFrame {
            low_frequency_average: low_avg,
            low_frequency_peak: low_peak,
            time_domain_peak: time_peak,
            time_domain_average: 0.0,
        }
    }

    #[test]
    fn stats_track_mean_and_max() {
        let stats = PhaseStats::from_frames(&[frame(10.0, 20.0, 4.0), frame(30.0, 40.0, 8.0)]);
        assert_eq!(stats.frames, 2);
        assert_eq!(stats.low_average, FieldStats { mean: 20.0, max: 30.0 });
        assert_eq!(stats.time_peak.max, 8.0);
    }

    #[test]
    fn thresholds_sit_between_room_and_blow() {
        let ambient = PhaseStats::from_frames(&[frame(100.0, 140.0, 10.0)]);
        let blow = PhaseStats::from_frames(&[frame(220.0, 240.0, 90.0)]);
        let suggestion = recommend(&ambient, &blow);
        assert_eq!(suggestion.low_freq_threshold, 160.0);
        assert_eq!(suggestion.low_freq_peak_threshold, 190.0);
        assert_eq!(suggestion.amplitude_threshold, 50.0);
        assert!(suggestion.warning.is_none());
    }

    #[test]
    fn weak_blow_warns_and_stays_above_room() {
        let ambient = PhaseStats::from_frames(&[frame(200.0, 230.0, 50.0)]);
        let blow = PhaseStats::from_frames(&[frame(150.0, 250.0, 90.0)]);
        let suggestion = recommend(&ambient, &blow);
        assert_eq!(suggestion.low_freq_threshold, 201.0);
        assert!(suggestion.warning.is_some());
    }

    #[test]
    fn empty_capture_warns() {
        let suggestion = recommend(&PhaseStats::default(), &PhaseStats::default());
        assert_eq!(
            suggestion.warning,
            Some("No audio frames were captured; check the selected input device.")
        );
    }
}
