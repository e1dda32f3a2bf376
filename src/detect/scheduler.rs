//! Frame-paced detection loop.
//!
//! One [`DetectionLoop`] owns at most one capture session. Each tick reads
//! both snapshots, extracts features, classifies, and either asks the clock
//! for the next frame or (on confirmation) closes the session and stops.
//! Ticks never overlap: the loop is a plain sequence on a single thread and
//! the only wait is between ticks, where cancellation wakes it immediately.

use super::classifier::{BlowClassifier, BlowDetectionState, DetectorPhase, Verdict};
use super::features::{FeatureExtractor, FeatureFrame};
use super::status::DetectionStatus;
use crate::audio::{AnalyserSettings, AudioInput, AudioSession, CaptureError, BYTE_MIDPOINT};
use crate::config::DetectorConfig;
use crate::log_debug;
use crossbeam_channel::{bounded, select, tick, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Cooperative cancellation shared between the loop and whoever stops it.
#[derive(Clone, Debug)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    wake_tx: Sender<()>,
    wake_rx: Receiver<()>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        let (wake_tx, wake_rx) = bounded(1);
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            wake_tx,
            wake_rx,
        }
    }

    /// Idempotent; wakes a clock blocked in `wait_next_frame`.
    pub fn cancel(&self) {
        if !self.flag.swap(true, Ordering::SeqCst) {
            let _ = self.wake_tx.try_send(());
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    fn wake_receiver(&self) -> &Receiver<()> {
        &self.wake_rx
    }
}

/// Source of "next display frame" opportunities.
pub trait FrameClock {
    /// Block until the next frame. Returns `false` if cancelled first.
    fn wait_next_frame(&mut self, cancel: &CancelToken) -> bool;
}

/// Fixed-rate clock standing in for the display refresh.
pub struct IntervalClock {
    ticker: Receiver<Instant>,
    period: Duration,
}

impl IntervalClock {
    pub fn new(ticks_per_second: u32) -> Self {
        let period = Duration::from_secs_f64(1.0 / f64::from(ticks_per_second.max(1)));
        Self {
            ticker: tick(period),
            period,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

impl FrameClock for IntervalClock {
    fn wait_next_frame(&mut self, cancel: &CancelToken) -> bool {
        if cancel.is_cancelled() {
            return false;
        }
        select! {
            recv(self.ticker) -> _ => !cancel.is_cancelled(),
            recv(cancel.wake_receiver()) -> _ => false,
        }
    }
}

/// Runs frames back to back; used for offline replay and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnpacedClock;

impl FrameClock for UnpacedClock {
    fn wait_next_frame(&mut self, cancel: &CancelToken) -> bool {
        !cancel.is_cancelled()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    /// A session was already live; nothing changed.
    AlreadyListening,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// No session; the tick did nothing.
    Inactive,
    Listening(Verdict),
    /// This tick confirmed the blow and released the session.
    BlownOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    BlownOut { ticks: u64 },
    Cancelled { ticks: u64 },
    /// The configured tick budget ran out first.
    Exhausted { ticks: u64 },
    /// `run` was called without an open session.
    Inactive,
}

pub struct DetectionLoop {
    settings: AnalyserSettings,
    extractor: FeatureExtractor,
    classifier: BlowClassifier,
    status: DetectionStatus,
    session: Option<Box<dyn AudioSession>>,
    frequency: Vec<u8>,
    time_domain: Vec<u8>,
    last_frame: FeatureFrame,
    ticks: u64,
    max_ticks: Option<u64>,
}

impl DetectionLoop {
    pub fn new(config: &DetectorConfig, status: DetectionStatus) -> Self {
        let policy = config.build_policy();
        let debounce = config.effective_debounce(policy.as_ref());
        Self {
            settings: config.analyser,
            extractor: FeatureExtractor::new(config.low_freq_fraction),
            classifier: BlowClassifier::new(policy, debounce),
            status,
            session: None,
            frequency: Vec::new(),
            time_domain: Vec::new(),
            last_frame: FeatureFrame::default(),
            ticks: 0,
            max_ticks: config.max_ticks,
        }
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn state(&self) -> BlowDetectionState {
        self.classifier.state()
    }

    pub fn phase(&self) -> DetectorPhase {
        self.classifier.phase()
    }

    pub fn last_frame(&self) -> FeatureFrame {
        self.last_frame
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn status(&self) -> &DetectionStatus {
        &self.status
    }

    /// Open a session and arm the classifier. A second start while a session
    /// is live is a no-op. On failure the loop stays idle and not listening,
    /// and the blown-out flag already published is left alone.
    pub fn start(&mut self, input: &mut dyn AudioInput) -> Result<StartOutcome, CaptureError> {
        if self.session.is_some() {
            log_debug("detection start ignored: session already live");
            return Ok(StartOutcome::AlreadyListening);
        }

        let session = match input.open(&self.settings) {
            Ok(session) => session,
            Err(err) => {
                self.classifier.disarm();
                self.status.clear_listening();
                log_debug(&format!("detection start failed: {err}"));
                tracing::warn!(kind = err.label(), error = %err, "capture session failed to open");
                return Err(err);
            }
        };

        self.frequency = vec![0; session.frequency_bin_count()];
        self.time_domain = vec![BYTE_MIDPOINT; session.fft_size()];
        self.session = Some(session);
        self.ticks = 0;
        self.last_frame = FeatureFrame::default();
        self.classifier.arm();
        self.status.publish(&self.classifier.state());
        tracing::info!(
            input = %input.describe(),
            policy = self.classifier.policy_name(),
            required_frames = self.classifier.debounce().required_frames,
            "listening for candle blow"
        );
        Ok(StartOutcome::Started)
    }

    /// Run one extract + classify step.
    pub fn tick(&mut self) -> TickOutcome {
        let Some(session) = self.session.as_mut() else {
            return TickOutcome::Inactive;
        };
        session.frequency_snapshot(&mut self.frequency);
        session.time_domain_snapshot(&mut self.time_domain);

        let frame = self.extractor.extract(&self.frequency, &self.time_domain);
        let verdict = self.classifier.observe(&frame);
        self.ticks += 1;
        self.last_frame = frame;
        self.status.set_level(frame.low_frequency_average);
        tracing::trace!(
            tick = self.ticks,
            low_avg = frame.low_frequency_average,
            low_peak = frame.low_frequency_peak,
            time_peak = frame.time_domain_peak,
            time_avg = frame.time_domain_average,
            blow = verdict.instantaneous,
            sustained = verdict.sustained_count,
            "detection tick"
        );

        if verdict.confirmed {
            self.release_session();
            self.status.publish(&self.classifier.state());
            log_debug(&format!("candles blown out after {} ticks", self.ticks));
            tracing::info!(ticks = self.ticks, "candles blown out");
            return TickOutcome::BlownOut;
        }
        TickOutcome::Listening(verdict)
    }

    /// Drive ticks until confirmation, cancellation or the tick budget.
    /// Every exit path leaves the session closed.
    pub fn run(&mut self, clock: &mut dyn FrameClock, cancel: &CancelToken) -> LoopExit {
        if self.session.is_none() {
            return LoopExit::Inactive;
        }
        loop {
            if cancel.is_cancelled() {
                self.stop();
                return LoopExit::Cancelled { ticks: self.ticks };
            }
            match self.tick() {
                TickOutcome::BlownOut => return LoopExit::BlownOut { ticks: self.ticks },
                TickOutcome::Inactive => return LoopExit::Inactive,
                TickOutcome::Listening(_) => {}
            }
            if self.max_ticks.is_some_and(|max| self.ticks >= max) {
                self.stop();
                return LoopExit::Exhausted { ticks: self.ticks };
            }
            if !clock.wait_next_frame(cancel) {
                self.stop();
                return LoopExit::Cancelled { ticks: self.ticks };
            }
        }
    }

    /// Close any session and stop listening. Idempotent; keeps the
    /// blown-out flag so the scene stays dark.
    pub fn stop(&mut self) {
        self.release_session();
        self.classifier.disarm();
        self.status.publish(&self.classifier.state());
    }

    /// Stop, then relight: back to `Idle` with `is_blown_out = false`.
    pub fn reset(&mut self) {
        self.stop();
        self.classifier.reset();
        self.status.publish(&self.classifier.state());
    }

    fn release_session(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.close();
            log_debug(&format!("capture session released after {} ticks", self.ticks));
            tracing::debug!(ticks = self.ticks, "capture session released");
        }
    }
}

impl Drop for DetectionLoop {
    fn drop(&mut self) {
        self.release_session();
    }
}
