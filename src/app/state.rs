//! The boundary a cake UI talks to: start listening, poll for the blow-out,
//! relight, and shut down. Detection itself runs on a [`DetectionJob`].

use crate::audio::{AudioInput, CaptureError};
use crate::config::DetectorConfig;
use crate::detect::{
    BlowDetectionState, DetectionEvent, DetectionJob, DetectionStatus, FrameClock, StartOutcome,
};
use crate::log_debug;
use std::time::Duration;

pub struct CandleController {
    config: DetectorConfig,
    status: DetectionStatus,
    job: Option<DetectionJob>,
    notice: Option<String>,
    last_event: Option<DetectionEvent>,
}

impl CandleController {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            status: DetectionStatus::new(),
            job: None,
            notice: None,
            last_event: None,
        }
    }

    /// Shared flags for renderers on other threads.
    pub fn status(&self) -> DetectionStatus {
        self.status.clone()
    }

    /// Begin listening. Ignored while a session is live; after a blow-out
    /// this re-arms with a fresh session. A failed start leaves the
    /// controller idle and stores a user-facing notice.
    pub fn start<C>(
        &mut self,
        input: Box<dyn AudioInput>,
        clock: C,
    ) -> Result<StartOutcome, CaptureError>
    where
        C: FrameClock + Send + 'static,
    {
        if self.status.is_listening() && self.job.as_ref().is_some_and(|job| !job.is_finished()) {
            log_debug("start ignored: already listening");
            return Ok(StartOutcome::AlreadyListening);
        }
        self.retire_job();
        self.notice = None;
        self.last_event = None;

        match DetectionJob::start(input, self.config.clone(), self.status.clone(), clock) {
            Ok(job) => {
                self.job = Some(job);
                Ok(StartOutcome::Started)
            }
            Err(err) => {
                self.notice = Some(err.user_message());
                Err(err)
            }
        }
    }

    /// Non-blocking check for the worker's terminal event.
    pub fn poll(&mut self) -> Option<DetectionEvent> {
        let event = self.job.as_ref().and_then(DetectionJob::try_recv)?;
        self.finish(event);
        Some(event)
    }

    /// Block up to `timeout` for the worker's terminal event.
    pub fn wait(&mut self, timeout: Duration) -> Option<DetectionEvent> {
        let event = self
            .job
            .as_ref()
            .and_then(|job| job.recv_timeout(timeout))?;
        self.finish(event);
        Some(event)
    }

    /// Most recent terminal event, kept after the worker is retired.
    pub fn last_event(&self) -> Option<DetectionEvent> {
        self.last_event
    }

    pub fn is_listening(&self) -> bool {
        self.status.is_listening()
    }

    pub fn is_blown_out(&self) -> bool {
        self.status.is_blown_out()
    }

    pub fn status_label(&self) -> &'static str {
        self.status.label()
    }

    /// Message to show after a failed start; cleared once taken.
    pub fn take_notice(&mut self) -> Option<String> {
        self.notice.take()
    }

    /// Stop listening, keep the candles as they are.
    pub fn cancel(&mut self) {
        if let Some(job) = self.job.as_ref() {
            job.cancel();
        }
        self.retire_job();
    }

    /// Stop any session and light the candles again (phase `Idle`).
    pub fn relight(&mut self) {
        self.cancel();
        self.last_event = None;
        self.status.publish(&BlowDetectionState::default());
        tracing::info!("candles relit");
    }

    /// Release everything. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if self.job.is_some() {
            log_debug("candle controller shutting down");
        }
        self.cancel();
    }

    fn finish(&mut self, event: DetectionEvent) {
        self.last_event = Some(event);
        if let Some(mut job) = self.job.take() {
            job.join();
        }
        tracing::debug!(event = event.label(), "detection finished");
    }

    fn retire_job(&mut self) {
        if let Some(mut job) = self.job.take() {
            job.cancel();
            job.join();
            if let Some(event) = job.try_recv() {
                self.last_event = Some(event);
            }
        }
    }
}

impl Drop for CandleController {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{AnalyserSettings, AudioSession, ReplayInput};
    use crate::detect::{IntervalClock, UnpacedClock};

    struct BlockedMic;

    impl AudioInput for BlockedMic {
        fn open(
            &mut self,
            _settings: &AnalyserSettings,
        ) -> Result<Box<dyn AudioSession>, CaptureError> {
            Err(CaptureError::PermissionDenied(
                "build input stream: access denied".to_string(),
            ))
        }
    }

    fn loud_noise(seconds: usize) -> Vec<f32> {
        let mut seed: u32 = 0x1234_5678;
        (0..48_000 * seconds)
            .map(|_| {
                seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                ((seed >> 8) as f32 / (1u32 << 24) as f32 * 2.0 - 1.0) * 0.9
            })
            .collect()
    }

    fn replay_config(input: &ReplayInput) -> DetectorConfig {
        DetectorConfig {
            max_ticks: Some(input.duration_ticks() as u64),
            ..DetectorConfig::default()
        }
    }

    #[test]
    fn starts_idle_with_enable_label() {
        let controller = CandleController::new(DetectorConfig::default());
        assert!(!controller.is_listening());
        assert!(!controller.is_blown_out());
        assert_eq!(controller.status_label(), "ENABLE MIC");
    }

    #[test]
    fn noise_blows_out_candles_then_relight() {
        let input = ReplayInput::new(loud_noise(2), 48_000, 60);
        let mut controller = CandleController::new(replay_config(&input));
        let outcome = controller
            .start(Box::new(input), UnpacedClock)
            .expect("replay starts");
        assert_eq!(outcome, StartOutcome::Started);

        let event = controller.wait(Duration::from_secs(10));
        assert!(matches!(event, Some(DetectionEvent::BlownOut { .. })));
        assert!(controller.is_blown_out());
        assert!(!controller.is_listening());
        assert_eq!(controller.status_label(), "WISH GRANTED");

        controller.relight();
        assert!(!controller.is_blown_out());
        assert_eq!(controller.status_label(), "ENABLE MIC");
        assert_eq!(controller.last_event(), None);
    }

    #[test]
    fn silence_exhausts_and_keeps_candles_lit() {
        let input = ReplayInput::new(vec![0.0; 48_000], 48_000, 60);
        let mut controller = CandleController::new(replay_config(&input));
        controller
            .start(Box::new(input), UnpacedClock)
            .expect("replay starts");
        let event = controller.wait(Duration::from_secs(10));
        assert!(matches!(event, Some(DetectionEvent::Exhausted { .. })));
        assert!(!controller.is_blown_out());
        assert!(!controller.is_listening());
    }

    #[test]
    fn denied_start_reports_notice_and_stays_idle() {
        let mut controller = CandleController::new(DetectorConfig::default());
        let err = controller
            .start(Box::new(BlockedMic), UnpacedClock)
            .expect_err("blocked mic must fail");
        assert!(matches!(err, CaptureError::PermissionDenied(_)));
        assert!(!controller.is_listening());
        assert!(!controller.is_blown_out());
        assert_eq!(controller.status_label(), "ENABLE MIC");
        let notice = controller.take_notice().expect("notice after failed start");
        assert!(notice.contains("allow permissions"));
        assert!(controller.take_notice().is_none());
    }

    #[test]
    fn failed_restart_keeps_candles_blown_out() {
        let input = ReplayInput::new(loud_noise(2), 48_000, 60);
        let mut controller = CandleController::new(replay_config(&input));
        controller
            .start(Box::new(input), UnpacedClock)
            .expect("replay starts");
        let event = controller.wait(Duration::from_secs(10));
        assert!(matches!(event, Some(DetectionEvent::BlownOut { .. })));

        let err = controller
            .start(Box::new(BlockedMic), UnpacedClock)
            .expect_err("blocked mic must fail");
        assert!(err.is_permission());
        assert!(controller.is_blown_out());
        assert!(!controller.is_listening());
        assert_eq!(controller.status_label(), "WISH GRANTED");
        assert!(controller.take_notice().is_some());
    }

    #[test]
    fn start_while_listening_is_ignored() {
        let input = ReplayInput::new(vec![0.0; 48_000], 48_000, 60);
        let mut controller = CandleController::new(replay_config(&input));
        let first = controller
            .start(Box::new(input), IntervalClock::new(1))
            .expect("replay starts");
        assert_eq!(first, StartOutcome::Started);
        assert!(controller.is_listening());

        let second = controller
            .start(Box::new(BlockedMic), IntervalClock::new(1))
            .expect("second start is a no-op");
        assert_eq!(second, StartOutcome::AlreadyListening);
        assert!(controller.is_listening());
        assert!(controller.take_notice().is_none());

        controller.cancel();
        assert!(!controller.is_listening());
        assert!(matches!(
            controller.last_event(),
            Some(DetectionEvent::Cancelled { .. })
        ));
    }

    #[test]
    fn shutdown_is_idempotent() {
        let mut controller = CandleController::new(DetectorConfig::default());
        controller.shutdown();
        controller.shutdown();
        assert!(controller.take_notice().is_none());
    }
}
