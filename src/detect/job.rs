//! Background worker that owns a [`DetectionLoop`] so the caller's thread
//! stays free to render and read input.

use super::scheduler::{CancelToken, DetectionLoop, FrameClock, LoopExit};
use super::status::DetectionStatus;
use crate::audio::{AudioInput, CaptureError};
use crate::config::DetectorConfig;
use crate::log_debug;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

/// Terminal message from the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionEvent {
    BlownOut { ticks: u64 },
    Cancelled { ticks: u64 },
    Exhausted { ticks: u64 },
}

impl DetectionEvent {
    fn from_exit(exit: LoopExit) -> Self {
        match exit {
            LoopExit::BlownOut { ticks } => DetectionEvent::BlownOut { ticks },
            LoopExit::Cancelled { ticks } => DetectionEvent::Cancelled { ticks },
            LoopExit::Exhausted { ticks } => DetectionEvent::Exhausted { ticks },
            LoopExit::Inactive => DetectionEvent::Cancelled { ticks: 0 },
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DetectionEvent::BlownOut { .. } => "blown-out",
            DetectionEvent::Cancelled { .. } => "cancelled",
            DetectionEvent::Exhausted { .. } => "exhausted",
        }
    }
}

/// Handle to a running detection worker. Dropping it cancels and joins.
pub struct DetectionJob {
    events: Receiver<DetectionEvent>,
    handle: Option<thread::JoinHandle<()>>,
    cancel: CancelToken,
}

impl DetectionJob {
    /// Spawn the worker and wait until it has opened the session.
    ///
    /// The session is opened on the worker because device streams are not
    /// always `Send`. A failed open is returned here, synchronously, and the
    /// worker has already exited.
    pub fn start<C>(
        mut input: Box<dyn AudioInput>,
        config: DetectorConfig,
        status: DetectionStatus,
        clock: C,
    ) -> Result<Self, CaptureError>
    where
        C: FrameClock + Send + 'static,
    {
        let (start_tx, start_rx) = bounded::<Result<(), CaptureError>>(1);
        let (event_tx, event_rx) = bounded::<DetectionEvent>(1);
        let cancel = CancelToken::new();
        let worker_cancel = cancel.clone();

        let handle = thread::spawn(move || {
            let mut clock = clock;
            let mut detection = DetectionLoop::new(&config, status);
            if let Err(err) = detection.start(input.as_mut()) {
                let _ = start_tx.send(Err(err));
                return;
            }
            let _ = start_tx.send(Ok(()));
            let exit = detection.run(&mut clock, &worker_cancel);
            let _ = event_tx.send(DetectionEvent::from_exit(exit));
        });

        let mut job = Self {
            events: event_rx,
            handle: Some(handle),
            cancel,
        };
        match start_rx.recv() {
            Ok(Ok(())) => Ok(job),
            Ok(Err(err)) => {
                job.join();
                Err(err)
            }
            Err(_) => {
                job.join();
                Err(CaptureError::DeviceUnavailable(
                    "detection worker exited before the session opened".to_string(),
                ))
            }
        }
    }

    pub fn try_recv(&self) -> Option<DetectionEvent> {
        self.events.try_recv().ok()
    }

    /// Wait up to `timeout` for the worker's terminal event.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<DetectionEvent> {
        match self.events.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| handle.is_finished())
            .unwrap_or(true)
    }

    /// Wait for the worker to exit. Idempotent.
    pub fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log_debug("detection worker panicked");
                tracing::error!("detection worker panicked");
            }
        }
    }
}

impl Drop for DetectionJob {
    fn drop(&mut self) {
        self.cancel();
        self.join();
    }
}
