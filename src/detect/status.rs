use super::classifier::BlowDetectionState;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

pub const IDLE_LABEL: &str = "ENABLE MIC";
pub const LISTENING_LABEL: &str = "LISTENING...";
pub const BLOWN_OUT_LABEL: &str = "WISH GRANTED";

/// Flags the rendering side reads while detection runs on its own thread.
/// Clones share the same state.
#[derive(Clone, Debug, Default)]
pub struct DetectionStatus {
    listening: Arc<AtomicBool>,
    blown_out: Arc<AtomicBool>,
    level_bits: Arc<AtomicU32>,
}

impl DetectionStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::Acquire)
    }

    pub fn is_blown_out(&self) -> bool {
        self.blown_out.load(Ordering::Acquire)
    }

    /// Latest low-frequency average (0..=255), for meters.
    pub fn level(&self) -> f32 {
        f32::from_bits(self.level_bits.load(Ordering::Relaxed))
    }

    pub fn set_level(&self, level: f32) {
        self.level_bits.store(level.to_bits(), Ordering::Relaxed);
    }

    pub(crate) fn publish(&self, state: &BlowDetectionState) {
        self.blown_out.store(state.is_blown_out, Ordering::Release);
        self.listening.store(state.is_listening, Ordering::Release);
        if !state.is_listening {
            self.set_level(0.0);
        }
    }

    /// Drop the listening flag without touching the blown-out flag.
    pub(crate) fn clear_listening(&self) {
        self.listening.store(false, Ordering::Release);
        self.set_level(0.0);
    }

    /// Short label for status lines.
    pub fn label(&self) -> &'static str {
        if self.is_blown_out() {
            BLOWN_OUT_LABEL
        } else if self.is_listening() {
            LISTENING_LABEL
        } else {
            IDLE_LABEL
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_not_listening() {
        let status = DetectionStatus::new();
        assert!(!status.is_listening());
        assert!(!status.is_blown_out());
        assert_eq!(status.level(), 0.0);
        assert_eq!(status.label(), "ENABLE MIC");
    }

    #[test]
    fn clones_observe_published_state() {
        let status = DetectionStatus::new();
        let observer = status.clone();
        status.set_level(42.0);
        status.publish(&BlowDetectionState {
            sustained_count: 1,
            is_listening: true,
            is_blown_out: false,
        });
        assert!(observer.is_listening());
        assert_eq!(observer.level(), 42.0);
        assert_eq!(observer.label(), "LISTENING...");

        status.publish(&BlowDetectionState {
            sustained_count: 3,
            is_listening: false,
            is_blown_out: true,
        });
        assert!(observer.is_blown_out());
        assert_eq!(observer.level(), 0.0);
        assert_eq!(observer.label(), "WISH GRANTED");
    }

    #[test]
    fn clear_listening_keeps_blown_out() {
        let status = DetectionStatus::new();
        status.publish(&BlowDetectionState {
            sustained_count: 0,
            is_listening: true,
            is_blown_out: true,
        });
        status.set_level(90.0);
        status.clear_listening();
        assert!(!status.is_listening());
        assert!(status.is_blown_out());
        assert_eq!(status.level(), 0.0);
        assert_eq!(status.label(), "WISH GRANTED");
    }
}
