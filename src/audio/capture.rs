//! Capture adapter contract: an [`AudioInput`] opens one [`AudioSession`],
//! the session hands out snapshots of its analysis node until closed.

use super::AnalyserSettings;
use thiserror::Error;

/// Why a microphone session could not be opened.
///
/// Both variants are recoverable: the caller returns to "not listening" and
/// shows [`CaptureError::user_message`]. A new attempt needs a new user action.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error("microphone permission denied: {0}")]
    PermissionDenied(String),
    #[error("microphone unavailable: {0}")]
    DeviceUnavailable(String),
}

impl CaptureError {
    pub fn is_permission(&self) -> bool {
        matches!(self, CaptureError::PermissionDenied(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            CaptureError::PermissionDenied(_) => "permission_denied",
            CaptureError::DeviceUnavailable(_) => "device_unavailable",
        }
    }

    /// Notification text for a human, with a platform-specific pointer.
    pub fn user_message(&self) -> String {
        let lead = match self {
            CaptureError::PermissionDenied(_) => {
                "Unable to access microphone. Please allow permissions to blow out candles."
            }
            CaptureError::DeviceUnavailable(_) => {
                "No usable microphone found. Connect one to blow out candles."
            }
        };
        format!("{lead} ({self}) {}", mic_permission_hint())
    }

    /// Map a backend error onto the two outcomes callers care about.
    pub(crate) fn classify(context: &str, err: impl std::fmt::Display) -> Self {
        let detail = format!("{context}: {err}");
        let lowered = detail.to_lowercase();
        let permission = ["permission", "denied", "not authorized", "not permitted"]
            .iter()
            .any(|needle| lowered.contains(needle));
        if permission {
            CaptureError::PermissionDenied(detail)
        } else {
            CaptureError::DeviceUnavailable(detail)
        }
    }
}

pub(crate) fn mic_permission_hint() -> &'static str {
    #[cfg(target_os = "macos")]
    {
        "macOS: System Settings > Privacy & Security > Microphone (enable your terminal)."
    }
    #[cfg(target_os = "linux")]
    {
        "Linux: check PipeWire/PulseAudio permissions and ensure the device is not muted."
    }
    #[cfg(target_os = "windows")]
    {
        "Windows: Settings > Privacy & Security > Microphone (allow access for your terminal)."
    }
    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        "Check OS microphone permissions."
    }
}

/// Source of audio sessions. Implementations are moved onto the detection
/// worker thread, which opens the session there.
pub trait AudioInput: Send {
    fn open(&mut self, settings: &AnalyserSettings) -> Result<Box<dyn AudioSession>, CaptureError>;

    fn describe(&self) -> String {
        "audio input".to_string()
    }
}

/// One open capture: the analysis node plus whatever keeps the hardware alive.
///
/// Snapshot reads are synchronous and return the node's latest state. After
/// [`AudioSession::close`] they report silence (zero spectrum, midpoint
/// waveform) instead of failing.
pub trait AudioSession {
    fn fft_size(&self) -> usize;

    fn frequency_bin_count(&self) -> usize {
        self.fft_size() / 2
    }

    fn frequency_snapshot(&mut self, out: &mut [u8]);

    fn time_domain_snapshot(&mut self, out: &mut [u8]);

    /// Release the hardware stream. Safe to call any number of times.
    fn close(&mut self);

    fn is_closed(&self) -> bool;
}

/// Fill buffers the way a closed session reads.
pub(crate) fn write_silence(frequency: Option<&mut [u8]>, time_domain: Option<&mut [u8]>) {
    if let Some(out) = frequency {
        out.fill(0);
    }
    if let Some(out) = time_domain {
        out.fill(super::BYTE_MIDPOINT);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_detects_permission_wording() {
        let err = CaptureError::classify("build stream", "Access denied by the system");
        assert!(err.is_permission());
        assert_eq!(err.label(), "permission_denied");

        let err = CaptureError::classify("open device", "The requested device is no longer available");
        assert!(!err.is_permission());
        assert_eq!(err.label(), "device_unavailable");
    }

    #[test]
    fn user_message_mentions_permissions() {
        let err = CaptureError::PermissionDenied("blocked".to_string());
        let message = err.user_message();
        assert!(message.contains("allow permissions"));
        assert!(message.contains("blocked"));
    }

    #[test]
    fn silence_fill_matches_closed_session_contract() {
        let mut freq = [9u8; 4];
        let mut time = [9u8; 4];
        write_silence(Some(&mut freq), Some(&mut time));
        assert_eq!(freq, [0; 4]);
        assert_eq!(time, [128; 4]);
    }
}
