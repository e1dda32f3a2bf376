pub mod app;
pub mod audio;
pub mod config;
pub mod detect;
mod lock;
pub mod telemetry;

pub(crate) use lock::lock_or_recover;
pub use app::{crash_log_path, init_logging, log_debug, log_file_path, log_panic, CandleController};
pub use audio::CaptureError;
pub use detect::{DetectionEvent, DetectionStatus};
