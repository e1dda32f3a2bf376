//! Host-facing layer: debug logging and the candle controller a UI drives.

mod logging;
mod state;

pub use logging::{crash_log_path, init_logging, log_debug, log_file_path, log_panic};
pub use state::CandleController;
