//! Opt-in structured traces. Session lifecycle and verdicts are emitted at
//! info/debug; every detection tick's features at trace (`--log-timings`).

use crate::config::AppConfig;
use std::env;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing::Level;
use tracing_subscriber::fmt::time::UtcTime;

static TRACE_FILE: OnceLock<Option<PathBuf>> = OnceLock::new();

/// JSON-lines trace destination; `BLOWOUT_TRACE_LOG` overrides the temp-dir default.
pub fn tracing_log_path() -> PathBuf {
    env::var_os("BLOWOUT_TRACE_LOG")
        .map(PathBuf::from)
        .unwrap_or_else(|| env::temp_dir().join("blowout_trace.jsonl"))
}

fn trace_level(config: &AppConfig) -> Level {
    if config.log_timings {
        Level::TRACE
    } else {
        Level::DEBUG
    }
}

/// Install the global JSON subscriber once. Returns the trace file when
/// tracing is active.
pub fn init_tracing(config: &AppConfig) -> Option<PathBuf> {
    if !config.logging_enabled() {
        return None;
    }
    TRACE_FILE.get_or_init(|| install(config)).clone()
}

fn install(config: &AppConfig) -> Option<PathBuf> {
    let path = tracing_log_path();
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .ok()?;
    let subscriber = tracing_subscriber::fmt()
        .json()
        .with_max_level(trace_level(config))
        .with_timer(UtcTime::rfc_3339())
        .with_thread_names(true)
        .with_writer(file)
        .with_current_span(false)
        .with_span_list(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok()?;
    Some(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn disabled_logging_installs_nothing() {
        let config = AppConfig::parse_from(["test-app"]);
        assert_eq!(init_tracing(&config), None);
    }

    #[test]
    fn log_timings_raises_level_to_trace() {
        let config = AppConfig::parse_from(["test-app", "--log-timings"]);
        assert_eq!(trace_level(&config), Level::TRACE);
        let config = AppConfig::parse_from(["test-app", "--logs"]);
        assert_eq!(trace_level(&config), Level::DEBUG);
    }
}
