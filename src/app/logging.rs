use crate::config::AppConfig;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::panic::PanicHookInfo;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use std::{env, thread};

const DEBUG_LOG_CAP: u64 = 5 * 1024 * 1024;
const CRASH_LOG_CAP: u64 = 256 * 1024;

static ENABLED: AtomicBool = AtomicBool::new(false);
static SINK: OnceLock<Mutex<Option<LogSink>>> = OnceLock::new();
static STARTED: OnceLock<Instant> = OnceLock::new();

/// Debug log location. The previous generation is kept as `<path>.1`.
pub fn log_file_path() -> PathBuf {
    env::temp_dir().join("blowout_debug.log")
}

/// Crash log location (panic location only, never audio or payload data).
pub fn crash_log_path() -> PathBuf {
    env::temp_dir().join("blowout_crash.log")
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".1");
    PathBuf::from(name)
}

/// Moves `path` to its `.1` backup once it has grown past `cap`.
fn rotate_if_over(path: &Path, cap: u64, incoming: u64) -> bool {
    let current = fs::metadata(path).map(|meta| meta.len()).unwrap_or(0);
    if current.saturating_add(incoming) <= cap {
        return false;
    }
    fs::rename(path, backup_path(path)).is_ok()
}

fn open_append(path: &Path) -> Option<File> {
    OpenOptions::new().create(true).append(true).open(path).ok()
}

/// Size-capped append-only log file.
struct LogSink {
    path: PathBuf,
    file: File,
    cap: u64,
    written: u64,
}

impl LogSink {
    fn open(path: PathBuf, cap: u64) -> Option<Self> {
        rotate_if_over(&path, cap, 0);
        let written = fs::metadata(&path).map(|meta| meta.len()).unwrap_or(0);
        let file = open_append(&path)?;
        Some(Self {
            path,
            file,
            cap,
            written,
        })
    }

    fn write_line(&mut self, line: &str) {
        let len = line.len() as u64;
        if self.written.saturating_add(len) > self.cap && rotate_if_over(&self.path, self.cap, len)
        {
            if let Some(file) = open_append(&self.path) {
                self.file = file;
                self.written = 0;
            }
        }
        if self.file.write_all(line.as_bytes()).is_ok() {
            self.written = self.written.saturating_add(len);
        }
    }
}

fn sink() -> &'static Mutex<Option<LogSink>> {
    SINK.get_or_init(|| Mutex::new(None))
}

fn set_enabled(enabled: bool) {
    STARTED.get_or_init(Instant::now);
    ENABLED.store(enabled, Ordering::Relaxed);
    let mut guard = sink().lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    *guard = if enabled {
        LogSink::open(log_file_path(), DEBUG_LOG_CAP)
    } else {
        None
    };
}

/// `[unix-seconds +elapsed-ms thread]` so detection ticks can be lined up
/// against each other without a tracing reader.
fn line_prefix() -> String {
    let unix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let elapsed = STARTED.get_or_init(Instant::now).elapsed().as_millis();
    let current = thread::current();
    let name = current.name().unwrap_or("worker");
    format!("[{unix} +{elapsed}ms {name}]")
}

/// Turn the debug file log on or off from the parsed CLI flags.
pub fn init_logging(config: &AppConfig) {
    set_enabled(config.logging_enabled());
}

/// Append a line to the debug log. No-op unless logging was enabled, so
/// status output on stdout is never interleaved with diagnostics.
pub fn log_debug(msg: &str) {
    if !ENABLED.load(Ordering::Relaxed) {
        return;
    }
    let line = format!("{} {msg}\n", line_prefix());
    let mut guard = sink().lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(sink) = guard.as_mut() {
        sink.write_line(&line);
    }
}

/// Panic hook body: records where and on which thread, not what it carried.
pub fn log_panic(info: &PanicHookInfo<'_>) {
    if !ENABLED.load(Ordering::Relaxed) {
        return;
    }
    let location = info
        .location()
        .map(|loc| format!("{}:{}", loc.file(), loc.line()))
        .unwrap_or_else(|| "unknown location".to_string());
    let line = format!(
        "{} panic at {location} (blowout v{})\n",
        line_prefix(),
        env!("CARGO_PKG_VERSION")
    );
    if let Some(mut crash) = LogSink::open(crash_log_path(), CRASH_LOG_CAP) {
        crash.write_line(&line);
    }
}
