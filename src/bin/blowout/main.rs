//! Blowout: listen to the microphone and blow out the birthday candles.

mod calibrate;
mod meter;
mod status;

use anyhow::{bail, Result};
use blowout::audio::{MicInput, ReplayInput};
use blowout::config::AppConfig;
use blowout::detect::{DetectionEvent, UnpacedClock};
use blowout::telemetry::init_tracing;
use blowout::{init_logging, log_debug, log_file_path, log_panic, CandleController};
use clap::Parser;
use crossbeam_channel::{bounded, select, Receiver};
use crossterm::cursor::MoveToColumn;
use crossterm::execute;
use crossterm::terminal::{Clear, ClearType};
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::Path;
use std::time::Duration;
use std::{env, panic, thread};

use crate::meter::format_live_meter;
use crate::status::{StatusLine, StatusReporter};

const POLL_INTERVAL_MS: u64 = 80;
/// Upper bound on an unpaced replay; long files still finish well inside it.
const REPLAY_TIMEOUT: Duration = Duration::from_secs(600);

fn main() -> Result<()> {
    let config = AppConfig::parse();
    if config.list_input_devices {
        list_input_devices();
        return Ok(());
    }

    config.validate()?;
    init_logging(&config);
    let trace_file = init_tracing(&config);
    install_panic_hook();
    log_debug("=== Blowout Started ===");
    log_debug(&format!("Log file: {:?}", log_file_path()));
    if let Some(path) = trace_file {
        log_debug(&format!("Trace file: {path:?}"));
    }
    log_debug(&format!(
        "policy={} frame_rate={} fft={}",
        config.policy.label(),
        config.frame_rate,
        config.fft_size
    ));

    if config.calibrate {
        return calibrate::run(&config);
    }
    if let Some(path) = config.replay_pcm.clone() {
        return run_replay(&config, &path);
    }
    run_live(&config)
}

fn install_panic_hook() {
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        log_panic(info);
        previous(info);
    }));
}

fn list_input_devices() {
    // BLOWOUT_TEST_DEVICES stands in for real hardware in tests.
    let devices = if let Ok(raw) = env::var("BLOWOUT_TEST_DEVICES") {
        raw.split(',')
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect()
    } else {
        MicInput::list_devices().unwrap_or_else(|err| {
            eprintln!("Failed to list audio input devices: {err}");
            Vec::new()
        })
    };

    if devices.is_empty() {
        println!("No audio input devices detected.");
    } else {
        println!("Available audio input devices:");
        for name in devices {
            println!("  - {name}");
        }
    }
}

fn run_replay(config: &AppConfig, path: &Path) -> Result<()> {
    let mut detector = config.detector_config();
    let input =
        ReplayInput::from_f32le_file(path, config.replay_sample_rate, detector.ticks_per_second)?;
    detector.max_ticks = Some(input.duration_ticks() as u64);
    log_debug(&format!(
        "replay: {} ({} ticks)",
        path.display(),
        input.duration_ticks()
    ));

    let mut controller = CandleController::new(detector);
    let mut reporter = StatusReporter::new(config.json_status);
    if let Err(err) = controller.start(Box::new(input), UnpacedClock) {
        if let Some(notice) = controller.take_notice() {
            eprintln!("{notice}");
        }
        return Err(err.into());
    }
    reporter.emit(StatusLine::listening());

    let Some(event) = controller.wait(REPLAY_TIMEOUT) else {
        controller.shutdown();
        bail!("replay did not finish within {}s", REPLAY_TIMEOUT.as_secs());
    };
    reporter.emit(StatusLine::snapshot(&controller).with_event(event));
    if !config.json_status {
        match event {
            DetectionEvent::BlownOut { .. } => println!("result: candles blown out"),
            _ => println!("result: candles still lit"),
        }
    }
    Ok(())
}

/// Lines typed on stdin, each treated as a bare Enter press.
struct EnterKeys {
    rx: Receiver<()>,
    open: bool,
}

impl EnterKeys {
    fn spawn() -> Self {
        let (tx, rx) = bounded(4);
        thread::spawn(move || {
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                if line.is_err() || tx.send(()).is_err() {
                    break;
                }
            }
        });
        Self { rx, open: true }
    }

    /// Wait up to `timeout` for Enter. A closed stdin never presses.
    fn pressed_within(&mut self, timeout: Duration) -> bool {
        if !self.open {
            thread::sleep(timeout);
            return false;
        }
        select! {
            recv(self.rx) -> msg => {
                if msg.is_err() {
                    self.open = false;
                }
                msg.is_ok()
            }
            default(timeout) => false,
        }
    }

    /// Block until Enter. Returns `false` once stdin is closed.
    fn wait(&mut self) -> bool {
        if self.open && self.rx.recv().is_ok() {
            return true;
        }
        self.open = false;
        false
    }
}

enum RoundEnd {
    BlownOut,
    Stopped,
}

fn run_live(config: &AppConfig) -> Result<()> {
    let detector = config.detector_config();
    let mut controller = CandleController::new(detector.clone());
    let mut reporter = StatusReporter::new(config.json_status);
    let mut enter = EnterKeys::spawn();
    let show_meter = !config.json_status && io::stderr().is_terminal();
    reporter.emit(StatusLine::snapshot(&controller));

    for round in 1..=config.rounds {
        let input = MicInput::new(config.input_device.as_deref());
        if let Err(err) = controller.start(Box::new(input), detector.frame_clock()) {
            reporter.emit(StatusLine::snapshot(&controller));
            if let Some(notice) = controller.take_notice() {
                eprintln!("{notice}");
            }
            return Err(err.into());
        }
        log_debug(&format!("round {round}/{} listening", config.rounds));
        reporter.emit(StatusLine::listening());
        if !config.json_status {
            println!("Blow out the candles! (press Enter to stop)");
        }

        match listen(&mut controller, &mut reporter, &mut enter, show_meter, config) {
            RoundEnd::Stopped => break,
            RoundEnd::BlownOut if round < config.rounds => {
                if !config.json_status {
                    println!("Make a wish! Press Enter to relight the candles.");
                }
                if !enter.wait() {
                    break;
                }
                controller.relight();
                reporter.emit(StatusLine::snapshot(&controller));
            }
            RoundEnd::BlownOut => {}
        }
    }

    controller.shutdown();
    Ok(())
}

fn listen(
    controller: &mut CandleController,
    reporter: &mut StatusReporter,
    enter: &mut EnterKeys,
    show_meter: bool,
    config: &AppConfig,
) -> RoundEnd {
    let status = controller.status();
    loop {
        if enter.pressed_within(Duration::from_millis(POLL_INTERVAL_MS)) {
            controller.cancel();
            clear_meter(show_meter);
            reporter.emit(StatusLine::snapshot(controller));
            return RoundEnd::Stopped;
        }
        if let Some(event) = controller.poll() {
            clear_meter(show_meter);
            reporter.emit(StatusLine::snapshot(controller).with_event(event));
            return match event {
                DetectionEvent::BlownOut { .. } => RoundEnd::BlownOut,
                _ => RoundEnd::Stopped,
            };
        }
        if show_meter {
            let mut stderr = io::stderr().lock();
            let _ = write!(
                stderr,
                "\r{}",
                format_live_meter(status.level(), config.low_freq_threshold)
            );
            let _ = stderr.flush();
        }
    }
}

fn clear_meter(show_meter: bool) {
    if show_meter {
        let mut stderr = io::stderr();
        let _ = execute!(stderr, MoveToColumn(0), Clear(ClearType::CurrentLine));
    }
}
