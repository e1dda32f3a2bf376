//! Status lines written to stdout while detection runs.

use blowout::detect::{DetectionEvent, LISTENING_LABEL};
use blowout::CandleController;
use serde::Serialize;
use std::io::{self, Write};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct StatusLine {
    pub(crate) listening: bool,
    pub(crate) blown_out: bool,
    pub(crate) label: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) event: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) ticks: Option<u64>,
}

impl StatusLine {
    pub(crate) fn snapshot(controller: &CandleController) -> Self {
        Self {
            listening: controller.is_listening(),
            blown_out: controller.is_blown_out(),
            label: controller.status_label(),
            event: None,
            ticks: None,
        }
    }

    /// The state right after a successful start. The worker may already be
    /// done by the time a snapshot is taken, so this is reported explicitly.
    pub(crate) fn listening() -> Self {
        Self {
            listening: true,
            blown_out: false,
            label: LISTENING_LABEL,
            event: None,
            ticks: None,
        }
    }

    pub(crate) fn with_event(mut self, event: DetectionEvent) -> Self {
        let ticks = match event {
            DetectionEvent::BlownOut { ticks }
            | DetectionEvent::Cancelled { ticks }
            | DetectionEvent::Exhausted { ticks } => ticks,
        };
        self.event = Some(event.label());
        self.ticks = Some(ticks);
        self
    }

    fn state_word(&self) -> &'static str {
        if self.blown_out {
            "blown-out"
        } else if self.listening {
            "listening"
        } else {
            "idle"
        }
    }

    pub(crate) fn render(&self, json: bool) -> String {
        if json {
            return serde_json::to_string(self)
                .unwrap_or_else(|_| format!("{{\"label\":\"{}\"}}", self.label));
        }
        match (self.event, self.ticks) {
            (Some(event), Some(ticks)) => {
                format!("status: {} ({event} after {ticks} ticks)", self.state_word())
            }
            _ => format!("status: {}", self.state_word()),
        }
    }
}

/// Prints a status line only when something changed.
pub(crate) struct StatusReporter {
    json: bool,
    last: Option<StatusLine>,
}

impl StatusReporter {
    pub(crate) fn new(json: bool) -> Self {
        Self { json, last: None }
    }

    pub(crate) fn emit(&mut self, line: StatusLine) {
        if self.last.as_ref() == Some(&line) {
            return;
        }
        let mut stdout = io::stdout().lock();
        let _ = writeln!(stdout, "{}", line.render(self.json));
        let _ = stdout.flush();
        self.last = Some(line);
    }
}
