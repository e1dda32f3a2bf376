//! Offline input that replays recorded mono PCM through the same analyser the
//! microphone path uses. Each spectrum read advances the audio by one display
//! frame, so a replay run is deterministic and needs no device.

use super::capture::{write_silence, AudioInput, AudioSession, CaptureError};
use super::{Analyser, AnalyserSettings};
use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct ReplayInput {
    samples: Arc<[f32]>,
    sample_rate: u32,
    ticks_per_second: u32,
}

impl ReplayInput {
    pub fn new(samples: Vec<f32>, sample_rate: u32, ticks_per_second: u32) -> Self {
        Self {
            samples: samples.into(),
            sample_rate: sample_rate.max(1),
            ticks_per_second: ticks_per_second.max(1),
        }
    }

    /// Load raw little-endian f32 mono PCM (e.g. `ffmpeg -f f32le -ac 1`).
    pub fn from_f32le_file(path: &Path, sample_rate: u32, ticks_per_second: u32) -> Result<Self> {
        let bytes = fs::read(path)
            .with_context(|| format!("failed to read replay audio {}", path.display()))?;
        if bytes.len() % 4 != 0 {
            bail!(
                "replay audio {} is {} bytes, not a whole number of f32 samples",
                path.display(),
                bytes.len()
            );
        }
        let samples = bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();
        Ok(Self::new(samples, sample_rate, ticks_per_second))
    }

    /// Samples consumed per detection tick.
    pub fn samples_per_tick(&self) -> usize {
        (self.sample_rate / self.ticks_per_second).max(1) as usize
    }

    /// Ticks needed to play the whole recording once.
    pub fn duration_ticks(&self) -> usize {
        self.samples.len().div_ceil(self.samples_per_tick())
    }
}

impl AudioInput for ReplayInput {
    fn open(&mut self, settings: &AnalyserSettings) -> Result<Box<dyn AudioSession>, CaptureError> {
        tracing::debug!(
            samples = self.samples.len(),
            sample_rate = self.sample_rate,
            "opening replay session"
        );
        Ok(Box::new(ReplaySession {
            analyser: Analyser::new(*settings),
            samples: self.samples.clone(),
            cursor: 0,
            per_tick: self.samples_per_tick(),
            silence: vec![0.0; self.samples_per_tick()],
            closed: false,
        }))
    }

    fn describe(&self) -> String {
        format!(
            "replay of {} samples at {} Hz",
            self.samples.len(),
            self.sample_rate
        )
    }
}

struct ReplaySession {
    analyser: Analyser,
    samples: Arc<[f32]>,
    cursor: usize,
    per_tick: usize,
    silence: Vec<f32>,
    closed: bool,
}

impl ReplaySession {
    fn advance(&mut self) {
        if self.cursor >= self.samples.len() {
            self.analyser.push_samples(&self.silence);
            return;
        }
        let end = (self.cursor + self.per_tick).min(self.samples.len());
        self.analyser.push_samples(&self.samples[self.cursor..end]);
        self.cursor = end;
    }
}

impl AudioSession for ReplaySession {
    fn fft_size(&self) -> usize {
        self.analyser.fft_size()
    }

    fn frequency_snapshot(&mut self, out: &mut [u8]) {
        if self.closed {
            write_silence(Some(out), None);
            return;
        }
        self.advance();
        self.analyser.byte_frequency_data(out);
    }

    fn time_domain_snapshot(&mut self, out: &mut [u8]) {
        if self.closed {
            write_silence(None, Some(out));
            return;
        }
        self.analyser.byte_time_domain_data(out);
    }

    fn close(&mut self) {
        self.closed = true;
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}
