//! System microphone input via CPAL.
//!
//! Opens the named (or default) input device, converts whatever sample format
//! it delivers to f32, downmixes to mono and feeds a shared [`Analyser`].

use super::capture::{write_silence, AudioInput, AudioSession, CaptureError};
use super::dispatch::AnalyserFeed;
use super::{Analyser, AnalyserSettings};
use crate::{lock_or_recover, log_debug};
use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Microphone selection. Holds no device handle, so it can move to the
/// detection thread; the device is resolved on every `open`.
#[derive(Debug, Clone, Default)]
pub struct MicInput {
    preferred_device: Option<String>,
}

impl MicInput {
    pub fn new(preferred_device: Option<&str>) -> Self {
        Self {
            preferred_device: preferred_device.map(str::to_string),
        }
    }

    /// List microphone names so the CLI can expose a human-friendly selector.
    pub fn list_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();
        let devices = host.input_devices().context("no input devices available")?;
        Ok(devices.filter_map(|device| device.name().ok()).collect())
    }

    fn resolve_device(&self) -> Result<cpal::Device, CaptureError> {
        let host = cpal::default_host();
        match self.preferred_device.as_deref() {
            Some(name) => {
                let mut devices = host
                    .input_devices()
                    .map_err(|err| CaptureError::classify("enumerate input devices", err))?;
                devices
                    .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                    .ok_or_else(|| {
                        CaptureError::DeviceUnavailable(format!("input device '{name}' not found"))
                    })
            }
            None => host.default_input_device().ok_or_else(|| {
                CaptureError::DeviceUnavailable("no default input device available".to_string())
            }),
        }
    }
}

impl AudioInput for MicInput {
    fn open(&mut self, settings: &AnalyserSettings) -> Result<Box<dyn AudioSession>, CaptureError> {
        let device = self.resolve_device()?;
        let device_name = device
            .name()
            .unwrap_or_else(|_| "unknown input device".to_string());
        let default_config = device
            .default_input_config()
            .map_err(|err| CaptureError::classify("query input config", err))?;
        let format = default_config.sample_format();
        let device_config: StreamConfig = default_config.into();
        let channels = usize::from(device_config.channels.max(1));

        log_debug(&format!(
            "Mic session: device='{device_name}' format={format:?} sample_rate={}Hz channels={channels}",
            device_config.sample_rate.0
        ));
        tracing::info!(
            device = %device_name,
            sample_rate = device_config.sample_rate.0,
            channels,
            fft_size = settings.normalized_fft_size(),
            "opening microphone session"
        );

        let analyser = Arc::new(Mutex::new(Analyser::new(*settings)));
        let dropped = Arc::new(AtomicUsize::new(0));
        let err_fn = |err: cpal::StreamError| {
            log_debug(&format!("audio_stream_error: {err}"));
            tracing::warn!(error = %err, "audio stream error");
        };

        let mut feed = AnalyserFeed::new(analyser.clone(), dropped.clone());
        let stream = match format {
            SampleFormat::F32 => device.build_input_stream(
                &device_config,
                move |data: &[f32], _| feed.push(data, channels, |sample| sample),
                err_fn,
                None,
            ),
            SampleFormat::I16 => device.build_input_stream(
                &device_config,
                move |data: &[i16], _| {
                    feed.push(data, channels, |sample| sample as f32 / 32_768.0)
                },
                err_fn,
                None,
            ),
            SampleFormat::U16 => device.build_input_stream(
                &device_config,
                move |data: &[u16], _| {
                    feed.push(data, channels, |sample| {
                        (sample as f32 - 32_768.0) / 32_768.0
                    })
                },
                err_fn,
                None,
            ),
            other => {
                return Err(CaptureError::DeviceUnavailable(format!(
                    "unsupported sample format: {other:?}"
                )))
            }
        }
        .map_err(|err| CaptureError::classify("build input stream", err))?;

        stream
            .play()
            .map_err(|err| CaptureError::classify("start input stream", err))?;

        Ok(Box::new(MicSession {
            fft_size: settings.normalized_fft_size(),
            analyser,
            stream: Some(stream),
            dropped,
            device_name,
        }))
    }

    fn describe(&self) -> String {
        match self.preferred_device.as_deref() {
            Some(name) => format!("microphone '{name}'"),
            None => "default microphone".to_string(),
        }
    }
}

struct MicSession {
    fft_size: usize,
    analyser: Arc<Mutex<Analyser>>,
    stream: Option<cpal::Stream>,
    dropped: Arc<AtomicUsize>,
    device_name: String,
}

impl AudioSession for MicSession {
    fn fft_size(&self) -> usize {
        self.fft_size
    }

    fn frequency_snapshot(&mut self, out: &mut [u8]) {
        if self.stream.is_none() {
            write_silence(Some(out), None);
            return;
        }
        lock_or_recover(&self.analyser, "mic frequency snapshot").byte_frequency_data(out);
    }

    fn time_domain_snapshot(&mut self, out: &mut [u8]) {
        if self.stream.is_none() {
            write_silence(None, Some(out));
            return;
        }
        lock_or_recover(&self.analyser, "mic time-domain snapshot").byte_time_domain_data(out);
    }

    fn close(&mut self) {
        let Some(stream) = self.stream.take() else {
            return;
        };
        if let Err(err) = stream.pause() {
            log_debug(&format!("failed to pause audio stream: {err}"));
        }
        drop(stream);
        let dropped = self.dropped.load(Ordering::Relaxed);
        log_debug(&format!(
            "Mic session closed: device='{}' dropped_blocks={dropped}",
            self.device_name
        ));
        tracing::info!(device = %self.device_name, dropped_blocks = dropped, "microphone session closed");
    }

    fn is_closed(&self) -> bool {
        self.stream.is_none()
    }
}

impl Drop for MicSession {
    fn drop(&mut self) {
        self.close();
    }
}
