use super::Analyser;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex, TryLockError,
};

/// Average each interleaved frame into one mono sample. A short trailing
/// frame is averaged over the channels it carries.
pub(super) fn downmix_to_mono<T, F>(
    mono: &mut Vec<f32>,
    data: &[T],
    channels: usize,
    mut convert: F,
) where
    T: Copy,
    F: FnMut(T) -> f32,
{
    mono.extend(data.chunks(channels.max(1)).map(|frame| {
        let sum: f32 = frame.iter().map(|&sample| convert(sample)).sum();
        sum / frame.len() as f32
    }));
}

/// Device-callback side of a capture session. Never blocks: if the detection
/// loop holds the analyser while reading a snapshot, the block is dropped and
/// counted.
pub(super) struct AnalyserFeed {
    analyser: Arc<Mutex<Analyser>>,
    scratch: Vec<f32>,
    dropped: Arc<AtomicUsize>,
}

impl AnalyserFeed {
    pub(super) fn new(analyser: Arc<Mutex<Analyser>>, dropped: Arc<AtomicUsize>) -> Self {
        Self {
            analyser,
            scratch: Vec::new(),
            dropped,
        }
    }

    pub(super) fn push<T, F>(&mut self, data: &[T], channels: usize, convert: F)
    where
        T: Copy,
        F: FnMut(T) -> f32,
    {
        self.scratch.clear();
        downmix_to_mono(&mut self.scratch, data, channels, convert);
        match self.analyser.try_lock() {
            Ok(mut analyser) => analyser.push_samples(&self.scratch),
            Err(TryLockError::Poisoned(poisoned)) => {
                poisoned.into_inner().push_samples(&self.scratch)
            }
            Err(TryLockError::WouldBlock) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AnalyserSettings;

    #[test]
    fn downmixes_multi_channel_audio() {
        let mut buf = Vec::new();
        let samples = [1.0f32, -1.0, 0.5, 0.5];
        downmix_to_mono(&mut buf, &samples, 2, |sample| sample);
        assert_eq!(buf, vec![0.0, 0.5]);
    }

    #[test]
    fn preserves_single_channel_audio() {
        let mut buf = Vec::new();
        let samples = [0.1f32, 0.2, 0.3];
        downmix_to_mono(&mut buf, &samples, 1, |sample| sample);
        assert_eq!(buf, samples);
    }

    #[test]
    fn averages_trailing_partial_frame() {
        let mut buf = Vec::new();
        let samples = [0.2f32, 0.4, 0.6];
        downmix_to_mono(&mut buf, &samples, 2, |sample| sample);
        assert_eq!(buf.len(), 2);
        assert!((buf[1] - 0.6).abs() < 1e-6);
    }

    #[test]
    fn feed_counts_blocks_dropped_while_analyser_is_busy() {
        let analyser = Arc::new(Mutex::new(Analyser::new(AnalyserSettings::default())));
        let dropped = Arc::new(AtomicUsize::new(0));
        let mut feed = AnalyserFeed::new(analyser.clone(), dropped.clone());

        feed.push(&[0i16, 16_384], 1, |sample| sample as f32 / 32_768.0);
        {
            let _held = analyser.lock().unwrap();
            feed.push(&[0i16; 8], 1, |sample| sample as f32 / 32_768.0);
        }
        assert_eq!(dropped.load(Ordering::Relaxed), 1);
        assert_eq!(analyser.lock().unwrap().samples_seen(), 2);
    }
}
