//! ASCII level bars for calibration and the live meter.

const BAR_FULL: char = '█';
const BAR_EMPTY: char = '░';
const MARKER: char = '│';

pub(crate) const DEFAULT_BAR_WIDTH: usize = 30;

/// Horizontal bar for `value` on a `0..=max` scale, with an optional marker
/// (e.g. a threshold) drawn in the empty part.
#[must_use]
pub(crate) fn level_bar(value: f32, max: f32, width: usize, marker: Option<f32>) -> String {
    let filled = position(value, max, width);
    let marker = marker.map(|mark| position(mark, max, width).min(width.saturating_sub(1)));

    (0..width)
        .map(|i| {
            if i < filled {
                BAR_FULL
            } else if marker == Some(i) {
                MARKER
            } else {
                BAR_EMPTY
            }
        })
        .collect()
}

#[inline]
fn position(value: f32, max: f32, width: usize) -> usize {
    if max <= 0.0 || !value.is_finite() {
        return 0;
    }
    ((value / max).clamp(0.0, 1.0) * width as f32) as usize
}

/// One-line live meter: `level [bar] 123`.
#[must_use]
pub(crate) fn format_live_meter(level: f32, threshold: f32) -> String {
    format!(
        "level {} {:>3.0}",
        level_bar(level, 255.0, DEFAULT_BAR_WIDTH, Some(threshold)),
        level
    )
}
