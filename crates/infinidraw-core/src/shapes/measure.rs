//! Text measurement.
//!
//! Layout engines live in the rendering layer, so the core only needs an
//! advance-width source. [`ApproximateMetrics`] is a font-agnostic estimate
//! good enough for hit testing and selection boxes.

use super::text::{FontWeight, Typography};
use kurbo::Size;

/// Narrowest width a measured text box may take.
pub const MIN_TEXT_WIDTH: f64 = 40.0;
/// Widest a measured text box may grow before the renderer wraps it.
pub const MAX_TEXT_WIDTH: f64 = 800.0;

/// Source of per-character advance widths.
pub trait TextMeasure {
    /// Advance width of `ch` in pixels, without letter spacing.
    fn char_width(&self, ch: char, typography: &Typography) -> f64;
}

/// Width estimate from character classes and font size.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApproximateMetrics;

impl TextMeasure for ApproximateMetrics {
    fn char_width(&self, ch: char, typography: &Typography) -> f64 {
        let factor = match ch {
            ' ' | 'i' | 'l' | 'j' | 't' | 'f' | 'r' | '\'' | '.' | ',' | ':' | ';' | '!' | '|' => {
                0.3
            }
            'm' | 'w' | 'M' | 'W' | '@' => 0.9,
            c if c.is_uppercase() => 0.7,
            c if c.is_ascii() => 0.55,
            // CJK and other wide scripts
            _ => 1.0,
        };
        let weight = match typography.font_weight {
            FontWeight::Light => 0.95,
            FontWeight::Regular => 1.0,
            FontWeight::Bold => 1.1,
        };
        typography.font_size * factor * weight
    }
}

/// Width of one line: every character contributes its advance plus letter spacing.
pub fn measure_line(line: &str, typography: &Typography, measurer: &dyn TextMeasure) -> f64 {
    typography
        .text_transform
        .apply(line)
        .chars()
        .map(|ch| measurer.char_width(ch, typography) + typography.letter_spacing)
        .sum()
}

/// Measure a (possibly multi-line) text block.
///
/// Width is the widest line clamped to `[MIN_TEXT_WIDTH, MAX_TEXT_WIDTH]`;
/// height is `max(font_size, lines * font_size * line_height)`.
pub fn measure_text(text: &str, typography: &Typography, measurer: &dyn TextMeasure) -> Size {
    let mut widest: f64 = 0.0;
    let mut lines = 0usize;
    for line in text.split('\n') {
        lines += 1;
        widest = widest.max(measure_line(line, typography, measurer));
    }

    let width = widest.clamp(MIN_TEXT_WIDTH, MAX_TEXT_WIDTH);
    let height = typography
        .font_size
        .max(lines as f64 * typography.font_size * typography.line_height);
    Size::new(width, height)
}
