//! Text shape and typography.

use super::measure::{TextMeasure, measure_text};
use super::{SerializableColor, ShapeId, ShapeKind, ShapeTrait, box_rect, new_shape_id, rect_contains};
use kurbo::{BezPath, Point, Rect, Shape as KurboShape};
use serde::{Deserialize, Serialize};

/// Font weight options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontWeight {
    Light,
    #[default]
    Regular,
    Bold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontStyle {
    #[default]
    Normal,
    Italic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TextDecoration {
    #[default]
    None,
    Underline,
    LineThrough,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextTransform {
    #[default]
    None,
    Uppercase,
    Lowercase,
    Capitalize,
}

impl TextTransform {
    /// Apply the transform to a single line of content.
    pub fn apply(&self, line: &str) -> String {
        match self {
            TextTransform::None => line.to_string(),
            TextTransform::Uppercase => line.to_uppercase(),
            TextTransform::Lowercase => line.to_lowercase(),
            TextTransform::Capitalize => {
                let mut out = String::with_capacity(line.len());
                let mut at_word_start = true;
                for ch in line.chars() {
                    if at_word_start && ch.is_alphabetic() {
                        out.extend(ch.to_uppercase());
                    } else {
                        out.push(ch);
                    }
                    at_word_start = ch.is_whitespace();
                }
                out
            }
        }
    }
}

/// Typography settings that drive text measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Typography {
    pub font_family: String,
    /// Font size in pixels.
    pub font_size: f64,
    pub font_weight: FontWeight,
    pub font_style: FontStyle,
    pub text_align: TextAlign,
    pub text_decoration: TextDecoration,
    /// Line height as a multiple of the font size.
    pub line_height: f64,
    /// Extra advance added after every character, in pixels.
    pub letter_spacing: f64,
    pub text_transform: TextTransform,
}

impl Typography {
    pub const DEFAULT_FONT_FAMILY: &'static str = "Inter";
    pub const DEFAULT_FONT_SIZE: f64 = 16.0;
    pub const DEFAULT_LINE_HEIGHT: f64 = 1.2;
}

impl Default for Typography {
    fn default() -> Self {
        Self {
            font_family: Self::DEFAULT_FONT_FAMILY.to_string(),
            font_size: Self::DEFAULT_FONT_SIZE,
            font_weight: FontWeight::default(),
            font_style: FontStyle::default(),
            text_align: TextAlign::default(),
            text_decoration: TextDecoration::default(),
            line_height: Self::DEFAULT_LINE_HEIGHT,
            letter_spacing: 0.0,
            text_transform: TextTransform::default(),
        }
    }
}

/// A text shape. `w`/`h` are measured from the content unless a manual
/// resize pinned them (`size_override`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Text {
    pub(crate) id: ShapeId,
    pub x: f64,
    pub y: f64,
    /// The text content.
    pub text: String,
    #[serde(flatten)]
    pub typography: Typography,
    pub color: SerializableColor,
    pub w: f64,
    pub h: f64,
    #[serde(default)]
    pub size_override: bool,
}

impl Text {
    /// Create a measured text shape at `origin`.
    pub fn new(
        origin: Point,
        text: impl Into<String>,
        typography: Typography,
        measurer: &dyn TextMeasure,
    ) -> Self {
        let mut shape = Self {
            id: new_shape_id(),
            x: origin.x,
            y: origin.y,
            text: text.into(),
            typography,
            color: super::DEFAULT_STROKE_COLOR,
            w: 0.0,
            h: 0.0,
            size_override: false,
        };
        shape.remeasure(measurer);
        shape
    }

    /// Recompute `w`/`h` from the content, dropping any manual size.
    pub fn remeasure(&mut self, measurer: &dyn TextMeasure) {
        let size = measure_text(&self.text, &self.typography, measurer);
        self.w = size.width;
        self.h = size.height;
        self.size_override = false;
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Number of rendered lines.
    pub fn line_count(&self) -> usize {
        self.text.split('\n').count()
    }
}

impl ShapeTrait for Text {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> ShapeKind {
        ShapeKind::Text
    }

    fn bounds(&self) -> Rect {
        box_rect(self.x, self.y, self.w, self.h)
    }

    /// Padded-box test; there is no per-glyph hit test.
    fn hit_test(&self, point: Point, padding: f64) -> bool {
        rect_contains(self.bounds().inflate(padding, padding), point)
    }

    fn to_path(&self) -> BezPath {
        self.bounds().to_path(0.1)
    }
}
