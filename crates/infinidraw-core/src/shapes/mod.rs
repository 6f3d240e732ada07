//! Shape definitions for the canvas.

mod arrow;
mod ellipse;
mod factory;
mod frame;
mod freedraw;
mod generated;
mod line;
pub mod measure;
mod patch;
mod rectangle;
mod text;

pub use arrow::Arrow;
pub use ellipse::Ellipse;
pub use factory::{
    StyleOverrides, create_arrow, create_ellipse, create_frame, create_freedraw,
    create_generated_content, create_line, create_rect, create_screen, create_text,
};
pub use frame::Frame;
pub use freedraw::FreeDraw;
pub use generated::{GeneratedContent, Screen};
pub use line::Line;
pub use measure::{ApproximateMetrics, MAX_TEXT_WIDTH, MIN_TEXT_WIDTH, TextMeasure, measure_text};
pub use patch::{ShapeGeometry, ShapePatch};
pub use rectangle::Rectangle;
pub use text::{FontStyle, FontWeight, Text, TextAlign, TextDecoration, TextTransform, Typography};

use crate::store::Entity;
use kurbo::{BezPath, Point, Rect};
use peniko::Color;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Serializable color representation (RGBA8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SerializableColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl SerializableColor {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn black() -> Self {
        Self::new(0, 0, 0, 255)
    }

    pub const fn white() -> Self {
        Self::new(255, 255, 255, 255)
    }

    pub const fn transparent() -> Self {
        Self::new(0, 0, 0, 0)
    }

    /// Whether the color paints nothing.
    pub fn is_transparent(&self) -> bool {
        self.a == 0
    }
}

impl From<Color> for SerializableColor {
    fn from(color: Color) -> Self {
        let rgba = color.to_rgba8();
        Self {
            r: rgba.r,
            g: rgba.g,
            b: rgba.b,
            a: rgba.a,
        }
    }
}

impl From<SerializableColor> for Color {
    fn from(color: SerializableColor) -> Self {
        Color::from_rgba8(color.r, color.g, color.b, color.a)
    }
}

/// Default stroke color for new shapes (near-black ink).
pub const DEFAULT_STROKE_COLOR: SerializableColor = SerializableColor::new(30, 30, 30, 255);
/// Default stroke width for new shapes.
pub const DEFAULT_STROKE_WIDTH: f64 = 2.0;

/// Stroke type for drawable shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrokeType {
    #[default]
    Solid,
    Dashed,
}

/// Style properties shared by drawable shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapeStyle {
    /// Stroke color.
    pub stroke_color: SerializableColor,
    /// Stroke width.
    pub stroke_width: f64,
    /// Solid or dashed stroke.
    #[serde(default)]
    pub stroke_type: StrokeType,
    /// Fill color (None = no fill).
    #[serde(default)]
    pub fill: Option<SerializableColor>,
}

impl ShapeStyle {
    /// Whether the shape paints its interior.
    pub fn is_filled(&self) -> bool {
        self.fill.is_some_and(|c| !c.is_transparent())
    }

    /// Get the stroke color as a peniko Color.
    pub fn stroke(&self) -> Color {
        self.stroke_color.into()
    }

    /// Get the fill color as a peniko Color.
    pub fn fill_color(&self) -> Option<Color> {
        self.fill.map(Into::into)
    }
}

impl Default for ShapeStyle {
    fn default() -> Self {
        Self {
            stroke_color: DEFAULT_STROKE_COLOR,
            stroke_width: DEFAULT_STROKE_WIDTH,
            stroke_type: StrokeType::Solid,
            fill: None,
        }
    }
}

/// Unique identifier for shapes. Opaque; freshly created shapes get a UUID string.
pub type ShapeId = String;

/// Generate a fresh shape identifier.
pub fn new_shape_id() -> ShapeId {
    Uuid::new_v4().to_string()
}

/// The closed set of shape variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ShapeKind {
    Frame,
    Rect,
    Ellipse,
    Line,
    Arrow,
    FreeDraw,
    Text,
    GeneratedContent,
    Screen,
}

/// Normalized rectangle from an origin and a (possibly negative) size.
pub fn box_rect(x: f64, y: f64, w: f64, h: f64) -> Rect {
    Rect::new(x, y, x + w, y + h).abs()
}

/// Distance from a point to a line segment (a→b).
pub fn point_to_segment_dist(point: Point, a: Point, b: Point) -> f64 {
    let seg = b - a;
    let pv = point - a;
    let len_sq = seg.hypot2();
    if len_sq < f64::EPSILON {
        return pv.hypot();
    }
    let t = (pv.dot(seg) / len_sq).clamp(0.0, 1.0);
    let proj = a + seg * t;
    (point - proj).hypot()
}

/// Minimum distance from a point to a polyline (sequence of connected segments).
pub fn point_to_polyline_dist(point: Point, points: &[Point]) -> f64 {
    match points {
        [] => f64::INFINITY,
        [only] => (point - *only).hypot(),
        _ => points
            .windows(2)
            .map(|w| point_to_segment_dist(point, w[0], w[1]))
            .fold(f64::INFINITY, f64::min),
    }
}

/// Inclusive containment test (kurbo's `Rect::contains` excludes the far edges).
pub fn rect_contains(rect: Rect, point: Point) -> bool {
    point.x >= rect.x0 && point.x <= rect.x1 && point.y >= rect.y0 && point.y <= rect.y1
}

/// Box hit rule: filled boxes hit anywhere inside, unfilled ones only near an edge.
pub(crate) fn hit_test_box(rect: Rect, filled: bool, point: Point, tolerance: f64) -> bool {
    if !rect_contains(rect.inflate(tolerance, tolerance), point) {
        return false;
    }
    if filled {
        return true;
    }
    let inner = rect.inflate(-tolerance, -tolerance);
    inner.width() <= 0.0 || inner.height() <= 0.0 || !rect_contains(inner, point)
}

/// Common behaviour implemented by every shape variant.
pub trait ShapeTrait {
    /// Get the unique identifier.
    fn id(&self) -> &str;

    /// Get the variant tag.
    fn kind(&self) -> ShapeKind;

    /// Get the bounding box in world coordinates.
    fn bounds(&self) -> Rect;

    /// Check if a point (in world coordinates) exactly hits this shape.
    fn hit_test(&self, point: Point, tolerance: f64) -> bool;

    /// Outline path for the rendering layer.
    fn to_path(&self) -> BezPath;
}

/// Tagged union over all shape variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Shape {
    Frame(Frame),
    Rect(Rectangle),
    Ellipse(Ellipse),
    Line(Line),
    Arrow(Arrow),
    FreeDraw(FreeDraw),
    Text(Text),
    GeneratedContent(GeneratedContent),
    Screen(Screen),
}

impl Shape {
    fn as_trait(&self) -> &dyn ShapeTrait {
        match self {
            Shape::Frame(s) => s,
            Shape::Rect(s) => s,
            Shape::Ellipse(s) => s,
            Shape::Line(s) => s,
            Shape::Arrow(s) => s,
            Shape::FreeDraw(s) => s,
            Shape::Text(s) => s,
            Shape::GeneratedContent(s) => s,
            Shape::Screen(s) => s,
        }
    }

    pub fn id(&self) -> &str {
        self.as_trait().id()
    }

    pub fn kind(&self) -> ShapeKind {
        self.as_trait().kind()
    }

    pub fn bounds(&self) -> Rect {
        self.as_trait().bounds()
    }

    pub fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        self.as_trait().hit_test(point, tolerance)
    }

    pub fn to_path(&self) -> BezPath {
        self.as_trait().to_path()
    }

    /// Drawable style, if the variant carries one (Text uses typography instead).
    pub fn style(&self) -> Option<&ShapeStyle> {
        match self {
            Shape::Frame(s) => Some(&s.style),
            Shape::Rect(s) => Some(&s.style),
            Shape::Ellipse(s) => Some(&s.style),
            Shape::Line(s) => Some(&s.style),
            Shape::Arrow(s) => Some(&s.style),
            Shape::FreeDraw(s) => Some(&s.style),
            Shape::GeneratedContent(s) => Some(&s.style),
            Shape::Screen(s) => Some(&s.style),
            Shape::Text(_) => None,
        }
    }

    pub fn is_frame(&self) -> bool {
        matches!(self, Shape::Frame(_))
    }

    /// Whether the variant is laid out as an origin plus a size.
    pub fn is_box(&self) -> bool {
        matches!(
            self,
            Shape::Frame(_)
                | Shape::Rect(_)
                | Shape::Ellipse(_)
                | Shape::GeneratedContent(_)
                | Shape::Screen(_)
        )
    }
}

impl Entity for Shape {
    type Patch = ShapePatch;

    fn id(&self) -> &str {
        Shape::id(self)
    }

    fn merge(&self, patch: &ShapePatch) -> Self {
        self.merged(patch, &ApproximateMetrics)
    }
}
