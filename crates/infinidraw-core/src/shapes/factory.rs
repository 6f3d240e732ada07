//! Factory functions: the only way new shapes are minted.
//!
//! Each factory assigns a fresh id, normalizes geometry and fills in the
//! variant's defaults before applying caller overrides.

use super::measure::TextMeasure;
use super::{
    Arrow, Ellipse, Frame, FreeDraw, GeneratedContent, Line, Rectangle, SerializableColor, Screen,
    Shape, ShapeStyle, StrokeType, Text, Typography,
};
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};

/// Optional style fields layered over a variant's defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StyleOverrides {
    pub stroke_color: Option<SerializableColor>,
    pub stroke_width: Option<f64>,
    pub stroke_type: Option<StrokeType>,
    /// `Some(None)` removes the fill.
    pub fill: Option<Option<SerializableColor>>,
    pub corner_radius: Option<f64>,
}

impl StyleOverrides {
    /// Apply the overrides on top of `base`.
    pub fn apply(&self, mut base: ShapeStyle) -> ShapeStyle {
        if let Some(color) = self.stroke_color {
            base.stroke_color = color;
        }
        if let Some(width) = self.stroke_width {
            base.stroke_width = width;
        }
        if let Some(stroke_type) = self.stroke_type {
            base.stroke_type = stroke_type;
        }
        if let Some(fill) = self.fill {
            base.fill = fill;
        }
        base
    }
}

pub fn create_rect(rect: Rect, overrides: &StyleOverrides) -> Shape {
    let rect = rect.abs();
    let mut shape = Rectangle::new(rect.x0, rect.y0, rect.width(), rect.height());
    shape.style = overrides.apply(shape.style);
    if let Some(radius) = overrides.corner_radius {
        shape.corner_radius = radius;
    }
    Shape::Rect(shape)
}

/// Frames carry their own chrome style; only explicit overrides change it.
pub fn create_frame(rect: Rect, number: u32, overrides: &StyleOverrides) -> Shape {
    let rect = rect.abs();
    let mut shape = Frame::new(rect.x0, rect.y0, rect.width(), rect.height(), number);
    shape.style = overrides.apply(shape.style);
    if let Some(radius) = overrides.corner_radius {
        shape.corner_radius = radius;
    }
    Shape::Frame(shape)
}

pub fn create_ellipse(rect: Rect, overrides: &StyleOverrides) -> Shape {
    let mut shape = Ellipse::from_rect(rect.abs());
    shape.style = overrides.apply(shape.style);
    Shape::Ellipse(shape)
}

pub fn create_line(start: Point, end: Point, overrides: &StyleOverrides) -> Shape {
    let mut shape = Line::new(start, end);
    shape.style = overrides.apply(shape.style);
    Shape::Line(shape)
}

pub fn create_arrow(start: Point, end: Point, overrides: &StyleOverrides) -> Shape {
    let mut shape = Arrow::new(start, end);
    shape.style = overrides.apply(shape.style);
    Shape::Arrow(shape)
}

/// Freehand strokes are never filled.
pub fn create_freedraw(points: Vec<Point>, overrides: &StyleOverrides) -> Shape {
    let mut shape = FreeDraw::from_points(points);
    shape.style = overrides.apply(shape.style);
    shape.style.fill = None;
    Shape::FreeDraw(shape)
}

/// Create a text shape and measure it.
pub fn create_text(
    origin: Point,
    content: &str,
    typography: Typography,
    measurer: &dyn TextMeasure,
) -> Shape {
    Shape::Text(Text::new(origin, content, typography, measurer))
}

pub fn create_generated_content(rect: Rect, html: &str, prompt: Option<String>) -> Shape {
    let rect = rect.abs();
    let mut shape = GeneratedContent::new(rect.x0, rect.y0, rect.width(), rect.height(), html);
    shape.prompt = prompt;
    Shape::GeneratedContent(shape)
}

pub fn create_screen(rect: Rect, name: &str) -> Shape {
    let rect = rect.abs();
    Shape::Screen(Screen::new(rect.x0, rect.y0, rect.width(), rect.height(), name))
}
