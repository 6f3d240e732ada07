//! Embedded HTML content shapes.

use super::{
    SerializableColor, ShapeId, ShapeKind, ShapeStyle, ShapeTrait, box_rect, hit_test_box,
    new_shape_id,
};
use kurbo::{BezPath, Point, Rect, Shape as KurboShape};
use serde::{Deserialize, Serialize};

fn card_style() -> ShapeStyle {
    ShapeStyle {
        stroke_color: SerializableColor::new(200, 200, 200, 255),
        stroke_width: 1.0,
        fill: Some(SerializableColor::white()),
        ..ShapeStyle::default()
    }
}

/// A box of generated HTML, optionally remembering the prompt that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedContent {
    pub(crate) id: ShapeId,
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
    #[serde(default)]
    pub html: String,
    #[serde(default)]
    pub prompt: Option<String>,
    pub style: ShapeStyle,
}

impl GeneratedContent {
    pub fn new(x: f64, y: f64, w: f64, h: f64, html: impl Into<String>) -> Self {
        Self {
            id: new_shape_id(),
            x,
            y,
            w,
            h,
            html: html.into(),
            prompt: None,
            style: card_style(),
        }
    }
}

impl ShapeTrait for GeneratedContent {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> ShapeKind {
        ShapeKind::GeneratedContent
    }

    fn bounds(&self) -> Rect {
        box_rect(self.x, self.y, self.w, self.h)
    }

    fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        hit_test_box(self.bounds(), self.style.is_filled(), point, tolerance)
    }

    fn to_path(&self) -> BezPath {
        self.bounds().to_path(0.1)
    }
}

/// A named device-sized screen mockup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Screen {
    pub(crate) id: ShapeId,
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub html: String,
    pub style: ShapeStyle,
}

impl Screen {
    /// Default mobile viewport size.
    pub const DEFAULT_WIDTH: f64 = 390.0;
    pub const DEFAULT_HEIGHT: f64 = 844.0;

    pub fn new(x: f64, y: f64, w: f64, h: f64, name: impl Into<String>) -> Self {
        Self {
            id: new_shape_id(),
            x,
            y,
            w,
            h,
            name: name.into(),
            html: String::new(),
            style: card_style(),
        }
    }
}

impl ShapeTrait for Screen {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> ShapeKind {
        ShapeKind::Screen
    }

    fn bounds(&self) -> Rect {
        box_rect(self.x, self.y, self.w, self.h)
    }

    fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        hit_test_box(self.bounds(), self.style.is_filled(), point, tolerance)
    }

    fn to_path(&self) -> BezPath {
        self.bounds().to_path(0.1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_content_is_filled() {
        let content = GeneratedContent::new(0.0, 0.0, 100.0, 100.0, "<p>hi</p>");
        assert!(content.style.is_filled());
        assert!(content.hit_test(Point::new(50.0, 50.0), 1.0));
    }

    #[test]
    fn test_screen_defaults() {
        let screen = Screen::new(0.0, 0.0, Screen::DEFAULT_WIDTH, Screen::DEFAULT_HEIGHT, "Home");
        assert_eq!(screen.bounds().size().width, 390.0);
        assert!(screen.html.is_empty());
    }
}
