//! Rectangle shape.

use super::{ShapeId, ShapeKind, ShapeStyle, ShapeTrait, box_rect, hit_test_box, new_shape_id};
use kurbo::{BezPath, Point, Rect, RoundedRect, Shape as KurboShape};
use serde::{Deserialize, Serialize};

/// A rectangle shape with optional rounded corners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rectangle {
    pub(crate) id: ShapeId,
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width of the rectangle.
    pub w: f64,
    /// Height of the rectangle.
    pub h: f64,
    /// Corner radius (0 = sharp corners).
    #[serde(default)]
    pub corner_radius: f64,
    /// Style properties.
    pub style: ShapeStyle,
}

impl Rectangle {
    /// Rectangles are drawn with a soft rounded corner unless told otherwise.
    pub const DEFAULT_CORNER_RADIUS: f64 = 8.0;

    /// Create a new rectangle.
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self {
            id: new_shape_id(),
            x,
            y,
            w,
            h,
            corner_radius: Self::DEFAULT_CORNER_RADIUS,
            style: ShapeStyle::default(),
        }
    }

    /// Create a rectangle from two corner points.
    pub fn from_corners(p1: Point, p2: Point) -> Self {
        let rect = Rect::from_points(p1, p2);
        Self::new(rect.x0, rect.y0, rect.width(), rect.height())
    }

    /// Get the rectangle as a kurbo Rect.
    pub fn as_rect(&self) -> Rect {
        box_rect(self.x, self.y, self.w, self.h)
    }
}

impl ShapeTrait for Rectangle {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> ShapeKind {
        ShapeKind::Rect
    }

    fn bounds(&self) -> Rect {
        self.as_rect()
    }

    fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        hit_test_box(self.as_rect(), self.style.is_filled(), point, tolerance)
    }

    fn to_path(&self) -> BezPath {
        if self.corner_radius > 0.0 {
            RoundedRect::from_rect(self.as_rect(), self.corner_radius).to_path(0.1)
        } else {
            self.as_rect().to_path(0.1)
        }
    }
}
