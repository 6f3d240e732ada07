//! Ellipse shape.

use super::{
    ShapeId, ShapeKind, ShapeStyle, ShapeTrait, box_rect, new_shape_id, point_to_segment_dist,
};
use kurbo::{BezPath, Ellipse as KurboEllipse, Point, Rect, Shape as KurboShape};
use serde::{Deserialize, Serialize};

/// An axis-aligned ellipse inscribed in its box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ellipse {
    pub(crate) id: ShapeId,
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
    /// Style properties.
    pub style: ShapeStyle,
}

impl Ellipse {
    /// Create a new ellipse from its bounding box.
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self {
            id: new_shape_id(),
            x,
            y,
            w,
            h,
            style: ShapeStyle::default(),
        }
    }

    /// Create an ellipse from a bounding rectangle.
    pub fn from_rect(rect: Rect) -> Self {
        Self::new(rect.x0, rect.y0, rect.width(), rect.height())
    }

    pub fn center(&self) -> Point {
        self.bounds().center()
    }

    /// Horizontal and vertical radii.
    pub fn radii(&self) -> (f64, f64) {
        let b = self.bounds();
        (b.width() / 2.0, b.height() / 2.0)
    }

    /// Get as a kurbo Ellipse.
    pub fn as_kurbo(&self) -> KurboEllipse {
        KurboEllipse::from_rect(self.bounds())
    }
}

impl ShapeTrait for Ellipse {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> ShapeKind {
        ShapeKind::Ellipse
    }

    fn bounds(&self) -> Rect {
        box_rect(self.x, self.y, self.w, self.h)
    }

    /// Evaluates the implicit form `(dx/rx)² + (dy/ry)²`. Points outside the
    /// boundary never hit; unfilled ellipses additionally require the first-order
    /// distance to the boundary (value over gradient magnitude) to be within tolerance.
    fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        let center = self.center();
        let (rx, ry) = self.radii();
        if rx < f64::EPSILON || ry < f64::EPSILON {
            // Collapsed to a segment
            let b = self.bounds();
            return point_to_segment_dist(point, Point::new(b.x0, b.y0), Point::new(b.x1, b.y1))
                <= tolerance;
        }

        let dx = point.x - center.x;
        let dy = point.y - center.y;
        let value = (dx / rx).powi(2) + (dy / ry).powi(2);
        if value > 1.0 {
            return false;
        }
        if self.style.is_filled() {
            return true;
        }

        let gx = 2.0 * dx / (rx * rx);
        let gy = 2.0 * dy / (ry * ry);
        let gradient = gx.hypot(gy);
        if gradient < f64::EPSILON {
            return false;
        }
        (1.0 - value) / gradient <= tolerance
    }

    fn to_path(&self) -> BezPath {
        self.as_kurbo().to_path(0.1)
    }
}
