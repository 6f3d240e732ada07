//! Arrow shape.

use super::{ShapeId, ShapeKind, ShapeStyle, ShapeTrait, new_shape_id, point_to_segment_dist};
use kurbo::{BezPath, Point, Rect, Vec2};
use serde::{Deserialize, Serialize};

/// An arrow shape (line with an arrowhead at the end).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Arrow {
    pub(crate) id: ShapeId,
    pub start_x: f64,
    pub start_y: f64,
    pub end_x: f64,
    pub end_y: f64,
    /// Size of the arrowhead.
    #[serde(default = "default_head_size")]
    pub head_size: f64,
    /// Style properties.
    pub style: ShapeStyle,
}

fn default_head_size() -> f64 {
    Arrow::DEFAULT_HEAD_SIZE
}

impl Arrow {
    pub const DEFAULT_HEAD_SIZE: f64 = 15.0;

    /// Create a new arrow.
    pub fn new(start: Point, end: Point) -> Self {
        Self {
            id: new_shape_id(),
            start_x: start.x,
            start_y: start.y,
            end_x: end.x,
            end_y: end.y,
            head_size: Self::DEFAULT_HEAD_SIZE,
            style: ShapeStyle::default(),
        }
    }

    pub fn start(&self) -> Point {
        Point::new(self.start_x, self.start_y)
    }

    pub fn end(&self) -> Point {
        Point::new(self.end_x, self.end_y)
    }

    /// Direction from start to end, normalized.
    pub fn direction(&self) -> Vec2 {
        let delta = self.end() - self.start();
        let len = delta.hypot();
        if len < f64::EPSILON {
            Vec2::new(1.0, 0.0)
        } else {
            delta / len
        }
    }

    /// The two wing tips of the arrowhead.
    pub fn arrowhead_points(&self) -> (Point, Point) {
        let dir = self.direction();
        let end = self.end();
        let angle = std::f64::consts::PI / 6.0;
        let (sin_a, cos_a) = angle.sin_cos();

        let left = Vec2::new(dir.x * cos_a + dir.y * sin_a, -dir.x * sin_a + dir.y * cos_a);
        let right = Vec2::new(dir.x * cos_a - dir.y * sin_a, dir.x * sin_a + dir.y * cos_a);

        (end - left * self.head_size, end - right * self.head_size)
    }
}

impl ShapeTrait for Arrow {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> ShapeKind {
        ShapeKind::Arrow
    }

    fn bounds(&self) -> Rect {
        Rect::from_points(self.start(), self.end())
    }

    fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        point_to_segment_dist(point, self.start(), self.end()) <= tolerance
    }

    fn to_path(&self) -> BezPath {
        let mut path = BezPath::new();
        path.move_to(self.start());
        path.line_to(self.end());

        let (left, right) = self.arrowhead_points();
        path.move_to(left);
        path.line_to(self.end());
        path.line_to(right);
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arrow_direction() {
        let arrow = Arrow::new(Point::new(0.0, 0.0), Point::new(100.0, 0.0));
        let dir = arrow.direction();
        assert!((dir.x - 1.0).abs() < f64::EPSILON);
        assert!(dir.y.abs() < f64::EPSILON);
    }

    #[test]
    fn test_arrowhead_points_behind_tip() {
        let arrow = Arrow::new(Point::new(0.0, 0.0), Point::new(100.0, 0.0));
        let (left, right) = arrow.arrowhead_points();
        assert!(left.x < 100.0);
        assert!(right.x < 100.0);
        assert!((left.y + right.y).abs() < 1e-10);
    }

    #[test]
    fn test_hit_test_segment_only() {
        let arrow = Arrow::new(Point::new(0.0, 0.0), Point::new(100.0, 100.0));
        assert!(arrow.hit_test(Point::new(50.0, 50.0), 2.0));
        assert!(!arrow.hit_test(Point::new(50.0, 70.0), 2.0));
    }
}
