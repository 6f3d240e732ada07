//! Freehand drawing shape.

use super::{ShapeId, ShapeKind, ShapeStyle, ShapeTrait, new_shape_id, point_to_polyline_dist};
use kurbo::{BezPath, Point, Rect};
use serde::{Deserialize, Serialize};

/// A freehand drawing (polyline through the sampled pointer positions).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FreeDraw {
    pub(crate) id: ShapeId,
    /// Points in the freehand path.
    pub points: Vec<Point>,
    /// Style properties.
    pub style: ShapeStyle,
}

impl FreeDraw {
    /// Create from existing points.
    pub fn from_points(points: Vec<Point>) -> Self {
        Self {
            id: new_shape_id(),
            points,
            style: ShapeStyle::default(),
        }
    }

    /// Get the number of points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the path is empty.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Simplify the path by removing redundant points. A non-positive tolerance
    /// leaves the path untouched.
    pub fn simplify(&mut self, tolerance: f64) {
        if self.points.len() < 3 || tolerance <= 0.0 {
            return;
        }
        self.points = rdp_simplify(&self.points, tolerance);
    }
}

/// Ramer-Douglas-Peucker line simplification.
pub fn rdp_simplify(points: &[Point], tolerance: f64) -> Vec<Point> {
    if points.len() < 3 {
        return points.to_vec();
    }

    let first = points[0];
    let last = points[points.len() - 1];

    let (max_index, max_dist) = points[1..points.len() - 1]
        .iter()
        .enumerate()
        .map(|(i, p)| (i + 1, perpendicular_distance(*p, first, last)))
        .fold((0, 0.0), |best, cur| if cur.1 > best.1 { cur } else { best });

    if max_dist > tolerance {
        let mut left = rdp_simplify(&points[..=max_index], tolerance);
        let right = rdp_simplify(&points[max_index..], tolerance);

        // Junction point appears in both halves
        left.pop();
        left.extend(right);
        left
    } else {
        vec![first, last]
    }
}

/// Distance from a point to the infinite line through two points.
fn perpendicular_distance(point: Point, line_start: Point, line_end: Point) -> f64 {
    let d = line_end - line_start;
    let len = d.hypot();
    if len < f64::EPSILON {
        return (point - line_start).hypot();
    }
    (point - line_start).cross(d).abs() / len
}

impl ShapeTrait for FreeDraw {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> ShapeKind {
        ShapeKind::FreeDraw
    }

    fn bounds(&self) -> Rect {
        let Some(first) = self.points.first() else {
            return Rect::ZERO;
        };
        self.points
            .iter()
            .skip(1)
            .fold(Rect::from_points(*first, *first), |r, p| r.union_pt(*p))
    }

    fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        point_to_polyline_dist(point, &self.points) <= tolerance
    }

    fn to_path(&self) -> BezPath {
        let mut path = BezPath::new();
        let mut iter = self.points.iter();
        if let Some(first) = iter.next() {
            path.move_to(*first);
            for p in iter {
                path.line_to(*p);
            }
        }
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zigzag() -> FreeDraw {
        FreeDraw::from_points(vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(20.0, 0.0),
            Point::new(30.0, 10.0),
        ])
    }

    #[test]
    fn test_bounds() {
        assert_eq!(zigzag().bounds(), Rect::new(0.0, 0.0, 30.0, 10.0));
        assert_eq!(FreeDraw::from_points(Vec::new()).bounds(), Rect::ZERO);
    }

    #[test]
    fn test_simplify_drops_collinear_points() {
        let mut stroke = FreeDraw::from_points(vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.1),
            Point::new(2.0, 0.0),
            Point::new(3.0, 0.1),
            Point::new(4.0, 0.0),
        ]);
        stroke.simplify(0.5);
        assert_eq!(stroke.points, vec![Point::new(0.0, 0.0), Point::new(4.0, 0.0)]);
    }

    #[test]
    fn test_simplify_keeps_corners() {
        let mut stroke = zigzag();
        stroke.simplify(0.5);
        assert_eq!(stroke.len(), 4);
    }

    #[test]
    fn test_hit_test_follows_segments() {
        let stroke = zigzag();
        assert!(stroke.hit_test(Point::new(5.0, 5.0), 1.0));
        // Inside the bounds but away from any segment
        assert!(!stroke.hit_test(Point::new(10.0, 0.0), 2.0));
    }
}
