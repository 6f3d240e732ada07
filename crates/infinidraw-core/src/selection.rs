//! Selection set and corner-resize geometry.

use crate::shapes::{Shape, ShapeId, ShapePatch};
use crate::store::EntityState;
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Selected shape ids, persisted as `{ id: true }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SelectionMap(BTreeMap<ShapeId, bool>);

impl SelectionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(id: impl Into<ShapeId>) -> Self {
        let mut selection = Self::new();
        selection.insert(id);
        selection
    }

    pub fn insert(&mut self, id: impl Into<ShapeId>) {
        self.0.insert(id.into(), true);
    }

    pub fn remove(&mut self, id: &str) {
        self.0.remove(id);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.get(id).copied().unwrap_or(false)
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn len(&self) -> usize {
        self.ids().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Selected ids in sorted order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.0.iter().filter(|(_, v)| **v).map(|(k, _)| k.as_str())
    }

    /// Drop ids that no longer name a shape.
    pub fn retain_existing(&mut self, shapes: &EntityState<Shape>) {
        self.0.retain(|id, selected| *selected && shapes.contains(id));
    }
}

impl<S: Into<ShapeId>> FromIterator<S> for SelectionMap {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(|id| (id.into(), true)).collect())
    }
}

/// Corner being dragged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Corner {
    Nw,
    Ne,
    Sw,
    Se,
}

impl Corner {
    /// Position of this corner on `bounds`.
    pub fn point(&self, bounds: Rect) -> Point {
        match self {
            Corner::Nw => Point::new(bounds.x0, bounds.y0),
            Corner::Ne => Point::new(bounds.x1, bounds.y0),
            Corner::Sw => Point::new(bounds.x0, bounds.y1),
            Corner::Se => Point::new(bounds.x1, bounds.y1),
        }
    }
}

/// New bounds after dragging `corner` of `initial` to `pointer`.
///
/// The opposite corner stays put and each dimension is floored at `min_size`.
pub fn resize_bounds(initial: Rect, corner: Corner, pointer: Point, min_size: f64) -> Rect {
    let initial = initial.abs();
    match corner {
        Corner::Se => {
            let w = (pointer.x - initial.x0).max(min_size);
            let h = (pointer.y - initial.y0).max(min_size);
            Rect::new(initial.x0, initial.y0, initial.x0 + w, initial.y0 + h)
        }
        Corner::Nw => {
            let w = (initial.x1 - pointer.x).max(min_size);
            let h = (initial.y1 - pointer.y).max(min_size);
            Rect::new(initial.x1 - w, initial.y1 - h, initial.x1, initial.y1)
        }
        Corner::Ne => {
            let w = (pointer.x - initial.x0).max(min_size);
            let h = (initial.y1 - pointer.y).max(min_size);
            Rect::new(initial.x0, initial.y1 - h, initial.x0 + w, initial.y1)
        }
        Corner::Sw => {
            let w = (initial.x1 - pointer.x).max(min_size);
            let h = (pointer.y - initial.y0).max(min_size);
            Rect::new(initial.x1 - w, initial.y0, initial.x1, initial.y0 + h)
        }
    }
}

/// The box a resize gesture starts from. Strokes get `inset` of breathing room
/// so the handles don't sit on the ink.
pub fn resize_frame_bounds(shape: &Shape, inset: f64) -> Rect {
    match shape {
        Shape::Line(_) | Shape::Arrow(_) | Shape::FreeDraw(_) => {
            shape.bounds().inflate(inset, inset)
        }
        _ => shape.bounds(),
    }
}

fn map_axis(v: f64, old_min: f64, old_len: f64, new_min: f64, new_len: f64) -> f64 {
    if old_len <= f64::EPSILON {
        new_min + (v - old_min)
    } else {
        new_min + (v - old_min) / old_len * new_len
    }
}

fn map_point(p: Point, from: Rect, to: Rect) -> Point {
    Point::new(
        map_axis(p.x, from.x0, from.width(), to.x0, to.width()),
        map_axis(p.y, from.y0, from.height(), to.y0, to.height()),
    )
}

/// Patch that fits `shape` into `new_bounds`, given the gesture's starting box.
///
/// Boxes and text take the bounds directly. Strokes are rescaled per axis from
/// `initial` to `new_bounds`, both shrunk by `inset`; an axis with no extent is
/// carried over unscaled.
pub fn resize_patch(shape: &Shape, initial: Rect, new_bounds: Rect, inset: f64) -> ShapePatch {
    let from = initial.inflate(-inset, -inset);
    let to = new_bounds.inflate(-inset, -inset);
    match shape {
        Shape::FreeDraw(stroke) => {
            ShapePatch::points(stroke.points.iter().map(|p| map_point(*p, from, to)).collect())
        }
        Shape::Line(line) => {
            ShapePatch::segment(map_point(line.start(), from, to), map_point(line.end(), from, to))
        }
        Shape::Arrow(arrow) => ShapePatch::segment(
            map_point(arrow.start(), from, to),
            map_point(arrow.end(), from, to),
        ),
        Shape::Frame(_)
        | Shape::Rect(_)
        | Shape::Ellipse(_)
        | Shape::Text(_)
        | Shape::GeneratedContent(_)
        | Shape::Screen(_) => ShapePatch::from_bounds(new_bounds),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::{
        ApproximateMetrics, StyleOverrides, create_freedraw, create_line, create_rect,
    };

    const MIN: f64 = 10.0;

    #[test]
    fn test_selection_map_serializes_as_object() {
        let selection: SelectionMap = ["b", "a"].into_iter().collect();
        let json = serde_json::to_string(&selection).unwrap();
        assert_eq!(json, r#"{"a":true,"b":true}"#);
        let back: SelectionMap = serde_json::from_str(&json).unwrap();
        assert_eq!(back, selection);
    }

    #[test]
    fn test_false_entries_are_not_selected() {
        let selection: SelectionMap = serde_json::from_str(r#"{"a":true,"b":false}"#).unwrap();
        assert!(selection.contains("a"));
        assert!(!selection.contains("b"));
        assert_eq!(selection.len(), 1);
    }

    #[test]
    fn test_retain_existing() {
        let rect = create_rect(Rect::new(0.0, 0.0, 10.0, 10.0), &StyleOverrides::default());
        let id = rect.id().to_string();
        let shapes = EntityState::new().add(rect);
        let mut selection: SelectionMap = [id.clone(), "ghost".to_string()].into_iter().collect();
        selection.retain_existing(&shapes);
        assert_eq!(selection.ids().collect::<Vec<_>>(), vec![id.as_str()]);
    }

    #[test]
    fn test_se_drag_right_grows_width() {
        let initial = Rect::new(10.0, 10.0, 110.0, 60.0);
        let grown = resize_bounds(initial, Corner::Se, Point::new(130.0, 60.0), MIN);
        assert!(grown.width() > initial.width());
        assert_eq!(grown.origin(), initial.origin());
    }

    #[test]
    fn test_nw_drag_left_grows_width_and_moves_x() {
        let initial = Rect::new(10.0, 10.0, 110.0, 60.0);
        let grown = resize_bounds(initial, Corner::Nw, Point::new(-10.0, 10.0), MIN);
        assert_eq!(grown.width() - initial.width(), 20.0);
        assert_eq!(initial.x0 - grown.x0, 20.0);
        assert_eq!(grown.x1, initial.x1);
    }

    #[test]
    fn test_resize_floors_each_dimension() {
        let initial = Rect::new(0.0, 0.0, 100.0, 100.0);
        for corner in [Corner::Nw, Corner::Ne, Corner::Sw, Corner::Se] {
            // Drag past the opposite corner
            let opposite = match corner {
                Corner::Nw => Point::new(500.0, 500.0),
                Corner::Ne => Point::new(-500.0, 500.0),
                Corner::Sw => Point::new(500.0, -500.0),
                Corner::Se => Point::new(-500.0, -500.0),
            };
            let bounds = resize_bounds(initial, corner, opposite, MIN);
            assert_eq!(bounds.width(), MIN, "{corner:?}");
            assert_eq!(bounds.height(), MIN, "{corner:?}");
        }
    }

    #[test]
    fn test_box_resize_patch_sets_bounds() {
        let rect = create_rect(Rect::new(0.0, 0.0, 10.0, 10.0), &StyleOverrides::default());
        let target = Rect::new(5.0, 5.0, 50.0, 40.0);
        let patch = resize_patch(&rect, rect.bounds(), target, 5.0);
        let resized = rect.merged(&patch, &ApproximateMetrics);
        assert_eq!(resized.bounds(), target);
    }

    #[test]
    fn test_freedraw_rescales_relative_layout() {
        let stroke = create_freedraw(
            vec![Point::new(0.0, 0.0), Point::new(50.0, 25.0), Point::new(100.0, 50.0)],
            &StyleOverrides::default(),
        );
        let inset = 5.0;
        let initial = resize_frame_bounds(&stroke, inset);
        let target = resize_bounds(initial, Corner::Se, Point::new(205.0, 105.0), MIN);
        let resized = stroke.merged(&resize_patch(&stroke, initial, target, inset), &ApproximateMetrics);
        let Shape::FreeDraw(stroke) = resized else {
            panic!("expected freedraw");
        };
        assert_eq!(
            stroke.points,
            vec![Point::new(0.0, 0.0), Point::new(100.0, 50.0), Point::new(200.0, 100.0)]
        );
    }

    #[test]
    fn test_horizontal_line_keeps_degenerate_axis() {
        let line = create_line(Point::new(0.0, 50.0), Point::new(100.0, 50.0), &StyleOverrides::default());
        let inset = 5.0;
        let initial = resize_frame_bounds(&line, inset);
        let target = resize_bounds(initial, Corner::Se, Point::new(205.0, 55.0), MIN);
        let resized = line.merged(&resize_patch(&line, initial, target, inset), &ApproximateMetrics);
        let Shape::Line(line) = resized else {
            panic!("expected line");
        };
        assert_eq!(line.start(), Point::new(0.0, 50.0));
        assert_eq!(line.end(), Point::new(200.0, 50.0));
    }
}
