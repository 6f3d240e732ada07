//! Tools and in-progress drafts.

use crate::config::InteractionConfig;
use crate::shapes::{
    FreeDraw, Shape, StyleOverrides, create_arrow, create_ellipse, create_frame, create_freedraw,
    create_line, create_rect,
};
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};

/// Available tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    #[default]
    Select,
    Frame,
    Rect,
    Ellipse,
    Line,
    Arrow,
    FreeDraw,
    Text,
    Eraser,
}

impl ToolKind {
    /// Single-letter keyboard shortcut.
    pub fn from_shortcut(key: char) -> Option<Self> {
        Some(match key.to_ascii_lowercase() {
            'v' => ToolKind::Select,
            'f' => ToolKind::Frame,
            'r' => ToolKind::Rect,
            'o' => ToolKind::Ellipse,
            'l' => ToolKind::Line,
            'a' => ToolKind::Arrow,
            'p' => ToolKind::FreeDraw,
            't' => ToolKind::Text,
            'e' => ToolKind::Eraser,
            _ => return None,
        })
    }

    /// The draft a fixed-geometry draw tool produces.
    pub fn draft_kind(&self) -> Option<DraftKind> {
        match self {
            ToolKind::Frame => Some(DraftKind::Frame),
            ToolKind::Rect => Some(DraftKind::Rect),
            ToolKind::Ellipse => Some(DraftKind::Ellipse),
            ToolKind::Line => Some(DraftKind::Line),
            ToolKind::Arrow => Some(DraftKind::Arrow),
            _ => None,
        }
    }

    /// Whether pointer-down starts a draw gesture.
    pub fn is_draw_tool(&self) -> bool {
        self.draft_kind().is_some() || *self == ToolKind::FreeDraw
    }
}

/// Shape variants drawn by dragging out two corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftKind {
    Frame,
    Rect,
    Ellipse,
    Line,
    Arrow,
}

/// Uncommitted two-point shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DraftShape {
    pub kind: DraftKind,
    pub start_world: Point,
    pub current_world: Point,
}

impl DraftShape {
    pub fn new(kind: DraftKind, start_world: Point) -> Self {
        Self {
            kind,
            start_world,
            current_world: start_world,
        }
    }

    /// Min/max box spanned by the two points.
    pub fn bounds(&self) -> Rect {
        Rect::from_points(self.start_world, self.current_world)
    }

    /// Whether both extents exceed `min_size`.
    pub fn is_large_enough(&self, min_size: f64) -> bool {
        let bounds = self.bounds();
        bounds.width() > min_size && bounds.height() > min_size
    }
}

/// An in-progress draw gesture.
#[derive(Debug, Clone, PartialEq)]
pub enum Draft {
    Shape(DraftShape),
    Freehand(Vec<Point>),
}

impl Draft {
    /// Start a draft for `tool`, or `None` if the tool does not draw.
    pub fn begin(tool: ToolKind, start_world: Point) -> Option<Self> {
        match tool {
            ToolKind::FreeDraw => Some(Draft::Freehand(vec![start_world])),
            other => other
                .draft_kind()
                .map(|kind| Draft::Shape(DraftShape::new(kind, start_world))),
        }
    }

    /// Record the latest pointer position.
    pub fn update(&mut self, world: Point) {
        match self {
            Draft::Shape(draft) => draft.current_world = world,
            Draft::Freehand(points) => points.push(world),
        }
    }

    pub fn shape(&self) -> Option<&DraftShape> {
        match self {
            Draft::Shape(draft) => Some(draft),
            Draft::Freehand(_) => None,
        }
    }

    pub fn freehand_points(&self) -> &[Point] {
        match self {
            Draft::Freehand(points) => points,
            Draft::Shape(_) => &[],
        }
    }

    /// Turn the draft into a shape, or `None` if it is too small to keep.
    pub fn commit(
        &self,
        config: &InteractionConfig,
        style: &StyleOverrides,
        next_frame_number: u32,
    ) -> Option<Shape> {
        match self {
            Draft::Shape(draft) => {
                if !draft.is_large_enough(config.min_draft_size) {
                    return None;
                }
                let bounds = draft.bounds();
                Some(match draft.kind {
                    DraftKind::Frame => {
                        create_frame(bounds, next_frame_number, &StyleOverrides::default())
                    }
                    DraftKind::Rect => create_rect(bounds, style),
                    DraftKind::Ellipse => create_ellipse(bounds, style),
                    DraftKind::Line => create_line(draft.start_world, draft.current_world, style),
                    DraftKind::Arrow => create_arrow(draft.start_world, draft.current_world, style),
                })
            }
            Draft::Freehand(points) => {
                if points.len() <= 1 {
                    return None;
                }
                let mut stroke = FreeDraw::from_points(points.clone());
                stroke.simplify(config.freehand_simplify_tolerance);
                Some(create_freedraw(stroke.points, style))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::ShapeKind;

    fn commit(draft: &Draft) -> Option<Shape> {
        draft.commit(&InteractionConfig::default(), &StyleOverrides::default(), 1)
    }

    #[test]
    fn test_shortcuts() {
        assert_eq!(ToolKind::from_shortcut('r'), Some(ToolKind::Rect));
        assert_eq!(ToolKind::from_shortcut('P'), Some(ToolKind::FreeDraw));
        assert_eq!(ToolKind::from_shortcut('z'), None);
    }

    #[test]
    fn test_tool_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&ToolKind::FreeDraw).unwrap(), "\"freedraw\"");
        let tool: ToolKind = serde_json::from_str("\"eraser\"").unwrap();
        assert_eq!(tool, ToolKind::Eraser);
    }

    #[test]
    fn test_sub_threshold_draft_is_discarded() {
        let mut draft = Draft::begin(ToolKind::Rect, Point::ZERO).unwrap();
        draft.update(Point::new(0.5, 0.5));
        assert!(commit(&draft).is_none());

        draft.update(Point::new(10.0, 10.0));
        let shape = commit(&draft).unwrap();
        assert_eq!(shape.kind(), ShapeKind::Rect);
        assert_eq!(shape.bounds(), Rect::new(0.0, 0.0, 10.0, 10.0));
    }

    #[test]
    fn test_draft_normalizes_reverse_drag() {
        let mut draft = Draft::begin(ToolKind::Ellipse, Point::new(50.0, 50.0)).unwrap();
        draft.update(Point::new(10.0, 20.0));
        let shape = commit(&draft).unwrap();
        assert_eq!(shape.bounds(), Rect::new(10.0, 20.0, 50.0, 50.0));
    }

    #[test]
    fn test_horizontal_line_needs_both_extents() {
        let mut draft = Draft::begin(ToolKind::Line, Point::ZERO).unwrap();
        draft.update(Point::new(100.0, 0.0));
        assert!(commit(&draft).is_none());
    }

    #[test]
    fn test_frame_draft_uses_number() {
        let mut draft = Draft::begin(ToolKind::Frame, Point::ZERO).unwrap();
        draft.update(Point::new(100.0, 100.0));
        let shape = draft
            .commit(&InteractionConfig::default(), &StyleOverrides::default(), 7)
            .unwrap();
        let Shape::Frame(frame) = shape else {
            panic!("expected frame");
        };
        assert_eq!(frame.number, 7);
    }

    #[test]
    fn test_freehand_needs_two_points() {
        let mut draft = Draft::begin(ToolKind::FreeDraw, Point::ZERO).unwrap();
        assert!(commit(&draft).is_none());
        draft.update(Point::new(5.0, 5.0));
        assert_eq!(draft.freehand_points().len(), 2);
        assert_eq!(commit(&draft).map(|s| s.kind()), Some(ShapeKind::FreeDraw));
    }

    #[test]
    fn test_non_drawing_tools_have_no_draft() {
        assert!(Draft::begin(ToolKind::Select, Point::ZERO).is_none());
        assert!(Draft::begin(ToolKind::Text, Point::ZERO).is_none());
        assert!(!ToolKind::Eraser.is_draw_tool());
    }
}
