//! Partial updates for shapes.
//!
//! Shapes are never edited in place: a [`ShapePatch`] names the fields to
//! change and [`Shape::merged`] produces the updated copy.

use super::measure::TextMeasure;
use super::{
    FontStyle, FontWeight, SerializableColor, Shape, ShapeStyle, StrokeType, Text, TextAlign,
    TextDecoration, TextTransform, Typography,
};
use kurbo::{Point, Vec2};
use serde::{Deserialize, Deserializer, Serialize};

/// Distinguishes an absent field from an explicit `null`.
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// A set of optional field updates. Fields a variant does not have are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShapePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub w: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub h: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_y: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_y: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points: Option<Vec<Point>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub corner_radius: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head_size: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub stroke_color: Option<SerializableColor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stroke_width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stroke_type: Option<StrokeType>,
    #[serde(
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub fill: Option<Option<SerializableColor>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<SerializableColor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_weight: Option<FontWeight>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_style: Option<FontStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_align: Option<TextAlign>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_decoration: Option<TextDecoration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_height: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub letter_spacing: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_transform: Option<TextTransform>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

impl ShapePatch {
    /// Patch that places a box-shaped or text shape at `rect`.
    pub fn from_bounds(rect: kurbo::Rect) -> Self {
        Self {
            x: Some(rect.x0),
            y: Some(rect.y0),
            w: Some(rect.width()),
            h: Some(rect.height()),
            ..Self::default()
        }
    }

    pub fn segment(start: Point, end: Point) -> Self {
        Self {
            start_x: Some(start.x),
            start_y: Some(start.y),
            end_x: Some(end.x),
            end_y: Some(end.y),
            ..Self::default()
        }
    }

    pub fn points(points: Vec<Point>) -> Self {
        Self {
            points: Some(points),
            ..Self::default()
        }
    }

    fn apply_style(&self, style: &mut ShapeStyle) {
        if let Some(color) = self.stroke_color {
            style.stroke_color = color;
        }
        if let Some(width) = self.stroke_width {
            style.stroke_width = width;
        }
        if let Some(stroke_type) = self.stroke_type {
            style.stroke_type = stroke_type;
        }
        if let Some(fill) = self.fill {
            style.fill = fill;
        }
    }

    fn apply_box(&self, x: &mut f64, y: &mut f64, w: &mut f64, h: &mut f64) {
        set(x, self.x);
        set(y, self.y);
        set(w, self.w);
        set(h, self.h);
    }

    fn apply_segment(&self, sx: &mut f64, sy: &mut f64, ex: &mut f64, ey: &mut f64) {
        set(sx, self.start_x);
        set(sy, self.start_y);
        set(ex, self.end_x);
        set(ey, self.end_y);
    }

    /// Returns whether any typography field actually changed.
    fn apply_typography(&self, typography: &mut Typography) -> bool {
        let before = typography.clone();
        if let Some(family) = &self.font_family {
            typography.font_family = family.clone();
        }
        set(&mut typography.font_size, self.font_size);
        set(&mut typography.font_weight, self.font_weight);
        set(&mut typography.font_style, self.font_style);
        set(&mut typography.text_align, self.text_align);
        set(&mut typography.text_decoration, self.text_decoration);
        set(&mut typography.line_height, self.line_height);
        set(&mut typography.letter_spacing, self.letter_spacing);
        set(&mut typography.text_transform, self.text_transform);
        *typography != before
    }
}

fn set<T>(field: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *field = value;
    }
}

fn merge_text(text: &Text, patch: &ShapePatch, measurer: &dyn TextMeasure) -> Text {
    let mut next = text.clone();
    set(&mut next.x, patch.x);
    set(&mut next.y, patch.y);
    // Text has no stroke; a stroke color patch recolors the glyphs.
    set(&mut next.color, patch.color.or(patch.stroke_color));

    let typography_changed = patch.apply_typography(&mut next.typography);
    let content_changed = match &patch.text {
        Some(content) if *content != next.text => {
            next.text = content.clone();
            true
        }
        _ => false,
    };

    if patch.w.is_some() || patch.h.is_some() {
        set(&mut next.w, patch.w);
        set(&mut next.h, patch.h);
        next.size_override = true;
    } else if content_changed || (typography_changed && !next.size_override) {
        next.remeasure(measurer);
    }
    next
}

impl Shape {
    /// Produce a copy of this shape with `patch` merged in. Text is re-measured
    /// when its content or typography changes, unless a manual size is pinned.
    pub fn merged(&self, patch: &ShapePatch, measurer: &dyn TextMeasure) -> Shape {
        match self {
            Shape::Frame(s) => {
                let mut s = s.clone();
                patch.apply_box(&mut s.x, &mut s.y, &mut s.w, &mut s.h);
                patch.apply_style(&mut s.style);
                set(&mut s.corner_radius, patch.corner_radius);
                if let Some(name) = &patch.name {
                    s.name = Some(name.clone());
                }
                Shape::Frame(s)
            }
            Shape::Rect(s) => {
                let mut s = s.clone();
                patch.apply_box(&mut s.x, &mut s.y, &mut s.w, &mut s.h);
                patch.apply_style(&mut s.style);
                set(&mut s.corner_radius, patch.corner_radius);
                Shape::Rect(s)
            }
            Shape::Ellipse(s) => {
                let mut s = s.clone();
                patch.apply_box(&mut s.x, &mut s.y, &mut s.w, &mut s.h);
                patch.apply_style(&mut s.style);
                Shape::Ellipse(s)
            }
            Shape::Line(s) => {
                let mut s = s.clone();
                patch.apply_segment(&mut s.start_x, &mut s.start_y, &mut s.end_x, &mut s.end_y);
                patch.apply_style(&mut s.style);
                Shape::Line(s)
            }
            Shape::Arrow(s) => {
                let mut s = s.clone();
                patch.apply_segment(&mut s.start_x, &mut s.start_y, &mut s.end_x, &mut s.end_y);
                patch.apply_style(&mut s.style);
                set(&mut s.head_size, patch.head_size);
                Shape::Arrow(s)
            }
            Shape::FreeDraw(s) => {
                let mut s = s.clone();
                if let Some(points) = &patch.points {
                    s.points = points.clone();
                }
                patch.apply_style(&mut s.style);
                Shape::FreeDraw(s)
            }
            Shape::Text(s) => Shape::Text(merge_text(s, patch, measurer)),
            Shape::GeneratedContent(s) => {
                let mut s = s.clone();
                patch.apply_box(&mut s.x, &mut s.y, &mut s.w, &mut s.h);
                patch.apply_style(&mut s.style);
                if let Some(html) = &patch.html {
                    s.html = html.clone();
                }
                if let Some(prompt) = &patch.prompt {
                    s.prompt = Some(prompt.clone());
                }
                Shape::GeneratedContent(s)
            }
            Shape::Screen(s) => {
                let mut s = s.clone();
                patch.apply_box(&mut s.x, &mut s.y, &mut s.w, &mut s.h);
                patch.apply_style(&mut s.style);
                if let Some(name) = &patch.name {
                    s.name = name.clone();
                }
                if let Some(html) = &patch.html {
                    s.html = html.clone();
                }
                Shape::Screen(s)
            }
        }
    }

    /// Snapshot of the position-defining fields, used as a move anchor.
    pub fn geometry(&self) -> ShapeGeometry {
        match self {
            Shape::Frame(s) => ShapeGeometry::Origin(Point::new(s.x, s.y)),
            Shape::Rect(s) => ShapeGeometry::Origin(Point::new(s.x, s.y)),
            Shape::Ellipse(s) => ShapeGeometry::Origin(Point::new(s.x, s.y)),
            Shape::Text(s) => ShapeGeometry::Origin(s.origin()),
            Shape::GeneratedContent(s) => ShapeGeometry::Origin(Point::new(s.x, s.y)),
            Shape::Screen(s) => ShapeGeometry::Origin(Point::new(s.x, s.y)),
            Shape::Line(s) => ShapeGeometry::Segment {
                start: s.start(),
                end: s.end(),
            },
            Shape::Arrow(s) => ShapeGeometry::Segment {
                start: s.start(),
                end: s.end(),
            },
            Shape::FreeDraw(s) => ShapeGeometry::Points(s.points.clone()),
        }
    }
}

/// Position-defining fields of a shape.
#[derive(Debug, Clone, PartialEq)]
pub enum ShapeGeometry {
    /// Top-left origin of box shapes and text.
    Origin(Point),
    /// Endpoints of lines and arrows.
    Segment { start: Point, end: Point },
    /// Freehand polyline.
    Points(Vec<Point>),
}

impl ShapeGeometry {
    /// Patch that places the shape at this geometry offset by `delta`.
    pub fn translated_patch(&self, delta: Vec2) -> ShapePatch {
        match self {
            ShapeGeometry::Origin(origin) => {
                let p = *origin + delta;
                ShapePatch {
                    x: Some(p.x),
                    y: Some(p.y),
                    ..ShapePatch::default()
                }
            }
            ShapeGeometry::Segment { start, end } => {
                ShapePatch::segment(*start + delta, *end + delta)
            }
            ShapeGeometry::Points(points) => {
                ShapePatch::points(points.iter().map(|p| *p + delta).collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::{
        ApproximateMetrics, StyleOverrides, create_freedraw, create_line, create_rect, create_text,
    };
    use kurbo::Rect;

    fn text_shape(content: &str) -> Shape {
        create_text(Point::ZERO, content, Typography::default(), &ApproximateMetrics)
    }

    fn as_text(shape: &Shape) -> &Text {
        match shape {
            Shape::Text(t) => t,
            other => panic!("expected text, got {:?}", other.kind()),
        }
    }

    #[test]
    fn test_merge_keeps_id_and_untouched_fields() {
        let rect = create_rect(Rect::new(0.0, 0.0, 10.0, 10.0), &StyleOverrides::default());
        let patch = ShapePatch {
            x: Some(5.0),
            stroke_width: Some(4.0),
            ..ShapePatch::default()
        };
        let merged = rect.merged(&patch, &ApproximateMetrics);
        assert_eq!(merged.id(), rect.id());
        assert_eq!(merged.bounds(), Rect::new(5.0, 0.0, 15.0, 10.0));
        assert_eq!(merged.style().map(|s| s.stroke_width), Some(4.0));
    }

    #[test]
    fn test_fill_null_clears_fill() {
        let overrides = StyleOverrides {
            fill: Some(Some(SerializableColor::white())),
            ..StyleOverrides::default()
        };
        let rect = create_rect(Rect::new(0.0, 0.0, 10.0, 10.0), &overrides);
        let patch: ShapePatch = serde_json::from_str(r#"{"fill":null}"#).unwrap();
        assert_eq!(patch.fill, Some(None));
        let merged = rect.merged(&patch, &ApproximateMetrics);
        assert!(!merged.style().unwrap().is_filled());

        let untouched: ShapePatch = serde_json::from_str("{}").unwrap();
        assert_eq!(untouched.fill, None);
    }

    #[test]
    fn test_text_content_change_remeasures() {
        let shape = text_shape("hi");
        let longer = ShapePatch {
            text: Some("a much longer line of text".into()),
            ..ShapePatch::default()
        };
        let merged = shape.merged(&longer, &ApproximateMetrics);
        assert!(as_text(&merged).w > as_text(&shape).w);
    }

    #[test]
    fn test_manual_size_survives_typography_change() {
        let shape = text_shape("hello");
        let pinned = shape.merged(&ShapePatch::from_bounds(Rect::new(0.0, 0.0, 300.0, 90.0)), &ApproximateMetrics);
        assert!(as_text(&pinned).size_override);

        let bigger = ShapePatch {
            font_size: Some(40.0),
            ..ShapePatch::default()
        };
        let merged = pinned.merged(&bigger, &ApproximateMetrics);
        assert_eq!(as_text(&merged).w, 300.0);
        assert_eq!(as_text(&merged).h, 90.0);
    }

    #[test]
    fn test_content_change_clears_manual_size() {
        let shape = text_shape("hello");
        let pinned = shape.merged(&ShapePatch::from_bounds(Rect::new(0.0, 0.0, 300.0, 90.0)), &ApproximateMetrics);
        let edit = ShapePatch {
            text: Some("hello!".into()),
            ..ShapePatch::default()
        };
        let merged = pinned.merged(&edit, &ApproximateMetrics);
        let text = as_text(&merged);
        assert!(!text.size_override);
        assert_ne!(text.w, 300.0);
    }

    #[test]
    fn test_translated_patch_moves_every_geometry() {
        let delta = Vec2::new(10.0, -5.0);

        let line = create_line(Point::ZERO, Point::new(10.0, 10.0), &StyleOverrides::default());
        let moved = line.merged(&line.geometry().translated_patch(delta), &ApproximateMetrics);
        assert_eq!(moved.bounds(), Rect::new(10.0, -5.0, 20.0, 5.0));

        let stroke = create_freedraw(
            vec![Point::ZERO, Point::new(4.0, 4.0)],
            &StyleOverrides::default(),
        );
        let moved = stroke.merged(&stroke.geometry().translated_patch(delta), &ApproximateMetrics);
        assert_eq!(moved.bounds(), Rect::new(10.0, -5.0, 14.0, -1.0));
    }

    #[test]
    fn test_patch_serialization_skips_absent_fields() {
        let patch = ShapePatch {
            stroke_width: Some(3.0),
            ..ShapePatch::default()
        };
        assert_eq!(serde_json::to_string(&patch).unwrap(), r#"{"strokeWidth":3.0}"#);
    }
}
