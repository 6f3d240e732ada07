//! Frame shape: a named, numbered container drawn beneath other content.

use super::{
    SerializableColor, ShapeId, ShapeKind, ShapeStyle, ShapeTrait, box_rect, hit_test_box,
    new_shape_id,
};
use kurbo::{BezPath, Point, Rect, RoundedRect, Shape as KurboShape};
use serde::{Deserialize, Serialize};

/// A frame groups content visually. Frames are sharp-cornered and numbered
/// from the canvas frame counter at creation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    pub(crate) id: ShapeId,
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
    /// Display number assigned from the frame counter.
    pub number: u32,
    /// Optional user-provided name; falls back to "Frame {number}".
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub corner_radius: f64,
    pub style: ShapeStyle,
}

impl Frame {
    pub const DEFAULT_CORNER_RADIUS: f64 = 0.0;

    pub fn new(x: f64, y: f64, w: f64, h: f64, number: u32) -> Self {
        Self {
            id: new_shape_id(),
            x,
            y,
            w,
            h,
            number,
            name: None,
            corner_radius: Self::DEFAULT_CORNER_RADIUS,
            style: Self::default_style(),
        }
    }

    /// Frames paint a white sheet with a thin grey outline.
    pub fn default_style() -> ShapeStyle {
        ShapeStyle {
            stroke_color: SerializableColor::new(200, 200, 200, 255),
            stroke_width: 1.0,
            fill: Some(SerializableColor::white()),
            ..ShapeStyle::default()
        }
    }

    /// Label shown above the frame.
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) if !name.is_empty() => name.clone(),
            _ => format!("Frame {}", self.number),
        }
    }

    pub fn as_rect(&self) -> Rect {
        box_rect(self.x, self.y, self.w, self.h)
    }
}

impl ShapeTrait for Frame {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> ShapeKind {
        ShapeKind::Frame
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_is_sharp_and_filled_by_default() {
        let frame = Frame::new(0.0, 0.0, 200.0, 100.0, 3);
        assert_eq!(frame.corner_radius, 0.0);
        assert!(frame.style.is_filled());
        assert!(frame.hit_test(Point::new(100.0, 50.0), 0.0));
    }

    #[test]
    fn test_frame_label() {
        let mut frame = Frame::new(0.0, 0.0, 10.0, 10.0, 2);
        assert_eq!(frame.label(), "Frame 2");
        frame.name = Some("Landing".to_string());
        assert_eq!(frame.label(), "Landing");
    }
}
