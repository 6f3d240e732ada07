//! Viewport pan/zoom state machine and coordinate transforms.
//!
//! [`ViewportState::reduce`] is a pure reducer: it never mutates the receiver
//! and always returns the next state.

use crate::config::ViewportConfig;
use kurbo::{Affine, Point, Rect, Size, Vec2};
use serde::{Deserialize, Serialize};

/// Where a pan gesture started.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanAnchor {
    pub start_screen: Point,
    pub start_translate: Vec2,
}

/// Pan sub-state. The anchor only exists while a pan is active.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ViewportMode {
    #[default]
    Idle,
    /// Middle/right button drag.
    Panning(PanAnchor),
    /// Left button drag with shift held.
    ShiftPanning(PanAnchor),
}

impl ViewportMode {
    pub fn anchor(&self) -> Option<PanAnchor> {
        match self {
            ViewportMode::Idle => None,
            ViewportMode::Panning(anchor) | ViewportMode::ShiftPanning(anchor) => Some(*anchor),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanKind {
    Normal,
    Shift,
}

/// Inputs to the viewport reducer. Points are in screen coordinates unless named otherwise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewportAction {
    PanStart { screen: Point, kind: PanKind },
    PanMove { screen: Point },
    PanEnd,
    WheelPan { dx: f64, dy: f64 },
    WheelZoom { delta_y: f64, origin: Point },
    ZoomIn,
    ZoomOut,
    CenterOnWorld { world: Point, screen: Point },
    ZoomToFit { bounds: Rect, viewport: Size, padding: f64 },
    RestoreViewport { scale: f64, translate: Vec2 },
}

/// Persisted part of the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportSnapshot {
    pub scale: f64,
    pub translate: Vec2,
}

impl Default for ViewportSnapshot {
    fn default() -> Self {
        Self {
            scale: 1.0,
            translate: Vec2::ZERO,
        }
    }
}

/// Current pan/zoom of the canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportState {
    pub scale: f64,
    pub translate: Vec2,
    pub mode: ViewportMode,
}

impl Default for ViewportState {
    fn default() -> Self {
        Self {
            scale: 1.0,
            translate: Vec2::ZERO,
            mode: ViewportMode::Idle,
        }
    }
}

/// `p * scale + translate`
pub fn world_to_screen(p: Point, translate: Vec2, scale: f64) -> Point {
    Point::new(p.x * scale + translate.x, p.y * scale + translate.y)
}

/// `(p - translate) / scale`
pub fn screen_to_world(p: Point, translate: Vec2, scale: f64) -> Point {
    Point::new((p.x - translate.x) / scale, (p.y - translate.y) / scale)
}

impl ViewportState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn world_to_screen(&self, p: Point) -> Point {
        world_to_screen(p, self.translate, self.scale)
    }

    pub fn screen_to_world(&self, p: Point) -> Point {
        screen_to_world(p, self.translate, self.scale)
    }

    /// World-to-screen transform for the rendering layer.
    pub fn transform(&self) -> Affine {
        Affine::translate(self.translate) * Affine::scale(self.scale)
    }

    /// Visible world rectangle for a viewport of `size` pixels.
    pub fn visible_world_rect(&self, size: Size) -> Rect {
        Rect::from_points(
            self.screen_to_world(Point::ZERO),
            self.screen_to_world(Point::new(size.width, size.height)),
        )
    }

    pub fn is_panning(&self) -> bool {
        self.mode != ViewportMode::Idle
    }

    pub fn snapshot(&self) -> ViewportSnapshot {
        ViewportSnapshot {
            scale: self.scale,
            translate: self.translate,
        }
    }

    /// Compute the next state for `action`.
    pub fn reduce(&self, action: ViewportAction, config: &ViewportConfig) -> Self {
        match action {
            ViewportAction::PanStart { screen, kind } => {
                let anchor = PanAnchor {
                    start_screen: screen,
                    start_translate: self.translate,
                };
                let mode = match kind {
                    PanKind::Normal => ViewportMode::Panning(anchor),
                    PanKind::Shift => ViewportMode::ShiftPanning(anchor),
                };
                Self { mode, ..*self }
            }
            ViewportAction::PanMove { screen } => match self.mode.anchor() {
                Some(anchor) => Self {
                    translate: anchor.start_translate + (screen - anchor.start_screen),
                    ..*self
                },
                None => *self,
            },
            ViewportAction::PanEnd => Self {
                mode: ViewportMode::Idle,
                ..*self
            },
            ViewportAction::WheelPan { dx, dy } => Self {
                translate: self.translate + Vec2::new(dx, dy) * config.wheel_pan_speed,
                ..*self
            },
            ViewportAction::WheelZoom { delta_y, origin } => {
                let sensitivity = if delta_y.abs() < config.trackpad_delta_threshold {
                    config.trackpad_sensitivity
                } else {
                    config.mouse_sensitivity
                };
                let factor = config.zoom_step.powf(-delta_y * sensitivity);
                self.zoom_around(self.scale * factor, origin, config)
            }
            ViewportAction::ZoomIn => Self {
                scale: config.clamp_scale(self.scale * config.button_zoom_factor),
                ..*self
            },
            ViewportAction::ZoomOut => Self {
                scale: config.clamp_scale(self.scale / config.button_zoom_factor),
                ..*self
            },
            ViewportAction::CenterOnWorld { world, screen } => Self {
                translate: screen.to_vec2() - world.to_vec2() * self.scale,
                ..*self
            },
            ViewportAction::ZoomToFit {
                bounds,
                viewport,
                padding,
            } => self.fit(bounds, viewport, padding, config),
            ViewportAction::RestoreViewport { scale, translate } => Self {
                scale: config.clamp_scale(scale),
                translate,
                mode: ViewportMode::Idle,
            },
        }
    }

    /// Change the scale while keeping the world point under `origin` fixed.
    fn zoom_around(&self, scale: f64, origin: Point, config: &ViewportConfig) -> Self {
        let scale = config.clamp_scale(scale);
        let world = self.screen_to_world(origin);
        Self {
            scale,
            translate: origin.to_vec2() - world.to_vec2() * scale,
            ..*self
        }
    }

    fn fit(&self, bounds: Rect, viewport: Size, padding: f64, config: &ViewportConfig) -> Self {
        let available = Size::new(
            (viewport.width - 2.0 * padding).max(1.0),
            (viewport.height - 2.0 * padding).max(1.0),
        );
        let bounds = bounds.abs();

        // Degenerate axes don't constrain the scale.
        let candidates = [
            (bounds.width() > 0.0).then(|| available.width / bounds.width()),
            (bounds.height() > 0.0).then(|| available.height / bounds.height()),
        ];
        let scale = candidates
            .into_iter()
            .flatten()
            .reduce(f64::min)
            .map_or(self.scale, |s| config.clamp_scale(s));

        let viewport_center = Vec2::new(viewport.width / 2.0, viewport.height / 2.0);
        Self {
            scale,
            translate: viewport_center - bounds.center().to_vec2() * scale,
            ..*self
        }
    }
}
