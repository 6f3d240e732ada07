//! Pointer, wheel and keyboard gesture state machine.
//!
//! Exactly one [`Gesture`] is live at a time. The controller reads the
//! viewport to map screen points into world space, asks the hit tester what
//! is under the pointer, and writes results into [`CanvasState`].

use crate::canvas::CanvasState;
use crate::config::{EngineConfig, InteractionConfig, TextConfig, ViewportConfig};
use crate::hit_test::{HitOptions, get_shape_at_point};
use crate::input::{Instant, KeyInput, MouseButton, PointerInput, WheelInput};
use crate::selection::{Corner, resize_bounds, resize_patch};
use crate::shapes::{
    ApproximateMetrics, Shape, ShapeGeometry, ShapeId, StyleOverrides, TextMeasure, create_text,
};
use crate::tools::{Draft, ToolKind};
use crate::viewport::{PanKind, ViewportAction};
use kurbo::{Point, Rect};
use std::collections::HashSet;
use std::time::Duration;

/// The active gesture.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Gesture {
    #[default]
    Idle,
    /// Viewport pan; the anchor lives in the viewport state.
    Panning,
    Drawing(Draft),
    Moving {
        start_world: Point,
        /// Pre-move geometry of every selected shape.
        originals: Vec<(ShapeId, ShapeGeometry)>,
    },
    Erasing {
        /// Shapes already removed during this drag.
        visited: HashSet<ShapeId>,
    },
    Resizing {
        shape_id: ShapeId,
        corner: Corner,
        initial_bounds: Rect,
        /// The shape as it was when the drag started.
        original: Shape,
    },
}

/// Resize-handle drag stream from the rendering layer.
#[derive(Debug, Clone, PartialEq)]
pub enum ResizeSignal {
    Start {
        shape_id: ShapeId,
        corner: Corner,
        initial_bounds: Rect,
    },
    /// Pointer position (screen coordinates once it reaches the controller).
    Move { position: Point },
    End,
}

/// Keeps only the latest value and releases at most one per interval.
#[derive(Debug, Clone)]
pub struct FrameCoalescer<T> {
    pending: Option<T>,
    last_flush: Option<Instant>,
    interval: Duration,
}

impl<T> FrameCoalescer<T> {
    pub fn new(interval: Duration) -> Self {
        Self {
            pending: None,
            last_flush: None,
            interval,
        }
    }

    /// Queue `value`. Returns the latest value if an interval has elapsed since the last release.
    pub fn push(&mut self, value: T, now: Instant) -> Option<T> {
        self.pending = Some(value);
        let due = self
            .last_flush
            .is_none_or(|last| now.saturating_duration_since(last) >= self.interval);
        if due {
            self.last_flush = Some(now);
            self.pending.take()
        } else {
            None
        }
    }

    /// Release whatever is pending, regardless of timing.
    pub fn flush(&mut self) -> Option<T> {
        self.pending.take()
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn reset(&mut self) {
        self.pending = None;
        self.last_flush = None;
    }
}

fn hit_options(config: &InteractionConfig, scale: f64) -> HitOptions {
    HitOptions {
        tolerance: config.hit_tolerance_px / scale,
        text_padding: config.text_hit_padding,
        allow_bounds_fallback: config.allow_bounds_fallback,
    }
}

fn hit_id(state: &CanvasState, config: &InteractionConfig, world: Point) -> Option<ShapeId> {
    let options = hit_options(config, state.viewport.scale);
    get_shape_at_point(world, state.shapes(), &options).map(|s| s.id().to_string())
}

/// Drives gestures from raw input.
pub struct InteractionController {
    config: InteractionConfig,
    viewport_config: ViewportConfig,
    text_config: TextConfig,
    /// Style applied to newly drawn shapes.
    pub current_style: StyleOverrides,
    measurer: Box<dyn TextMeasure>,
    gesture: Gesture,
    captured_pointer: Option<u32>,
    pan_coalescer: FrameCoalescer<Point>,
    render_coalescer: FrameCoalescer<()>,
    render_requested: bool,
}

impl std::fmt::Debug for InteractionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InteractionController")
            .field("gesture", &self.gesture)
            .field("captured_pointer", &self.captured_pointer)
            .field("current_style", &self.current_style)
            .finish_non_exhaustive()
    }
}

impl InteractionController {
    pub fn new(config: &EngineConfig) -> Self {
        Self::with_measurer(config, Box::new(ApproximateMetrics))
    }

    /// Use a renderer-provided text measurer.
    pub fn with_measurer(config: &EngineConfig, measurer: Box<dyn TextMeasure>) -> Self {
        let interval = config.interaction.frame_interval();
        Self {
            config: config.interaction.clone(),
            viewport_config: config.viewport.clone(),
            text_config: config.text.clone(),
            current_style: StyleOverrides::default(),
            measurer,
            gesture: Gesture::Idle,
            captured_pointer: None,
            pan_coalescer: FrameCoalescer::new(interval),
            render_coalescer: FrameCoalescer::new(interval),
            render_requested: false,
        }
    }

    pub fn gesture(&self) -> &Gesture {
        &self.gesture
    }

    pub fn is_idle(&self) -> bool {
        self.gesture == Gesture::Idle
    }

    pub fn draft(&self) -> Option<&Draft> {
        match &self.gesture {
            Gesture::Drawing(draft) => Some(draft),
            _ => None,
        }
    }

    pub fn captured_pointer(&self) -> Option<u32> {
        self.captured_pointer
    }

    pub fn measurer(&self) -> &dyn TextMeasure {
        self.measurer.as_ref()
    }

    /// Whether a redraw was requested since the last call.
    pub fn take_render_request(&mut self) -> bool {
        std::mem::take(&mut self.render_requested)
    }

    /// Switch tools, abandoning any draft in progress.
    pub fn set_tool(&mut self, state: &mut CanvasState, tool: ToolKind) {
        if matches!(self.gesture, Gesture::Drawing(_)) {
            log::debug!("discarding draft on tool change");
            self.gesture = Gesture::Idle;
            self.captured_pointer = None;
        }
        state.set_tool(tool);
        self.render_requested = true;
    }

    fn is_pan_trigger(input: &PointerInput) -> bool {
        match input.button {
            MouseButton::Middle | MouseButton::Right => true,
            MouseButton::Left => input.modifiers.shift,
        }
    }

    fn owns_pointer(&self, input: &PointerInput) -> bool {
        self.captured_pointer.is_none_or(|id| id == input.pointer_id)
    }

    /// Pointer pressed at `input.position` (screen coordinates).
    pub fn pointer_down(&mut self, state: &mut CanvasState, input: &PointerInput, _now: Instant) {
        if !self.is_idle() {
            return;
        }
        let screen = input.position;

        if Self::is_pan_trigger(input) {
            let kind = if input.button == MouseButton::Left {
                PanKind::Shift
            } else {
                PanKind::Normal
            };
            state.apply_viewport(ViewportAction::PanStart { screen, kind }, &self.viewport_config);
            self.pan_coalescer.reset();
            self.begin(Gesture::Panning, input);
            return;
        }

        let world = state.viewport.screen_to_world(screen);
        let shift = input.modifiers.shift;
        match state.tool() {
            ToolKind::Select => match hit_id(state, &self.config, world) {
                Some(id) => {
                    if !state.is_selected(&id) {
                        if shift {
                            state.add_to_selection(&id);
                        } else {
                            state.select(&id);
                        }
                    }
                    state.begin_change();
                    let originals = state
                        .selected_ids()
                        .into_iter()
                        .filter_map(|id| {
                            let geometry = state.get_shape(&id)?.geometry();
                            Some((id, geometry))
                        })
                        .collect();
                    self.begin(
                        Gesture::Moving {
                            start_world: world,
                            originals,
                        },
                        input,
                    );
                }
                None => {
                    if !shift {
                        state.clear_selection();
                    }
                }
            },
            ToolKind::Eraser => {
                state.begin_change();
                let mut visited = HashSet::new();
                if let Some(id) = hit_id(state, &self.config, world) {
                    state.remove_shape(&id);
                    visited.insert(id);
                }
                self.begin(Gesture::Erasing { visited }, input);
            }
            ToolKind::Text => {
                let shape = create_text(
                    world,
                    "",
                    self.text_config.typography(),
                    self.measurer.as_ref(),
                );
                let id = shape.id().to_string();
                state.push_undo();
                state.add_shape(shape);
                state.set_tool(ToolKind::Select);
                state.select(&id);
            }
            tool => {
                if let Some(draft) = Draft::begin(tool, world) {
                    self.begin(Gesture::Drawing(draft), input);
                }
            }
        }
        self.render_requested = true;
    }

    fn begin(&mut self, gesture: Gesture, input: &PointerInput) {
        log::debug!("gesture start: {:?}", std::mem::discriminant(&gesture));
        self.gesture = gesture;
        self.captured_pointer = Some(input.pointer_id);
    }

    /// Pointer moved to `input.position` (screen coordinates).
    pub fn pointer_move(&mut self, state: &mut CanvasState, input: &PointerInput, now: Instant) {
        if !self.owns_pointer(input) {
            return;
        }
        let screen = input.position;
        let world = state.viewport.screen_to_world(screen);

        match &mut self.gesture {
            Gesture::Idle | Gesture::Resizing { .. } => {}
            Gesture::Panning => {
                if let Some(latest) = self.pan_coalescer.push(screen, now) {
                    state.apply_viewport(
                        ViewportAction::PanMove { screen: latest },
                        &self.viewport_config,
                    );
                    self.render_requested = true;
                }
            }
            Gesture::Moving {
                start_world,
                originals,
            } => {
                let delta = world - *start_world;
                let patches = originals
                    .iter()
                    .map(|(id, geometry)| (id.as_str(), geometry.translated_patch(delta)));
                state.update_shapes(patches, self.measurer.as_ref());
                self.render_requested = true;
            }
            Gesture::Erasing { visited } => {
                if let Some(id) = hit_id(state, &self.config, world)
                    && visited.insert(id.clone())
                {
                    state.remove_shape(&id);
                    self.render_requested = true;
                }
            }
            Gesture::Drawing(draft) => {
                draft.update(world);
                match draft {
                    Draft::Freehand(_) => {
                        if self.render_coalescer.push((), now).is_some() {
                            self.render_requested = true;
                        }
                    }
                    Draft::Shape(_) => self.render_requested = true,
                }
            }
        }
    }

    /// Pointer released: finalize the gesture.
    pub fn pointer_up(&mut self, state: &mut CanvasState, input: &PointerInput, _now: Instant) {
        if !self.owns_pointer(input) {
            return;
        }
        let gesture = std::mem::take(&mut self.gesture);
        match gesture {
            Gesture::Idle => {}
            Gesture::Panning => {
                if let Some(latest) = self.pan_coalescer.flush() {
                    state.apply_viewport(
                        ViewportAction::PanMove { screen: latest },
                        &self.viewport_config,
                    );
                }
                state.apply_viewport(ViewportAction::PanEnd, &self.viewport_config);
            }
            Gesture::Drawing(draft) => {
                self.render_coalescer.reset();
                match draft.commit(&self.config, &self.current_style, state.next_frame_number()) {
                    Some(shape) => {
                        state.push_undo();
                        state.add_shape(shape);
                    }
                    None => log::debug!("draft too small, discarded"),
                }
            }
            Gesture::Moving { .. } | Gesture::Erasing { .. } | Gesture::Resizing { .. } => {
                state.commit_change();
            }
        }
        self.captured_pointer = None;
        self.render_requested = true;
    }

    /// Cancellation finalizes exactly like a release.
    pub fn pointer_cancel(&mut self, state: &mut CanvasState, input: &PointerInput, now: Instant) {
        self.pointer_up(state, input, now);
    }

    /// Wheel: ctrl/cmd zooms around the pointer, otherwise pans (shift swaps axes).
    pub fn wheel(&mut self, state: &mut CanvasState, input: &WheelInput) {
        let action = if input.modifiers.command() {
            ViewportAction::WheelZoom {
                delta_y: input.delta.y,
                origin: input.position,
            }
        } else {
            let (dx, dy) = if input.modifiers.shift {
                (input.delta.y, input.delta.x)
            } else {
                (input.delta.x, input.delta.y)
            };
            ViewportAction::WheelPan { dx: -dx, dy: -dy }
        };
        state.apply_viewport(action, &self.viewport_config);
        self.render_requested = true;
    }

    /// Keyboard shortcuts. Returns whether the key was handled.
    pub fn key_down(&mut self, state: &mut CanvasState, key: &KeyInput) -> bool {
        let command = key.modifiers.command();

        if key.is("Escape") {
            if matches!(self.gesture, Gesture::Drawing(_)) {
                self.gesture = Gesture::Idle;
                self.captured_pointer = None;
            }
            state.clear_selection();
            self.render_requested = true;
            return true;
        }
        if !self.is_idle() {
            return false;
        }

        let handled = match key.char() {
            Some('z') if command => {
                if key.modifiers.shift {
                    state.redo()
                } else {
                    state.undo()
                }
            }
            Some('y') if command => state.redo(),
            Some('a') if command => {
                state.select_all();
                true
            }
            Some(c) if !command && !key.modifiers.alt => match ToolKind::from_shortcut(c) {
                Some(tool) => {
                    self.set_tool(state, tool);
                    true
                }
                None => false,
            },
            _ if key.is("Delete") || key.is("Backspace") => {
                if state.selection().is_empty() {
                    false
                } else {
                    state.push_undo();
                    state.delete_selection();
                    true
                }
            }
            _ => false,
        };
        if handled {
            self.render_requested = true;
        }
        handled
    }

    /// Resize-handle drag. `Move` positions are screen coordinates.
    pub fn resize(&mut self, state: &mut CanvasState, signal: ResizeSignal) {
        match signal {
            ResizeSignal::Start {
                shape_id,
                corner,
                initial_bounds,
            } => {
                if !self.is_idle() {
                    return;
                }
                let Some(original) = state.get_shape(&shape_id).cloned() else {
                    log::warn!("resize requested for unknown shape {shape_id}");
                    return;
                };
                state.begin_change();
                log::debug!("resize start on {shape_id} at {corner:?}");
                self.gesture = Gesture::Resizing {
                    shape_id,
                    corner,
                    initial_bounds,
                    original,
                };
            }
            ResizeSignal::Move { position } => {
                let Gesture::Resizing {
                    corner,
                    initial_bounds,
                    original,
                    ..
                } = &self.gesture
                else {
                    return;
                };
                let world = state.viewport.screen_to_world(position);
                let bounds =
                    resize_bounds(*initial_bounds, *corner, world, self.config.min_resize_size);
                let patch = resize_patch(original, *initial_bounds, bounds, self.config.resize_inset);
                // Merge into the pre-drag shape so rescaling never compounds
                let resized = original.merged(&patch, self.measurer.as_ref());
                state.replace_shape(resized);
                self.render_requested = true;
            }
            ResizeSignal::End => {
                if matches!(self.gesture, Gesture::Resizing { .. }) {
                    self.gesture = Gesture::Idle;
                    state.commit_change();
                    self.render_requested = true;
                }
            }
        }
    }

    /// Animation-frame tick: apply coalesced pan and freehand redraws.
    pub fn flush_frame(&mut self, state: &mut CanvasState) {
        if let Some(latest) = self.pan_coalescer.flush() {
            state.apply_viewport(ViewportAction::PanMove { screen: latest }, &self.viewport_config);
            self.render_requested = true;
        }
        if self.render_coalescer.flush().is_some() {
            self.render_requested = true;
        }
    }
}
