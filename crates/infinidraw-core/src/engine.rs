//! Engine façade for the rendering layer.
//!
//! [`CanvasEngine`] owns the [`CanvasState`] and the [`InteractionController`],
//! converts client coordinates to screen coordinates, runs UI commands
//! received over a typed channel, and tracks a revision counter that
//! persistence observes.

use crate::canvas::{CanvasDocument, CanvasState};
use crate::config::EngineConfig;
use crate::input::{Instant, KeyInput, PointerEvent, PointerInput, WheelInput};
use crate::interaction::{InteractionController, ResizeSignal};
use crate::selection::{Corner, SelectionMap, resize_frame_bounds};
use crate::shapes::{Shape, ShapeId, ShapePatch, TextMeasure};
use crate::store::EntityState;
use crate::tools::{Draft, DraftShape, ToolKind};
use crate::viewport::{ViewportAction, ViewportSnapshot, ViewportState};
use kurbo::{Point, Size};
use std::sync::mpsc::{Receiver, Sender, channel};

#[cfg(not(target_arch = "wasm32"))]
use std::time::{SystemTime, UNIX_EPOCH};
#[cfg(target_arch = "wasm32")]
use web_time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time as Unix milliseconds.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// High-level UI commands from the rendering layer.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SelectTool(ToolKind),
    ApplyPatchToSelection(ShapePatch),
    Reorder { id: ShapeId, index: usize },
    BringToFront(ShapeId),
    SendToBack(ShapeId),
    BringForward(ShapeId),
    SendBackward(ShapeId),
    DeleteSelection,
    SelectAll,
    Undo,
    Redo,
    ZoomIn,
    ZoomOut,
    ZoomToContent,
    /// Resize-handle stream; `Move` positions are client coordinates.
    Resize(ResizeSignal),
}

/// Everything the renderer needs to paint one frame.
#[derive(Debug, Clone)]
pub struct RenderSnapshot {
    pub viewport: ViewportState,
    pub shapes: EntityState<Shape>,
    pub selection: SelectionMap,
    pub draft: Option<DraftShape>,
    pub freehand: Vec<Point>,
    pub tool: ToolKind,
    pub captured_pointer: Option<u32>,
    pub revision: u64,
}

/// The persisted fields, compared after every event.
#[derive(Debug, Clone)]
struct Fingerprint {
    shapes: EntityState<Shape>,
    selected: SelectionMap,
    tool: ToolKind,
    frame_counter: u32,
    viewport: ViewportSnapshot,
}

impl Fingerprint {
    fn of(state: &CanvasState) -> Self {
        Self {
            shapes: state.shapes().clone(),
            selected: state.selection().clone(),
            tool: state.tool(),
            frame_counter: state.frame_counter(),
            viewport: state.viewport.snapshot(),
        }
    }

    fn matches(&self, state: &CanvasState) -> bool {
        self.shapes.ptr_eq(state.shapes())
            && self.tool == state.tool()
            && self.frame_counter == state.frame_counter()
            && &self.selected == state.selection()
            && self.viewport == state.viewport.snapshot()
    }
}

pub struct CanvasEngine {
    config: EngineConfig,
    state: CanvasState,
    controller: InteractionController,
    /// Client-space position of the viewport's top-left corner.
    origin: Point,
    size: Size,
    revision: u64,
    last_modified: i64,
    fingerprint: Fingerprint,
    commands_tx: Sender<Command>,
    commands_rx: Receiver<Command>,
}

impl std::fmt::Debug for CanvasEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CanvasEngine")
            .field("state", &self.state)
            .field("controller", &self.controller)
            .field("origin", &self.origin)
            .field("size", &self.size)
            .field("revision", &self.revision)
            .finish_non_exhaustive()
    }
}

impl CanvasEngine {
    pub fn new(config: EngineConfig) -> Self {
        let controller = InteractionController::new(&config);
        Self::build(config, CanvasState::new(), controller)
    }

    /// Use a renderer-provided text measurer instead of the built-in metrics.
    pub fn with_measurer(config: EngineConfig, measurer: Box<dyn TextMeasure>) -> Self {
        let controller = InteractionController::with_measurer(&config, measurer);
        Self::build(config, CanvasState::new(), controller)
    }

    fn build(config: EngineConfig, state: CanvasState, controller: InteractionController) -> Self {
        let (commands_tx, commands_rx) = channel();
        Self {
            fingerprint: Fingerprint::of(&state),
            config,
            state,
            controller,
            origin: Point::ZERO,
            size: Size::ZERO,
            revision: 0,
            last_modified: 0,
            commands_tx,
            commands_rx,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> &CanvasState {
        &self.state
    }

    pub fn controller(&self) -> &InteractionController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut InteractionController {
        &mut self.controller
    }

    /// Bumped whenever a persisted field changes.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn last_modified(&self) -> i64 {
        self.last_modified
    }

    /// Place the viewport element: client-space origin and pixel size.
    pub fn set_viewport_rect(&mut self, origin: Point, size: Size) {
        self.origin = origin;
        self.size = size;
    }

    pub fn viewport_size(&self) -> Size {
        self.size
    }

    pub fn client_to_screen(&self, client: Point) -> Point {
        client - self.origin.to_vec2()
    }

    fn to_screen(&self, input: &PointerInput) -> PointerInput {
        PointerInput {
            position: self.client_to_screen(input.position),
            ..*input
        }
    }

    /// Dispatch a pointer event carrying client coordinates.
    pub fn handle_pointer(&mut self, event: PointerEvent, now: Instant) {
        match event {
            PointerEvent::Down(input) => {
                let input = self.to_screen(&input);
                self.controller.pointer_down(&mut self.state, &input, now);
            }
            PointerEvent::Move(input) => {
                let input = self.to_screen(&input);
                self.controller.pointer_move(&mut self.state, &input, now);
            }
            PointerEvent::Up(input) => {
                let input = self.to_screen(&input);
                self.controller.pointer_up(&mut self.state, &input, now);
            }
            PointerEvent::Cancel(input) => {
                let input = self.to_screen(&input);
                self.controller.pointer_cancel(&mut self.state, &input, now);
            }
        }
        self.track_changes();
    }

    pub fn handle_wheel(&mut self, input: WheelInput) {
        let input = WheelInput {
            position: self.client_to_screen(input.position),
            ..input
        };
        self.controller.wheel(&mut self.state, &input);
        self.track_changes();
    }

    /// Returns whether the key was consumed.
    pub fn handle_key(&mut self, key: &KeyInput) -> bool {
        let handled = self.controller.key_down(&mut self.state, key);
        self.track_changes();
        handled
    }

    /// Start a resize drag on `id`, deriving the initial bounds from the shape.
    pub fn begin_resize(&mut self, id: &str, corner: Corner) {
        let Some(shape) = self.state.get_shape(id) else {
            return;
        };
        let initial_bounds = resize_frame_bounds(shape, self.config.interaction.resize_inset);
        self.execute(Command::Resize(ResizeSignal::Start {
            shape_id: id.to_string(),
            corner,
            initial_bounds,
        }));
    }

    /// A sender that other components can use to queue commands.
    pub fn command_sender(&self) -> Sender<Command> {
        self.commands_tx.clone()
    }

    /// Run every queued command. Returns how many ran.
    pub fn process_commands(&mut self) -> usize {
        let mut count = 0;
        while let Ok(command) = self.commands_rx.try_recv() {
            self.execute(command);
            count += 1;
        }
        count
    }

    /// Run one command immediately.
    pub fn execute(&mut self, command: Command) {
        log::debug!("command: {command:?}");
        let viewport_config = self.config.viewport.clone();
        match command {
            Command::SelectTool(tool) => self.controller.set_tool(&mut self.state, tool),
            Command::ApplyPatchToSelection(patch) => {
                if !self.state.selection().is_empty() {
                    self.state.begin_change();
                    let measurer = self.controller.measurer();
                    self.state.apply_patch_to_selection(&patch, measurer);
                    self.state.commit_change();
                }
            }
            Command::Reorder { id, index } => self.with_undo(|s| s.reorder(&id, index)),
            Command::BringToFront(id) => self.with_undo(|s| s.bring_to_front(&id)),
            Command::SendToBack(id) => self.with_undo(|s| s.send_to_back(&id)),
            Command::BringForward(id) => self.with_undo(|s| s.bring_forward(&id)),
            Command::SendBackward(id) => self.with_undo(|s| s.send_backward(&id)),
            Command::DeleteSelection => self.with_undo(|s| {
                s.delete_selection();
            }),
            Command::SelectAll => self.state.select_all(),
            Command::Undo => {
                self.state.undo();
            }
            Command::Redo => {
                self.state.redo();
            }
            Command::ZoomIn => self.state.apply_viewport(ViewportAction::ZoomIn, &viewport_config),
            Command::ZoomOut => self.state.apply_viewport(ViewportAction::ZoomOut, &viewport_config),
            Command::ZoomToContent => {
                if let Some(bounds) = self.state.bounds() {
                    let action = ViewportAction::ZoomToFit {
                        bounds,
                        viewport: self.size,
                        padding: viewport_config.fit_padding,
                    };
                    self.state.apply_viewport(action, &viewport_config);
                }
            }
            Command::Resize(signal) => {
                let signal = match signal {
                    ResizeSignal::Move { position } => ResizeSignal::Move {
                        position: self.client_to_screen(position),
                    },
                    other => other,
                };
                self.controller.resize(&mut self.state, signal);
            }
        }
        self.track_changes();
    }

    fn with_undo(&mut self, f: impl FnOnce(&mut CanvasState)) {
        self.state.begin_change();
        f(&mut self.state);
        self.state.commit_change();
    }

    /// Animation-frame tick: drain commands and release coalesced updates.
    pub fn tick(&mut self) -> bool {
        self.process_commands();
        self.controller.flush_frame(&mut self.state);
        self.track_changes();
        self.controller.take_render_request()
    }

    fn track_changes(&mut self) {
        if self.fingerprint.matches(&self.state) {
            return;
        }
        self.fingerprint = Fingerprint::of(&self.state);
        self.revision += 1;
        self.last_modified = now_millis().max(self.last_modified + 1);
    }

    pub fn render_snapshot(&self) -> RenderSnapshot {
        let draft = self.controller.draft();
        RenderSnapshot {
            viewport: self.state.viewport,
            shapes: self.state.shapes().clone(),
            selection: self.state.selection().clone(),
            draft: draft.and_then(Draft::shape).cloned(),
            freehand: draft.map(|d| d.freehand_points().to_vec()).unwrap_or_default(),
            tool: self.state.tool(),
            captured_pointer: self.controller.captured_pointer(),
            revision: self.revision,
        }
    }

    /// The persisted form of the current state.
    pub fn document(&self) -> CanvasDocument {
        self.state
            .to_document(&self.config.sync.document_version, self.last_modified)
    }

    /// Replace the current state with a loaded document. History is cleared.
    pub fn load_document(&mut self, document: &CanvasDocument) {
        log::info!(
            "loading document with {} shapes (v{})",
            document.shapes.len(),
            document.version
        );
        self.state = CanvasState::from_document(document, &self.config.viewport);
        self.last_modified = document.last_modified;
        self.fingerprint = Fingerprint::of(&self.state);
        self.revision += 1;
    }
}
