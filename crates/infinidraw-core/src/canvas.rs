//! Canvas state and the persisted document.

use crate::config::ViewportConfig;
use crate::selection::SelectionMap;
use crate::shapes::{Shape, ShapePatch, TextMeasure};
use crate::store::EntityState;
use crate::tools::ToolKind;
use crate::viewport::{ViewportAction, ViewportSnapshot, ViewportState};
use kurbo::Rect;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Maximum number of undo states to keep.
const MAX_UNDO_HISTORY: usize = 50;

/// Schema version written into new documents.
pub const DOCUMENT_VERSION: &str = "1.0.0";

/// The persisted form of a canvas, shared by the local cache and the remote store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasDocument {
    pub viewport: ViewportSnapshot,
    pub shapes: EntityState<Shape>,
    #[serde(default)]
    pub tool: ToolKind,
    #[serde(default)]
    pub selected: SelectionMap,
    #[serde(default)]
    pub frame_counter: u32,
    pub version: String,
    /// Unix timestamp in milliseconds.
    pub last_modified: i64,
}

impl Default for CanvasDocument {
    fn default() -> Self {
        Self {
            viewport: ViewportSnapshot::default(),
            shapes: EntityState::new(),
            tool: ToolKind::default(),
            selected: SelectionMap::new(),
            frame_counter: 0,
            version: DOCUMENT_VERSION.to_string(),
            last_modified: 0,
        }
    }
}

impl CanvasDocument {
    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON. Fails if the shape collection is inconsistent.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// A snapshot of shape state for undo/redo. Cheap: the collection is shared.
#[derive(Debug, Clone)]
struct HistoryEntry {
    shapes: EntityState<Shape>,
    frame_counter: u32,
}

/// Live canvas state: shapes, selection, viewport, tool and history.
#[derive(Debug, Clone, Default)]
pub struct CanvasState {
    pub viewport: ViewportState,
    shapes: EntityState<Shape>,
    selected: SelectionMap,
    tool: ToolKind,
    frame_counter: u32,
    undo_stack: VecDeque<HistoryEntry>,
    redo_stack: Vec<HistoryEntry>,
    /// Snapshot taken by `begin_change`, pushed only if something changed.
    pending: Option<HistoryEntry>,
}

impl CanvasState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore state from a persisted document.
    pub fn from_document(document: &CanvasDocument, config: &ViewportConfig) -> Self {
        let viewport = ViewportState::new().reduce(
            ViewportAction::RestoreViewport {
                scale: document.viewport.scale,
                translate: document.viewport.translate,
            },
            config,
        );
        let mut selected = document.selected.clone();
        selected.retain_existing(&document.shapes);
        Self {
            viewport,
            shapes: document.shapes.clone(),
            selected,
            tool: document.tool,
            frame_counter: document.frame_counter,
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            pending: None,
        }
    }

    pub fn to_document(&self, version: &str, last_modified: i64) -> CanvasDocument {
        CanvasDocument {
            viewport: self.viewport.snapshot(),
            shapes: self.shapes.clone(),
            tool: self.tool,
            selected: self.selected.clone(),
            frame_counter: self.frame_counter,
            version: version.to_string(),
            last_modified,
        }
    }

    pub fn shapes(&self) -> &EntityState<Shape> {
        &self.shapes
    }

    pub fn get_shape(&self, id: &str) -> Option<&Shape> {
        self.shapes.get(id)
    }

    pub fn tool(&self) -> ToolKind {
        self.tool
    }

    pub fn set_tool(&mut self, tool: ToolKind) {
        self.tool = tool;
    }

    pub fn frame_counter(&self) -> u32 {
        self.frame_counter
    }

    /// Display number for the next Frame.
    pub fn next_frame_number(&self) -> u32 {
        self.frame_counter + 1
    }

    pub fn apply_viewport(&mut self, action: ViewportAction, config: &ViewportConfig) {
        self.viewport = self.viewport.reduce(action, config);
    }

    /// Add a shape on top. Frames bump the frame counter.
    pub fn add_shape(&mut self, shape: Shape) {
        if shape.is_frame() {
            self.frame_counter += 1;
        }
        log::debug!("adding {:?} {}", shape.kind(), shape.id());
        self.shapes = self.shapes.add(shape);
    }

    /// Remove a shape. Any Frame removal decrements the frame counter.
    pub fn remove_shape(&mut self, id: &str) -> bool {
        let Some(shape) = self.shapes.get(id) else {
            return false;
        };
        if shape.is_frame() {
            self.frame_counter = self.frame_counter.saturating_sub(1);
        }
        self.shapes = self.shapes.remove(id);
        self.selected.remove(id);
        true
    }

    /// Remove several shapes. Returns how many existed.
    pub fn remove_shapes<I, S>(&mut self, ids: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        ids.into_iter()
            .filter(|id| self.remove_shape(id.as_ref()))
            .count()
    }

    pub fn update_shape(&mut self, id: &str, patch: &ShapePatch, measurer: &dyn TextMeasure) {
        self.shapes = self
            .shapes
            .update_with(id, |shape| shape.merged(patch, measurer));
    }

    /// Merge a patch into each listed shape as one snapshot. Unknown ids are skipped.
    pub fn update_shapes<I, S>(&mut self, patches: I, measurer: &dyn TextMeasure)
    where
        I: IntoIterator<Item = (S, ShapePatch)>,
        S: AsRef<str>,
    {
        self.shapes = self
            .shapes
            .update_many(patches, |shape, patch| shape.merged(&patch, measurer));
    }

    /// Overwrite an existing shape, keeping its z-position.
    pub fn replace_shape(&mut self, shape: Shape) {
        if self.shapes.contains(shape.id()) {
            self.shapes = self.shapes.add(shape);
        }
    }

    /// Remove every shape and reset the frame counter.
    pub fn clear(&mut self) {
        self.shapes = self.shapes.remove_all();
        self.selected.clear();
        self.frame_counter = 0;
    }

    pub fn selection(&self) -> &SelectionMap {
        &self.selected
    }

    /// Replace the selection with a single shape.
    pub fn select(&mut self, id: &str) {
        self.selected = SelectionMap::single(id);
    }

    pub fn add_to_selection(&mut self, id: &str) {
        if self.shapes.contains(id) {
            self.selected.insert(id);
        }
    }

    pub fn clear_selection(&mut self) {
        self.selected.clear();
    }

    pub fn select_all(&mut self) {
        self.selected = self.shapes.ids().iter().cloned().collect();
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selected.contains(id)
    }

    /// Selected ids that still exist, in z-order.
    pub fn selected_ids(&self) -> Vec<String> {
        self.shapes
            .ids()
            .iter()
            .filter(|id| self.selected.contains(id))
            .cloned()
            .collect()
    }

    /// Delete every selected shape. Returns how many were removed.
    pub fn delete_selection(&mut self) -> usize {
        let ids = self.selected_ids();
        let removed = self.remove_shapes(&ids);
        self.selected.clear();
        removed
    }

    pub fn apply_patch_to_selection(&mut self, patch: &ShapePatch, measurer: &dyn TextMeasure) {
        let ids = self.selected_ids();
        self.update_shapes(ids.into_iter().map(|id| (id, patch.clone())), measurer);
    }

    /// Move a shape to `index` in the z-order.
    pub fn reorder(&mut self, id: &str, index: usize) {
        self.shapes = self.shapes.reorder(id, index);
    }

    pub fn bring_to_front(&mut self, id: &str) {
        self.shapes = self.shapes.bring_to_front(id);
    }

    pub fn send_to_back(&mut self, id: &str) {
        self.shapes = self.shapes.send_to_back(id);
    }

    pub fn bring_forward(&mut self, id: &str) {
        self.shapes = self.shapes.bring_forward(id);
    }

    pub fn send_backward(&mut self, id: &str) {
        self.shapes = self.shapes.send_backward(id);
    }

    /// Union of all shape bounds.
    pub fn bounds(&self) -> Option<Rect> {
        self.shapes
            .iter()
            .map(Shape::bounds)
            .reduce(|acc, b| acc.union(b))
    }

    fn history_entry(&self) -> HistoryEntry {
        HistoryEntry {
            shapes: self.shapes.clone(),
            frame_counter: self.frame_counter,
        }
    }

    fn restore(&mut self, entry: HistoryEntry) {
        self.shapes = entry.shapes;
        self.frame_counter = entry.frame_counter;
        self.selected.retain_existing(&self.shapes);
    }

    fn record(&mut self, entry: HistoryEntry) {
        self.undo_stack.push_back(entry);
        self.redo_stack.clear();
        if self.undo_stack.len() > MAX_UNDO_HISTORY {
            self.undo_stack.pop_front();
        }
    }

    /// Push current state to undo stack (call before making changes).
    pub fn push_undo(&mut self) {
        let entry = self.history_entry();
        self.record(entry);
    }

    /// Snapshot the current state for a change that may turn out to be a no-op.
    ///
    /// History is untouched until [`commit_change`](Self::commit_change).
    pub fn begin_change(&mut self) {
        self.pending = Some(self.history_entry());
    }

    /// Record the snapshot from [`begin_change`](Self::begin_change) if the
    /// shapes changed since. A no-op change leaves both stacks as they were.
    pub fn commit_change(&mut self) {
        let Some(entry) = self.pending.take() else {
            return;
        };
        if !entry.shapes.ptr_eq(&self.shapes) {
            self.record(entry);
        }
    }

    /// Undo the last change. Returns false if there was nothing to undo.
    pub fn undo(&mut self) -> bool {
        let Some(entry) = self.undo_stack.pop_back() else {
            return false;
        };
        self.redo_stack.push(self.history_entry());
        self.restore(entry);
        true
    }

    /// Redo the last undone change. Returns false if there was nothing to redo.
    pub fn redo(&mut self) -> bool {
        let Some(entry) = self.redo_stack.pop() else {
            return false;
        };
        self.undo_stack.push_back(self.history_entry());
        self.restore(entry);
        true
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::{
        ApproximateMetrics, SerializableColor, StyleOverrides, create_frame, create_rect,
    };
    use kurbo::Vec2;

    fn rect_at(x: f64) -> Shape {
        create_rect(Rect::new(x, 0.0, x + 10.0, 10.0), &StyleOverrides::default())
    }

    fn frame(state: &CanvasState) -> Shape {
        create_frame(
            Rect::new(0.0, 0.0, 100.0, 100.0),
            state.next_frame_number(),
            &StyleOverrides::default(),
        )
    }

    #[test]
    fn test_frame_counter_tracks_frames() {
        let mut state = CanvasState::new();
        let first = frame(&state);
        let first_id = first.id().to_string();
        state.add_shape(first);
        let second = frame(&state);
        assert!(matches!(&second, Shape::Frame(f) if f.number == 2));
        state.add_shape(second);
        state.add_shape(rect_at(0.0));
        assert_eq!(state.frame_counter(), 2);

        // Deleting the older frame still decrements
        state.remove_shape(&first_id);
        assert_eq!(state.frame_counter(), 1);
        assert_eq!(state.next_frame_number(), 2);
    }

    #[test]
    fn test_remove_deselects() {
        let mut state = CanvasState::new();
        let rect = rect_at(0.0);
        let id = rect.id().to_string();
        state.add_shape(rect);
        state.select(&id);
        assert!(state.remove_shape(&id));
        assert!(state.selection().is_empty());
        assert!(!state.remove_shape(&id));
    }

    #[test]
    fn test_select_all_and_delete() {
        let mut state = CanvasState::new();
        state.add_shape(rect_at(0.0));
        state.add_shape(rect_at(20.0));
        state.select_all();
        assert_eq!(state.selection().len(), 2);
        assert_eq!(state.delete_selection(), 2);
        assert!(state.shapes().is_empty());
    }

    #[test]
    fn test_apply_patch_to_selection() {
        let mut state = CanvasState::new();
        let a = rect_at(0.0);
        let b = rect_at(20.0);
        let (a_id, b_id) = (a.id().to_string(), b.id().to_string());
        state.add_shape(a);
        state.add_shape(b);
        state.select(&a_id);

        let patch = ShapePatch {
            fill: Some(Some(SerializableColor::black())),
            ..ShapePatch::default()
        };
        state.apply_patch_to_selection(&patch, &ApproximateMetrics);
        assert!(state.get_shape(&a_id).unwrap().style().unwrap().is_filled());
        assert!(!state.get_shape(&b_id).unwrap().style().unwrap().is_filled());
    }

    #[test]
    fn test_update_shapes_moves_all_at_once() {
        let mut state = CanvasState::new();
        let a = rect_at(0.0);
        let b = rect_at(20.0);
        let c = rect_at(40.0);
        let (a_id, b_id, c_id) = (
            a.id().to_string(),
            b.id().to_string(),
            c.id().to_string(),
        );
        state.add_shape(a);
        state.add_shape(b);
        state.add_shape(c);
        let order = state.shapes().ids().to_vec();

        let patch = |x: f64| ShapePatch {
            x: Some(x),
            y: Some(5.0),
            ..ShapePatch::default()
        };
        state.update_shapes(
            [(a_id.as_str(), patch(100.0)), ("missing", patch(0.0)), (c_id.as_str(), patch(200.0))],
            &ApproximateMetrics,
        );
        assert_eq!(state.get_shape(&a_id).unwrap().bounds(), Rect::new(100.0, 5.0, 110.0, 15.0));
        assert_eq!(state.get_shape(&b_id).unwrap().bounds(), Rect::new(20.0, 0.0, 30.0, 10.0));
        assert_eq!(state.get_shape(&c_id).unwrap().bounds(), Rect::new(200.0, 5.0, 210.0, 15.0));
        assert_eq!(state.shapes().ids(), order.as_slice());
        assert_eq!(state.shapes().len(), 3);
    }

    #[test]
    fn test_undo_redo() {
        let mut state = CanvasState::new();
        state.push_undo();
        state.add_shape(rect_at(0.0));
        assert_eq!(state.shapes().len(), 1);

        assert!(state.undo());
        assert!(state.shapes().is_empty());
        assert!(state.can_redo());

        assert!(state.redo());
        assert_eq!(state.shapes().len(), 1);
        assert!(!state.redo());
    }

    #[test]
    fn test_undo_restores_frame_counter() {
        let mut state = CanvasState::new();
        state.push_undo();
        let f = frame(&state);
        state.add_shape(f);
        assert_eq!(state.frame_counter(), 1);
        state.undo();
        assert_eq!(state.frame_counter(), 0);
    }

    #[test]
    fn test_undo_history_is_bounded() {
        let mut state = CanvasState::new();
        for i in 0..(MAX_UNDO_HISTORY + 10) {
            state.push_undo();
            state.add_shape(rect_at(i as f64 * 20.0));
        }
        let mut undone = 0;
        while state.undo() {
            undone += 1;
        }
        assert_eq!(undone, MAX_UNDO_HISTORY);
    }

    #[test]
    fn test_unchanged_change_leaves_history_alone() {
        let mut state = CanvasState::new();
        state.begin_change();
        state.commit_change();
        assert!(!state.can_undo());

        state.push_undo();
        state.add_shape(rect_at(0.0));
        state.undo();
        assert!(state.can_redo());

        // A no-op change keeps the redo stack
        state.begin_change();
        state.commit_change();
        assert!(state.can_redo());
        assert!(!state.can_undo());
    }

    #[test]
    fn test_unchanged_change_keeps_full_history() {
        let mut state = CanvasState::new();
        for i in 0..MAX_UNDO_HISTORY {
            state.push_undo();
            state.add_shape(rect_at(i as f64 * 20.0));
        }
        state.begin_change();
        state.commit_change();
        let mut undone = 0;
        while state.undo() {
            undone += 1;
        }
        assert_eq!(undone, MAX_UNDO_HISTORY);
        assert!(state.shapes().is_empty());
    }

    #[test]
    fn test_committed_change_is_undoable() {
        let mut state = CanvasState::new();
        state.add_shape(rect_at(0.0));
        state.begin_change();
        state.clear();
        state.commit_change();
        assert!(state.undo());
        assert_eq!(state.shapes().len(), 1);
    }

    #[test]
    fn test_bounds_union() {
        let mut state = CanvasState::new();
        assert!(state.bounds().is_none());
        state.add_shape(rect_at(0.0));
        state.add_shape(rect_at(50.0));
        assert_eq!(state.bounds(), Some(Rect::new(0.0, 0.0, 60.0, 10.0)));
    }

    #[test]
    fn test_document_roundtrip() {
        let mut state = CanvasState::new();
        let rect = rect_at(0.0);
        let id = rect.id().to_string();
        state.add_shape(rect);
        state.select(&id);
        state.set_tool(ToolKind::Ellipse);
        state.viewport.scale = 2.0;
        state.viewport.translate = Vec2::new(3.0, 4.0);

        let doc = state.to_document(DOCUMENT_VERSION, 1234);
        let json = doc.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["tool"], "ellipse");
        assert_eq!(value["lastModified"], 1234);
        assert_eq!(value["frameCounter"], 0);
        assert_eq!(value["selected"][&id], true);
        assert_eq!(value["shapes"]["ids"][0], id.as_str());

        let back = CanvasDocument::from_json(&json).unwrap();
        assert_eq!(back, doc);

        let restored = CanvasState::from_document(&back, &ViewportConfig::default());
        assert_eq!(restored.viewport.scale, 2.0);
        assert!(restored.is_selected(&id));
        assert_eq!(restored.tool(), ToolKind::Ellipse);
    }

    #[test]
    fn test_from_document_clamps_scale() {
        let doc = CanvasDocument {
            viewport: ViewportSnapshot {
                scale: 99.0,
                translate: Vec2::ZERO,
            },
            ..CanvasDocument::default()
        };
        let state = CanvasState::from_document(&doc, &ViewportConfig::default());
        assert_eq!(state.viewport.scale, ViewportConfig::default().max_scale);
    }
}
