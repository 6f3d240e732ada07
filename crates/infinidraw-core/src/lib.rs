//! Infinidraw Core Library
//!
//! Platform-agnostic engine for an infinite drawing canvas: the shape model,
//! an immutable entity store, the viewport, hit testing, the gesture state
//! machine and debounced persistence.

pub mod canvas;
pub mod config;
pub mod engine;
pub mod input;
pub mod interaction;
pub mod remote;
pub mod selection;
pub mod shapes;
pub mod storage;
pub mod store;
pub mod sync;
pub mod tools;
pub mod viewport;

pub use canvas::{CanvasDocument, CanvasState, DOCUMENT_VERSION};
pub use config::{ConfigError, EngineConfig};
pub use engine::{CanvasEngine, Command, RenderSnapshot};
pub use hit_test::{HitOptions, get_shape_at_point};
pub use input::{KeyInput, Modifiers, MouseButton, PointerEvent, PointerInput, WheelInput};
pub use interaction::{Gesture, InteractionController, ResizeSignal};
pub use remote::{MemoryRemote, RemoteError, RemoteStore};
pub use selection::{Corner, SelectionMap};
pub use shapes::{Shape, ShapeId, ShapeKind, ShapePatch};
pub use storage::{LocalCache, MemoryCache, StorageError};
pub use store::{DocumentError, Entity, EntityState};
pub use sync::{PersistenceSync, SaveStatus, SyncError, resolve_conflict};
pub use tools::ToolKind;
pub use viewport::{ViewportAction, ViewportState};
