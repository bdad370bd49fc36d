//! Graph Visualization Module
//!
//! Turns domain graphs into an interactive 2D scene bound to a mount point.
//!
//! ## Module Structure
//!
//! - `constants` - Palette, sizes and other constants
//! - `scene` - Domain graph to visual nodes/edges
//! - `layout` - Named layout algorithms and the orchestrator running them
//! - `surface` - Mount points and the render surface (hit-testing, drawing)
//! - `manager` - Surface lifecycle state machine
//! - `interaction` - Selection, highlight and search
//! - `viewport` - Zoom, fit and reset
//! - `export` - PNG/JPEG export and download sinks
//! - `timers` - Named slots for deferred work
//! - `engine` - Load sequencing and the public command surface

pub mod constants;
mod engine;
mod export;
mod interaction;
mod layout;
mod manager;
mod scene;
mod surface;
mod timers;
mod viewport;

pub use engine::{Engine, LoadOptions, LoadOutcome};
pub use export::{
    export_filename, DirectorySink, DownloadSink, ExportUnit, ExportedImage, ImageFormat,
};
pub use interaction::{EntityCallback, InteractionController, RelationCallback, SelectionCallbacks};
pub use layout::{compute_positions, LayoutJob, LayoutName, LayoutOrchestrator};
pub use manager::{SurfaceManager, SurfaceState};
pub use scene::{build_scene, Scene, VisualEdge, VisualNode};
pub use surface::{Bounds, EventKind, HeadlessMount, Mount, StyleSheet, Surface, TapTarget};
pub use timers::{TimerSlot, Timers};
pub use viewport::{fitted_viewport, ViewportController};
