//! The render surface: a stateful drawing and hit-testing instance bound to a mount point.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tiny_skia::{FillRule, Paint, PathBuilder, Pixmap, Stroke, Transform};

use crate::error::AppError;
use crate::models::{Point, ViewportState};

use super::constants::{
    parse_hex_color, BASE_EDGE_WIDTH, COLOR_HIGHLIGHT, COLOR_SELECTED, EDGE_HIT_TOLERANCE,
    FADED_ALPHA, MAX_EDGE_WIDTH, NODE_HIT_SLOP,
};
use super::layout::{LayoutJob, LayoutName};
use super::scene::Scene;

static NEXT_SURFACE_ID: AtomicU64 = AtomicU64::new(1);

// =============================================================================
// Mount Points
// =============================================================================

/// The host container a surface draws into.
///
/// A mount point hosts at most one surface at a time: `attach` fails while a
/// surface is attached.
pub trait Mount: Send + Sync {
    /// Stable identifier, for logs and errors.
    fn id(&self) -> &str;

    /// Current layout size, or `None` when the mount point is not in the tree.
    fn size(&self) -> Option<(f64, f64)>;

    /// Claim the mount point for a new surface.
    fn attach(&self) -> Result<(), AppError>;

    /// Release the mount point.
    fn detach(&self);
}

/// An in-memory mount point with a settable size.
#[derive(Debug)]
pub struct HeadlessMount {
    id: String,
    size: Mutex<(f64, f64)>,
    present: AtomicBool,
    attached: AtomicBool,
    attach_count: AtomicUsize,
}

impl HeadlessMount {
    pub fn new(id: impl Into<String>, width: f64, height: f64) -> Self {
        Self {
            id: id.into(),
            size: Mutex::new((width, height)),
            present: AtomicBool::new(true),
            attached: AtomicBool::new(false),
            attach_count: AtomicUsize::new(0),
        }
    }

    pub fn resize(&self, width: f64, height: f64) {
        if let Ok(mut size) = self.size.lock() {
            *size = (width, height);
        }
    }

    /// Remove the mount point from (or restore it to) the tree.
    pub fn set_present(&self, present: bool) {
        self.present.store(present, Ordering::SeqCst);
    }

    /// Whether a surface currently holds this mount point.
    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::SeqCst)
    }

    /// Number of surfaces ever attached.
    pub fn attach_count(&self) -> usize {
        self.attach_count.load(Ordering::SeqCst)
    }
}

impl Mount for HeadlessMount {
    fn id(&self) -> &str {
        &self.id
    }

    fn size(&self) -> Option<(f64, f64)> {
        if !self.present.load(Ordering::SeqCst) {
            return None;
        }
        self.size.lock().ok().map(|s| *s)
    }

    fn attach(&self) -> Result<(), AppError> {
        if !self.present.load(Ordering::SeqCst) {
            return Err(AppError::MountMissing(self.id.clone()));
        }
        if self
            .attached
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(AppError::SurfaceAlreadyAttached(self.id.clone()));
        }
        self.attach_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn detach(&self) {
        self.attached.store(false, Ordering::SeqCst);
    }
}

// =============================================================================
// Geometry and Style
// =============================================================================

/// Axis-aligned bounds in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Point,
    pub max: Point,
}

impl Bounds {
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.min.x + self.max.x) / 2.0,
            (self.min.y + self.max.y) / 2.0,
        )
    }
}

/// Style rules applied when the surface is constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleSheet {
    pub background: String,
    pub highlight_color: String,
    pub selected_color: String,
    pub edge_width: f64,
    pub faded_alpha: f32,
}

impl Default for StyleSheet {
    fn default() -> Self {
        Self {
            background: "#ffffff".to_string(),
            highlight_color: COLOR_HIGHLIGHT.to_string(),
            selected_color: COLOR_SELECTED.to_string(),
            edge_width: BASE_EDGE_WIDTH,
            faded_alpha: FADED_ALPHA,
        }
    }
}

/// Pointer events a surface routes to bound listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    NodeTap,
    EdgeTap,
    BackgroundTap,
}

/// What a tap landed on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TapTarget {
    Node(String),
    Edge(String),
    Background,
}

// =============================================================================
// Surface
// =============================================================================

/// A live rendering instance. Owned exclusively by the surface manager.
pub struct Surface {
    id: u64,
    mount: Arc<dyn Mount>,
    scene: Arc<Scene>,
    positions: Vec<Point>,
    width: f64,
    height: f64,
    style: StyleSheet,
    viewport: ViewportState,
    highlighted_nodes: HashSet<String>,
    highlighted_edges: HashSet<String>,
    selected_nodes: HashSet<String>,
    selected_edges: HashSet<String>,
    listeners: HashSet<EventKind>,
    pub(crate) running_layout: Option<LayoutJob>,
    pub(crate) current_layout: LayoutName,
    released: bool,
}

impl std::fmt::Debug for Surface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Surface")
            .field("id", &self.id)
            .field("mount", &self.mount.id())
            .field("nodes", &self.scene.nodes.len())
            .field("edges", &self.scene.edges.len())
            .field("viewport", &self.viewport)
            .finish()
    }
}

impl Surface {
    /// Construct a surface on `mount`, claiming it.
    ///
    /// Fails without side effects if the scene is empty, the mount point is
    /// missing or unsized, or another surface already holds it.
    pub fn create(mount: Arc<dyn Mount>, scene: Arc<Scene>, style: StyleSheet) -> Result<Self, AppError> {
        if scene.is_empty() {
            return Err(AppError::EmptyScene);
        }
        let (width, height) = mount
            .size()
            .ok_or_else(|| AppError::MountMissing(mount.id().to_string()))?;
        if width <= 0.0 || height <= 0.0 {
            return Err(AppError::MountNotSized(mount.id().to_string()));
        }
        mount.attach()?;

        let center = Point::new(width / 2.0, height / 2.0);
        let surface = Self {
            id: NEXT_SURFACE_ID.fetch_add(1, Ordering::SeqCst),
            positions: vec![center; scene.nodes.len()],
            mount,
            scene,
            width,
            height,
            style,
            viewport: ViewportState::default(),
            highlighted_nodes: HashSet::new(),
            highlighted_edges: HashSet::new(),
            selected_nodes: HashSet::new(),
            selected_edges: HashSet::new(),
            listeners: HashSet::new(),
            running_layout: None,
            current_layout: LayoutName::default(),
            released: false,
        };
        tracing::debug!(surface = surface.id, mount = %surface.mount.id(), "Render surface created");
        Ok(surface)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn style(&self) -> &StyleSheet {
        &self.style
    }

    pub fn current_layout(&self) -> LayoutName {
        self.current_layout
    }

    /// Position of a node in world space.
    pub fn position(&self, id: &str) -> Option<Point> {
        self.scene.node_idx(id).map(|i| self.positions[i])
    }

    pub fn positions(&self) -> &[Point] {
        &self.positions
    }

    /// Replace all node positions at once.
    pub fn set_positions(&mut self, positions: Vec<Point>) -> Result<(), AppError> {
        if positions.len() != self.scene.nodes.len() {
            return Err(AppError::Layout(format!(
                "layout returned {} positions for {} nodes",
                positions.len(),
                self.scene.nodes.len()
            )));
        }
        self.positions = positions;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Events
    // ---------------------------------------------------------------------

    /// Bind the pointer listeners. Returns `false` if they were already bound.
    pub fn bind_listeners(&mut self) -> bool {
        if !self.listeners.is_empty() {
            return false;
        }
        self.listeners
            .extend([EventKind::NodeTap, EventKind::EdgeTap, EventKind::BackgroundTap]);
        true
    }

    pub fn unbind_listeners(&mut self) {
        self.listeners.clear();
    }

    pub fn has_listener(&self, kind: EventKind) -> bool {
        self.listeners.contains(&kind)
    }

    /// Resolve a tap at a screen position. Events with no bound listener yield `None`.
    pub fn tap(&self, screen: Point) -> Option<TapTarget> {
        let target = self.hit_test(screen);
        let kind = match target {
            TapTarget::Node(_) => EventKind::NodeTap,
            TapTarget::Edge(_) => EventKind::EdgeTap,
            TapTarget::Background => EventKind::BackgroundTap,
        };
        self.has_listener(kind).then_some(target)
    }

    fn hit_test(&self, screen: Point) -> TapTarget {
        let zoom = self.viewport.zoom;

        // Nodes are drawn over edges; the last drawn node wins.
        for (node, &pos) in self.scene.nodes.iter().zip(&self.positions).rev() {
            let center = self.viewport.world_to_screen(pos);
            let radius = node.size / 2.0 * zoom + NODE_HIT_SLOP;
            if center.distance(screen) <= radius {
                return TapTarget::Node(node.id.clone());
            }
        }

        for edge in self.scene.edges.iter().rev() {
            let (Some(a), Some(b)) = (self.position(&edge.source), self.position(&edge.target))
            else {
                continue;
            };
            let (a, b) = (
                self.viewport.world_to_screen(a),
                self.viewport.world_to_screen(b),
            );
            if distance_to_segment(screen, a, b) <= EDGE_HIT_TOLERANCE {
                return TapTarget::Edge(edge.id.clone());
            }
        }

        TapTarget::Background
    }

    // ---------------------------------------------------------------------
    // Marks
    // ---------------------------------------------------------------------

    pub fn clear_highlight(&mut self) {
        self.highlighted_nodes.clear();
        self.highlighted_edges.clear();
    }

    /// Mark nodes and edges as highlighted. Unknown IDs are ignored.
    pub fn add_highlight(&mut self, nodes: &HashSet<String>, edges: &HashSet<String>) {
        self.highlighted_nodes
            .extend(nodes.iter().filter(|id| self.scene.node(id).is_some()).cloned());
        self.highlighted_edges
            .extend(edges.iter().filter(|id| self.scene.edge(id).is_some()).cloned());
    }

    pub fn highlighted_nodes(&self) -> &HashSet<String> {
        &self.highlighted_nodes
    }

    pub fn highlighted_edges(&self) -> &HashSet<String> {
        &self.highlighted_edges
    }

    pub fn set_selection_marks(&mut self, nodes: HashSet<String>, edges: HashSet<String>) {
        self.selected_nodes = nodes;
        self.selected_edges = edges;
    }

    pub fn clear_selection_marks(&mut self) {
        self.selected_nodes.clear();
        self.selected_edges.clear();
    }

    pub fn selected_nodes(&self) -> &HashSet<String> {
        &self.selected_nodes
    }

    pub fn selected_edges(&self) -> &HashSet<String> {
        &self.selected_edges
    }

    // ---------------------------------------------------------------------
    // Viewport
    // ---------------------------------------------------------------------

    pub fn viewport(&self) -> ViewportState {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: ViewportState) {
        self.viewport = viewport;
    }

    /// World bounds of the given nodes (all nodes when `ids` is `None`),
    /// including node radii. `None` if no listed node exists.
    pub fn bounds(&self, ids: Option<&HashSet<String>>) -> Option<Bounds> {
        let mut bounds: Option<Bounds> = None;
        for (node, p) in self.scene.nodes.iter().zip(&self.positions) {
            if ids.is_some_and(|ids| !ids.contains(&node.id)) {
                continue;
            }
            let r = node.size / 2.0;
            let b = bounds.get_or_insert(Bounds {
                min: Point::new(p.x - r, p.y - r),
                max: Point::new(p.x + r, p.y + r),
            });
            b.min.x = b.min.x.min(p.x - r);
            b.min.y = b.min.y.min(p.y - r);
            b.max.x = b.max.x.max(p.x + r);
            b.max.y = b.max.y.max(p.y + r);
        }
        bounds
    }

    // ---------------------------------------------------------------------
    // Drawing
    // ---------------------------------------------------------------------

    /// Draw the scene into a new pixmap of the given pixel size through `view`.
    pub fn draw(
        &self,
        width: u32,
        height: u32,
        view: ViewportState,
        background: &str,
    ) -> Result<Pixmap, AppError> {
        let mut pixmap = Pixmap::new(width.max(1), height.max(1))
            .ok_or_else(|| AppError::ExportEncode("failed to allocate pixmap".to_string()))?;
        let [r, g, b, a] = parse_hex_color(background).unwrap_or([255, 255, 255, 255]);
        pixmap.fill(tiny_skia::Color::from_rgba8(r, g, b, a));

        let highlight_active =
            !self.highlighted_nodes.is_empty() || !self.selected_nodes.is_empty();
        let emphasized_node = |id: &str| {
            self.highlighted_nodes.contains(id) || self.selected_nodes.contains(id)
        };

        for edge in &self.scene.edges {
            let (Some(a), Some(b)) = (self.position(&edge.source), self.position(&edge.target))
            else {
                continue;
            };
            let (a, b) = (view.world_to_screen(a), view.world_to_screen(b));
            let mut pb = PathBuilder::new();
            pb.move_to(a.x as f32, a.y as f32);
            pb.line_to(b.x as f32, b.y as f32);
            let Some(path) = pb.finish() else {
                continue;
            };

            let color = if self.selected_edges.contains(&edge.id) {
                &self.style.selected_color
            } else if self.highlighted_edges.contains(&edge.id) {
                &self.style.highlight_color
            } else {
                &edge.color
            };
            let emphasized = self.selected_edges.contains(&edge.id)
                || self.highlighted_edges.contains(&edge.id);
            let alpha = if highlight_active && !emphasized {
                self.style.faded_alpha
            } else {
                1.0
            };
            let width = (self.style.edge_width * edge.weight).min(MAX_EDGE_WIDTH)
                * if emphasized { 1.5 } else { 1.0 }
                * view.zoom;

            let stroke = Stroke {
                width: width.max(0.5) as f32,
                ..Default::default()
            };
            pixmap.stroke_path(&path, &paint(color, alpha), &stroke, Transform::identity(), None);
        }

        for (node, &p) in self.scene.nodes.iter().zip(&self.positions) {
            let c = view.world_to_screen(p);
            let radius = (node.size / 2.0 * view.zoom).max(0.5) as f32;
            let Some(circle) = PathBuilder::from_circle(c.x as f32, c.y as f32, radius) else {
                continue;
            };
            let alpha = if highlight_active && !emphasized_node(&node.id) {
                self.style.faded_alpha
            } else {
                1.0
            };
            pixmap.fill_path(
                &circle,
                &paint(&node.color, alpha),
                FillRule::Winding,
                Transform::identity(),
                None,
            );

            let ring = if self.selected_nodes.contains(&node.id) {
                Some(&self.style.selected_color)
            } else if self.highlighted_nodes.contains(&node.id) {
                Some(&self.style.highlight_color)
            } else {
                None
            };
            if let Some(ring) = ring {
                let stroke = Stroke {
                    width: (3.0 * view.zoom).max(1.0) as f32,
                    ..Default::default()
                };
                pixmap.stroke_path(&circle, &paint(ring, 1.0), &stroke, Transform::identity(), None);
            }
        }

        Ok(pixmap)
    }

    /// Stop layouts, drop listeners and give the mount point back.
    pub fn release(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if self.released {
            return;
        }
        self.unbind_listeners();
        if let Some(job) = self.running_layout.take() {
            job.stop();
        }
        self.mount.detach();
        self.released = true;
        tracing::debug!(surface = self.id, mount = %self.mount.id(), "Render surface released");
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn paint(hex: &str, alpha: f32) -> Paint<'static> {
    let [r, g, b, a] = parse_hex_color(hex).unwrap_or([128, 128, 128, 255]);
    let mut paint = Paint::default();
    paint.set_color_rgba8(r, g, b, (a as f32 * alpha).round() as u8);
    paint.anti_alias = true;
    paint
}

fn distance_to_segment(p: Point, a: Point, b: Point) -> f64 {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len_sq = dx * dx + dy * dy;
    if len_sq < 1e-12 {
        return p.distance(a);
    }
    let t = (((p.x - a.x) * dx + (p.y - a.y) * dy) / len_sq).clamp(0.0, 1.0);
    p.distance(Point::new(a.x + t * dx, a.y + t * dy))
}
