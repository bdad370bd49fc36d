//! The engine: load sequencing plus the command surface the host drives.
//!
//! Every load takes a fresh generation number. Results are applied only if
//! their generation is still the newest and the engine is still mounted;
//! anything else is dropped silently. Surface state lives behind a mutex
//! that is never held across an await point.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{broadcast, oneshot, watch};

use crate::config::Config;
use crate::error::AppError;
use crate::models::{
    DomainGraph, Entity, FilterOptions, GraphData, GraphStatistics, LoadStatus, Notice, Point,
    Relation, Selection, ViewportState,
};
use crate::source::GraphSource;

use super::export::{DownloadSink, ExportUnit, ExportedImage, ImageFormat};
use super::interaction::InteractionController;
use super::layout::{LayoutName, LayoutOrchestrator};
use super::manager::{SurfaceManager, SurfaceState};
use super::scene::Scene;
use super::surface::{Mount, StyleSheet, Surface, TapTarget};
use super::timers::{TimerSlot, Timers};
use super::viewport::ViewportController;

const NOTICE_CAPACITY: usize = 32;

/// What to load and how to show it.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Project to fetch from the graph source.
    pub project_id: Option<String>,
    pub filters: FilterOptions,
    /// Host-supplied graph; when present the source is not consulted.
    pub data: Option<GraphData>,
    /// Layout for this load; `None` keeps the current one.
    pub layout: Option<String>,
}

impl LoadOptions {
    pub fn project(project_id: impl Into<String>) -> Self {
        Self {
            project_id: Some(project_id.into()),
            ..Default::default()
        }
    }

    pub fn external(data: GraphData) -> Self {
        Self {
            data: Some(data),
            ..Default::default()
        }
    }

    pub fn with_filters(mut self, filters: FilterOptions) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_layout(mut self, layout: impl Into<String>) -> Self {
        self.layout = Some(layout.into());
        self
    }
}

/// How a single `load` call ended.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    Rendered {
        nodes: usize,
        edges: usize,
        dropped_relations: usize,
        layout: LayoutName,
    },
    /// The result had no nodes; nothing is on screen.
    Empty,
    /// A newer load started before this one finished.
    Superseded,
    /// The engine was unmounted before this load finished.
    Unmounted,
    /// The graph could not be fetched.
    Failed(String),
    /// The graph was fetched but no surface could be created.
    NoRender(String),
}

impl LoadOutcome {
    pub fn is_rendered(&self) -> bool {
        matches!(self, LoadOutcome::Rendered { .. })
    }
}

struct EngineState {
    manager: SurfaceManager,
    interaction: InteractionController,
    viewport: ViewportController,
    export: ExportUnit,
    timers: Timers,
    /// Layout for the next initialization; the latest request wins.
    layout: String,
    last_load: Option<LoadOptions>,
}

struct EngineInner {
    config: Config,
    source: Option<Arc<dyn GraphSource>>,
    alive: AtomicBool,
    generation: AtomicU64,
    status: watch::Sender<LoadStatus>,
    notices: broadcast::Sender<Notice>,
    state: Mutex<EngineState>,
}

/// Handle to a graph view bound to one mount point. Cheap to clone.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("alive", &self.is_alive())
            .field("generation", &self.inner.generation.load(Ordering::SeqCst))
            .field("surface", &self.surface_state())
            .finish()
    }
}

impl Engine {
    /// An engine for host-supplied graphs only.
    pub fn new(config: Config, mount: Arc<dyn Mount>) -> Self {
        Self::build(config, mount, None)
    }

    /// An engine that fetches project graphs from `source`.
    pub fn with_source(config: Config, mount: Arc<dyn Mount>, source: Arc<dyn GraphSource>) -> Self {
        Self::build(config, mount, Some(source))
    }

    fn build(config: Config, mount: Arc<dyn Mount>, source: Option<Arc<dyn GraphSource>>) -> Self {
        let default_layout = LayoutName::resolve(&config.engine.default_layout, LayoutName::default());
        let style = StyleSheet {
            background: config.export.background.clone(),
            ..StyleSheet::default()
        };
        let state = EngineState {
            manager: SurfaceManager::new(mount, style, LayoutOrchestrator::new(default_layout)),
            interaction: InteractionController::new(),
            viewport: ViewportController::new(config.viewport.clone()),
            export: ExportUnit::new(config.export.clone()),
            timers: Timers::default(),
            layout: config.engine.default_layout.clone(),
            last_load: None,
        };
        let (status, _) = watch::channel(LoadStatus::Idle);
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);

        Self {
            inner: Arc::new(EngineInner {
                config,
                source,
                alive: AtomicBool::new(true),
                generation: AtomicU64::new(0),
                status,
                notices,
                state: Mutex::new(state),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn is_alive(&self) -> bool {
        self.inner.alive.load(Ordering::SeqCst)
    }

    pub fn surface_state(&self) -> SurfaceState {
        self.lock().manager.state()
    }

    /// Run `f` against the live surface, if there is one.
    pub fn with_surface<R>(&self, f: impl FnOnce(&Surface) -> R) -> Option<R> {
        self.lock().manager.with_surface(f)
    }

    // =========================================================================
    // Load sequencing
    // =========================================================================

    /// Fetch or accept a graph, build its scene and put it on screen.
    ///
    /// A newer `load` supersedes this one at any suspension point. The old
    /// surface stays up until the new scene is ready to replace it.
    pub async fn load(&self, options: LoadOptions) -> LoadOutcome {
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.is_alive() {
            tracing::debug!(generation, "Load requested after unmount, ignoring");
            return LoadOutcome::Unmounted;
        }

        {
            let mut state = self.lock();
            if let Some(layout) = &options.layout {
                state.layout = layout.clone();
            }
            state.last_load = Some(options.clone());
        }
        self.inner.status.send_replace(LoadStatus::Loading);
        tracing::debug!(generation, project = ?options.project_id, "Load started");

        let fetched = self.fetch(&options).await;
        if let Some(outcome) = self.superseded(generation) {
            return outcome;
        }
        let mut graph = match fetched {
            Ok(graph) => graph,
            Err(e) => {
                tracing::error!(generation, error = %e, code = e.code(), "Graph fetch failed");
                let message = e.to_string();
                self.inner.status.send_replace(LoadStatus::Failed {
                    message: message.clone(),
                });
                self.notify(Notice::error(format!("Failed to load graph: {}", message)));
                return LoadOutcome::Failed(message);
            }
        };

        graph.entities = options.filters.retain_connected(graph.entities, &graph.relations);
        let scene = Arc::new(Scene::build(&graph, &self.inner.config.scene));

        let ready = {
            let mut guard = self.lock();
            if let Some(outcome) = self.superseded(generation) {
                return outcome;
            }
            let state = &mut *guard;
            state.timers.cancel(TimerSlot::DeferredInit);
            state.manager.destroy();
            state.interaction.reset_state();
            state.viewport.reset_state();

            if scene.is_empty() {
                tracing::debug!(generation, "Load produced an empty scene");
                self.inner.status.send_replace(LoadStatus::Empty);
                return LoadOutcome::Empty;
            }

            let (tx, rx) = oneshot::channel();
            let engine = self.clone();
            let delay = Duration::from_millis(self.inner.config.engine.init_delay_ms);
            state.timers.schedule(TimerSlot::DeferredInit, delay, async move {
                let outcome = engine.initialize_when_sized(generation, scene).await;
                let _ = tx.send(outcome);
            });
            rx
        };

        match ready.await {
            Ok(outcome) => outcome,
            Err(_) => self.init_aborted(generation),
        }
    }

    /// The deferred init task ended without reporting. Unless a newer load or
    /// an unmount cancelled it, it died mid-initialization.
    fn init_aborted(&self, generation: u64) -> LoadOutcome {
        let mut guard = self.lock();
        if let Some(outcome) = self.superseded(generation) {
            return outcome;
        }
        let state = &mut *guard;
        state.manager.destroy();
        state.interaction.reset_state();
        state.viewport.reset_state();

        let message = "render surface initialization aborted".to_string();
        tracing::error!(generation, "Deferred initialization ended without a result");
        self.inner.status.send_replace(LoadStatus::Failed {
            message: message.clone(),
        });
        LoadOutcome::NoRender(message)
    }

    /// Re-issue the most recent load.
    pub async fn retry(&self) -> LoadOutcome {
        let last = self.lock().last_load.clone();
        match last {
            Some(options) => self.load(options).await,
            None => {
                tracing::warn!("Nothing to retry");
                LoadOutcome::Failed("nothing to retry".to_string())
            }
        }
    }

    /// Reload with new filters once they stop changing for the debounce window.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn set_filters(&self, filters: FilterOptions) {
        if !self.is_alive() {
            return;
        }
        let mut state = self.lock();
        let mut options = state.last_load.clone().unwrap_or_default();
        options.filters = filters;
        options.layout = None;

        let engine = self.clone();
        let delay = Duration::from_millis(self.inner.config.engine.debounce_ms);
        state.timers.schedule(TimerSlot::Debounce, delay, async move {
            let outcome = engine.load(options).await;
            tracing::debug!(?outcome, "Debounced load finished");
        });
    }

    /// Per-type counts for `project`, for the host's statistics panel.
    pub async fn statistics(&self, project: &str) -> Result<GraphStatistics, AppError> {
        let source = self
            .inner
            .source
            .as_ref()
            .ok_or_else(|| AppError::Source("no graph source configured".to_string()))?;
        source.statistics(project).await
    }

    async fn fetch(&self, options: &LoadOptions) -> Result<DomainGraph, AppError> {
        if let Some(data) = &options.data {
            return Ok(data.to_domain());
        }
        let source = self
            .inner
            .source
            .as_ref()
            .ok_or_else(|| AppError::Source("no graph source configured".to_string()))?;
        let project = options
            .project_id
            .as_deref()
            .ok_or_else(|| AppError::Source("no project selected".to_string()))?;

        let query = options
            .filters
            .to_query(self.inner.config.engine.default_max_nodes);
        let response = source.query_graph(project, &query).await?;
        Ok(response.into())
    }

    /// Wait for the mount point to have a size, then build the surface.
    async fn initialize_when_sized(&self, generation: u64, scene: Arc<Scene>) -> LoadOutcome {
        let engine_config = &self.inner.config.engine;
        let delay = Duration::from_millis(engine_config.init_delay_ms);
        let mount = self.lock().manager.mount().clone();

        let mut attempt = 0;
        loop {
            if let Some(outcome) = self.superseded(generation) {
                return outcome;
            }
            if mount.size().is_some_and(|(w, h)| w > 0.0 && h > 0.0) {
                break;
            }
            if attempt >= engine_config.init_retries {
                break;
            }
            attempt += 1;
            tracing::debug!(generation, attempt, "Mount point not laid out yet, retrying");
            tokio::time::sleep(delay).await;
        }

        let mut guard = self.lock();
        if let Some(outcome) = self.superseded(generation) {
            return outcome;
        }
        let state = &mut *guard;
        let layout = state.layout.clone();

        match state.manager.initialize(scene.clone(), &layout) {
            Ok(applied) => {
                state.viewport.fit_to_view(&mut state.manager, None);
                let (nodes, edges) = (scene.nodes.len(), scene.edges.len());
                self.inner
                    .status
                    .send_replace(LoadStatus::Ready { nodes, edges });
                tracing::info!(generation, nodes, edges, layout = %applied, "Graph rendered");
                LoadOutcome::Rendered {
                    nodes,
                    edges,
                    dropped_relations: scene.dropped_relations,
                    layout: applied,
                }
            }
            Err(e) => {
                tracing::error!(generation, error = %e, code = e.code(), "Render surface initialization failed");
                let message = e.to_string();
                self.inner.status.send_replace(LoadStatus::Failed {
                    message: message.clone(),
                });
                LoadOutcome::NoRender(message)
            }
        }
    }

    /// `Some` when results for `generation` must be discarded.
    fn superseded(&self, generation: u64) -> Option<LoadOutcome> {
        if !self.is_alive() {
            tracing::debug!(generation, "Engine unmounted, discarding load result");
            return Some(LoadOutcome::Unmounted);
        }
        let current = self.inner.generation.load(Ordering::SeqCst);
        if current != generation {
            tracing::debug!(generation, current, "Load superseded, discarding result");
            return Some(LoadOutcome::Superseded);
        }
        None
    }

    // =========================================================================
    // Layout and interaction
    // =========================================================================

    /// Re-run layout on the live surface, or remember it for the next initialization.
    ///
    /// Viewport and selection are left as they are.
    pub fn apply_layout(&self, name: &str) -> Option<LayoutName> {
        let mut guard = self.lock();
        let state = &mut *guard;
        state.layout = name.to_string();
        if !state.manager.is_ready() {
            tracing::debug!(layout = name, "No live surface, layout kept for next initialization");
            return None;
        }
        state.manager.apply_layout(name)
    }

    /// Highlight and fit entities matching `query`. Returns matched IDs.
    pub fn search(&self, query: &str) -> Vec<String> {
        let mut guard = self.lock();
        let state = &mut *guard;
        state
            .interaction
            .search(&mut state.manager, &state.viewport, query)
    }

    pub fn highlight(&self, ids: &[String]) -> bool {
        let ids: HashSet<String> = ids.iter().cloned().collect();
        let mut guard = self.lock();
        let state = &mut *guard;
        state.interaction.highlight(&mut state.manager, &ids)
    }

    /// Select the entity behind node `id`.
    pub fn on_node_tap(&self, id: &str) -> Option<Selection> {
        self.select(|state| state.interaction.on_node_tap(&mut state.manager, id))
    }

    /// Select the relation behind edge `id`.
    pub fn on_edge_tap(&self, id: &str) -> Option<Selection> {
        self.select(|state| state.interaction.on_edge_tap(&mut state.manager, id))
    }

    /// Route a pointer tap at screen position `(x, y)`. Tapping the background clears the selection.
    pub fn tap(&self, x: f64, y: f64) -> Option<Selection> {
        self.select(|state| {
            let target = state
                .manager
                .with_surface(|surface| surface.tap(Point::new(x, y)))
                .flatten()?;
            match target {
                TapTarget::Node(id) => state.interaction.on_node_tap(&mut state.manager, &id),
                TapTarget::Edge(id) => state.interaction.on_edge_tap(&mut state.manager, &id),
                TapTarget::Background => {
                    state.interaction.clear_selection(&mut state.manager);
                    Some(Selection::None)
                }
            }
        })
    }

    /// Apply a selection change under the lock, then fire host callbacks outside it.
    fn select(&self, f: impl FnOnce(&mut EngineState) -> Option<Selection>) -> Option<Selection> {
        let (selection, callbacks) = {
            let mut guard = self.lock();
            let selection = f(&mut *guard)?;
            (selection, guard.interaction.callbacks())
        };
        callbacks.notify(&selection);
        Some(selection)
    }

    pub fn close_selection(&self) {
        let mut guard = self.lock();
        let state = &mut *guard;
        state.interaction.clear_selection(&mut state.manager);
    }

    pub fn on_entity_selected(&self, f: impl Fn(&Entity) + Send + Sync + 'static) {
        self.lock().interaction.set_on_entity_selected(Arc::new(f));
    }

    pub fn on_relation_selected(&self, f: impl Fn(&Relation) + Send + Sync + 'static) {
        self.lock().interaction.set_on_relation_selected(Arc::new(f));
    }

    // =========================================================================
    // Viewport
    // =========================================================================

    pub fn zoom_in(&self) -> bool {
        let mut guard = self.lock();
        let state = &mut *guard;
        state.viewport.zoom_in(&mut state.manager)
    }

    pub fn zoom_out(&self) -> bool {
        let mut guard = self.lock();
        let state = &mut *guard;
        state.viewport.zoom_out(&mut state.manager)
    }

    /// Fit everything, or just `ids`, into view.
    pub fn fit_to_view(&self, ids: Option<&[String]>) -> bool {
        let ids: Option<HashSet<String>> = ids.map(|ids| ids.iter().cloned().collect());
        let mut guard = self.lock();
        let state = &mut *guard;
        state.viewport.fit_to_view(&mut state.manager, ids.as_ref())
    }

    pub fn reset(&self) -> bool {
        let mut guard = self.lock();
        let state = &mut *guard;
        state.viewport.reset(&mut state.manager, &state.interaction)
    }

    // =========================================================================
    // Export
    // =========================================================================

    /// Rasterize the full scene. `None` (with a notice) if nothing is on screen.
    pub fn export_image(&self, format: ImageFormat) -> Option<ExportedImage> {
        let rendered = {
            let guard = self.lock();
            let project = guard
                .last_load
                .as_ref()
                .and_then(|o| o.project_id.clone())
                .unwrap_or_default();
            let at = chrono::Local::now().naive_local();
            guard
                .manager
                .with_surface(|surface| guard.export.render(surface, format, &project, at))
                .unwrap_or(Err(AppError::SurfaceNotReady))
        };

        match rendered {
            Ok(image) => Some(image),
            Err(AppError::SurfaceNotReady) => {
                tracing::warn!(%format, "Export requested with no live surface");
                self.notify(Notice::warning("Graph is not ready for export"));
                None
            }
            Err(e) => {
                tracing::error!(error = %e, "Export failed");
                self.notify(Notice::error(format!("Export failed: {}", e)));
                None
            }
        }
    }

    /// Export and hand the image to `sink`. Returns where it was delivered.
    pub async fn export_to(&self, format: ImageFormat, sink: &dyn DownloadSink) -> Option<PathBuf> {
        let image = self.export_image(format)?;
        match sink.deliver(&image).await {
            Ok(path) => {
                self.notify(Notice::info(format!("Saved {}", image.filename)));
                Some(path)
            }
            Err(e) => {
                tracing::error!(error = %e, filename = %image.filename, "Export delivery failed");
                self.notify(Notice::error(format!("Could not save {}: {}", image.filename, e)));
                None
            }
        }
    }

    // =========================================================================
    // Observation and teardown
    // =========================================================================

    pub fn viewport(&self) -> watch::Receiver<ViewportState> {
        self.lock().viewport.subscribe()
    }

    pub fn selection(&self) -> watch::Receiver<Selection> {
        self.lock().interaction.subscribe()
    }

    pub fn status(&self) -> watch::Receiver<LoadStatus> {
        self.inner.status.subscribe()
    }

    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.inner.notices.subscribe()
    }

    fn notify(&self, notice: Notice) {
        // No subscribers is fine.
        let _ = self.inner.notices.send(notice);
    }

    /// Tear everything down. Pending and in-flight loads complete as `Unmounted`.
    pub fn unmount(&self) {
        if !self.inner.alive.swap(false, Ordering::SeqCst) {
            return;
        }
        let mut state = self.lock();
        state.timers.cancel_all();
        state.manager.destroy();
        state.interaction.reset_state();
        state.viewport.reset_state();
        self.inner.status.send_replace(LoadStatus::Idle);
        tracing::debug!("Engine unmounted");
    }
}
