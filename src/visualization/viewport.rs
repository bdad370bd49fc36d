//! Viewport controller: zoom, fit and reset against the live surface.
//!
//! Every change is written to the surface and published on a watch channel
//! so the host can display the current zoom level.

use std::collections::HashSet;

use tokio::sync::watch;

use crate::config::ViewportConfig;
use crate::models::{Point, ViewportState};

use super::interaction::InteractionController;
use super::manager::SurfaceManager;
use super::surface::Bounds;

/// Owns the observable viewport state.
#[derive(Debug)]
pub struct ViewportController {
    config: ViewportConfig,
    state: watch::Sender<ViewportState>,
}

impl ViewportController {
    pub fn new(config: ViewportConfig) -> Self {
        let (state, _) = watch::channel(ViewportState::default());
        Self { config, state }
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewportState> {
        self.state.subscribe()
    }

    pub fn current(&self) -> ViewportState {
        *self.state.borrow()
    }

    pub fn config(&self) -> &ViewportConfig {
        &self.config
    }

    pub fn clamp(&self, zoom: f64) -> f64 {
        let (min, max) = self.config.zoom_bounds();
        zoom.clamp(min, max)
    }

    pub fn zoom_in(&self, manager: &mut SurfaceManager) -> bool {
        self.zoom_by(manager, self.config.zoom_in_factor, "zoom_in")
    }

    pub fn zoom_out(&self, manager: &mut SurfaceManager) -> bool {
        self.zoom_by(manager, self.config.zoom_out_factor, "zoom_out")
    }

    /// Scale zoom by `factor` around the center of the surface.
    fn zoom_by(&self, manager: &mut SurfaceManager, factor: f64, operation: &str) -> bool {
        let view = manager.with_surface_mut(|surface| {
            let current = surface.viewport();
            let zoom = self.clamp(current.zoom * factor);
            let center = Point::new(surface.width() / 2.0, surface.height() / 2.0);
            let ratio = zoom / current.zoom;
            let view = ViewportState {
                zoom,
                pan: Point::new(
                    center.x - (center.x - current.pan.x) * ratio,
                    center.y - (center.y - current.pan.y) * ratio,
                ),
            };
            surface.set_viewport(view);
            view
        });

        match view {
            Some(view) => {
                self.publish(view);
                true
            }
            None => {
                tracing::warn!(operation, "No live render surface, ignoring");
                false
            }
        }
    }

    /// Fit the full scene, or only `ids` when given, with the configured padding.
    pub fn fit_to_view(&self, manager: &mut SurfaceManager, ids: Option<&HashSet<String>>) -> bool {
        self.fit(manager, ids, self.config.fit_padding)
    }

    /// Fit a node subset (or everything) inside the surface with `padding` pixels spare.
    pub fn fit(
        &self,
        manager: &mut SurfaceManager,
        ids: Option<&HashSet<String>>,
        padding: f64,
    ) -> bool {
        let fitted = manager.with_surface_mut(|surface| {
            let bounds = surface.bounds(ids)?;
            let view = fitted_viewport(&bounds, surface.width(), surface.height(), padding, &self.config);
            surface.set_viewport(view);
            Some(view)
        });

        match fitted {
            Some(Some(view)) => {
                self.publish(view);
                true
            }
            Some(None) => {
                tracing::debug!("Nothing to fit, viewport unchanged");
                false
            }
            None => {
                tracing::warn!(operation = "fit_to_view", "No live render surface, ignoring");
                false
            }
        }
    }

    /// Clear selection and highlight, then return to the full-scene view.
    pub fn reset(&self, manager: &mut SurfaceManager, interaction: &InteractionController) -> bool {
        if !manager.is_ready() {
            tracing::warn!(operation = "reset", "No live render surface, ignoring");
            return false;
        }
        interaction.clear_selection(manager);
        manager.with_surface_mut(|surface| surface.clear_highlight());
        self.fit_to_view(manager, None)
    }

    /// Forget the published viewport, used when the scene is replaced.
    pub fn reset_state(&self) {
        self.publish(ViewportState::default());
    }

    fn publish(&self, view: ViewportState) {
        self.state.send_replace(view);
    }
}

/// Viewport that centers `bounds` in a `width` × `height` surface.
pub fn fitted_viewport(
    bounds: &Bounds,
    width: f64,
    height: f64,
    padding: f64,
    config: &ViewportConfig,
) -> ViewportState {
    let avail_w = if width > 2.0 * padding { width - 2.0 * padding } else { width };
    let avail_h = if height > 2.0 * padding { height - 2.0 * padding } else { height };

    let zoom = match (bounds.width() > 0.0, bounds.height() > 0.0) {
        (true, true) => (avail_w / bounds.width()).min(avail_h / bounds.height()),
        (true, false) => avail_w / bounds.width(),
        (false, true) => avail_h / bounds.height(),
        (false, false) => 1.0,
    };
    let (min_zoom, max_zoom) = config.zoom_bounds();
    let zoom = zoom.clamp(min_zoom, max_zoom);

    let center = bounds.center();
    ViewportState {
        zoom,
        pan: Point::new(width / 2.0 - center.x * zoom, height / 2.0 - center.y * zoom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SceneConfig;
    use crate::models::{Entity, Relation, VisualOverrides};
    use crate::visualization::layout::LayoutOrchestrator;
    use crate::visualization::scene::build_scene;
    use crate::visualization::surface::{HeadlessMount, StyleSheet};
    use std::sync::Arc;

    fn ready_manager() -> SurfaceManager {
        let scene = Arc::new(build_scene(
            &[
                Entity::new("1", "Alice", "Person"),
                Entity::new("2", "Acme", "Org"),
                Entity::new("3", "Paris", "Location"),
            ],
            &[Relation::new("r1", "1", "2", "works_for")],
            &VisualOverrides::default(),
            &SceneConfig::default(),
        ));
        let mount = Arc::new(HeadlessMount::new("graph", 800.0, 600.0));
        let mut manager = SurfaceManager::new(mount, StyleSheet::default(), LayoutOrchestrator::default());
        manager.initialize(scene, "circular").unwrap();
        manager
    }

    #[test]
    fn test_zoom_round_trip() {
        let mut manager = ready_manager();
        let viewport = ViewportController::new(ViewportConfig::default());
        let before = manager.with_surface(|s| s.viewport()).unwrap();

        assert!(viewport.zoom_in(&mut manager));
        assert!((viewport.current().zoom - before.zoom * 1.2).abs() < 1e-9);
        assert!(viewport.zoom_out(&mut manager));

        let after = viewport.current();
        assert!((after.zoom - before.zoom).abs() < 1e-9);
        assert!((after.pan.x - before.pan.x).abs() < 1e-6);
        assert!((after.pan.y - before.pan.y).abs() < 1e-6);
    }

    #[test]
    fn test_zoom_stays_in_bounds() {
        let mut manager = ready_manager();
        let viewport = ViewportController::new(ViewportConfig::default());

        for _ in 0..100 {
            viewport.zoom_in(&mut manager);
        }
        assert_eq!(viewport.current().zoom, 10.0);

        for _ in 0..200 {
            viewport.zoom_out(&mut manager);
        }
        assert_eq!(viewport.current().zoom, 0.1);
    }

    #[test]
    fn test_operations_without_surface_are_noops() {
        let mount = Arc::new(HeadlessMount::new("graph", 800.0, 600.0));
        let mut manager = SurfaceManager::new(mount, StyleSheet::default(), LayoutOrchestrator::default());
        let viewport = ViewportController::new(ViewportConfig::default());
        let interaction = InteractionController::new();

        assert!(!viewport.zoom_in(&mut manager));
        assert!(!viewport.zoom_out(&mut manager));
        assert!(!viewport.fit_to_view(&mut manager, None));
        assert!(!viewport.reset(&mut manager, &interaction));
        assert_eq!(viewport.current(), ViewportState::default());
    }

    #[test]
    fn test_fit_centers_subset() {
        let mut manager = ready_manager();
        let viewport = ViewportController::new(ViewportConfig::default());
        let ids: HashSet<String> = ["1".to_string()].into_iter().collect();

        assert!(viewport.fit(&mut manager, Some(&ids), 80.0));
        let (view, pos) = manager
            .with_surface(|s| (s.viewport(), s.position("1").unwrap()))
            .unwrap();
        let screen = view.world_to_screen(pos);
        assert!((screen.x - 400.0).abs() < 1e-6);
        assert!((screen.y - 300.0).abs() < 1e-6);
        // A lone node fits far beyond max zoom; the clamp holds.
        assert_eq!(view.zoom, 10.0);
    }

    #[test]
    fn test_fit_unknown_subset_leaves_viewport() {
        let mut manager = ready_manager();
        let viewport = ViewportController::new(ViewportConfig::default());
        let ids: HashSet<String> = ["ghost".to_string()].into_iter().collect();
        let before = manager.with_surface(|s| s.viewport()).unwrap();

        assert!(!viewport.fit(&mut manager, Some(&ids), 80.0));
        assert_eq!(manager.with_surface(|s| s.viewport()), Some(before));
    }

    #[test]
    fn test_fitted_viewport_padding() {
        let bounds = Bounds {
            min: Point::new(0.0, 0.0),
            max: Point::new(700.0, 100.0),
        };
        let view = fitted_viewport(&bounds, 800.0, 600.0, 50.0, &ViewportConfig::default());
        assert!((view.zoom - 1.0).abs() < 1e-9);
        assert!((view.pan.x - 50.0).abs() < 1e-9);
        assert!((view.pan.y - 250.0).abs() < 1e-9);
    }

    #[test]
    fn test_reset_clears_marks() {
        let mut manager = ready_manager();
        let viewport = ViewportController::new(ViewportConfig::default());
        let interaction = InteractionController::new();

        interaction.on_node_tap(&mut manager, "1");
        let ids: HashSet<String> = ["2".to_string()].into_iter().collect();
        interaction.highlight(&mut manager, &ids);
        viewport.zoom_in(&mut manager);

        assert!(viewport.reset(&mut manager, &interaction));
        assert!(interaction.current().is_empty());
        let (highlighted, selected) = manager
            .with_surface(|s| (s.highlighted_nodes().len(), s.selected_nodes().len()))
            .unwrap();
        assert_eq!((highlighted, selected), (0, 0));
    }
}
