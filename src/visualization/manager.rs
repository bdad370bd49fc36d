//! Render surface manager: owns the single surface bound to a mount point.
//!
//! Lifecycle: `Unmounted → Initializing → Ready → Destroying → Unmounted`.
//! Destruction always completes before the next initialization starts, so a
//! mount point never hosts two live surfaces.

use std::sync::Arc;

use crate::error::AppError;

use super::layout::{LayoutName, LayoutOrchestrator};
use super::scene::Scene;
use super::surface::{Mount, StyleSheet, Surface};

/// Lifecycle state of the managed surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceState {
    Unmounted,
    Initializing,
    Ready,
    Destroying,
}

/// Exclusive owner of the render surface.
///
/// Other components reach the surface only through `with_surface` and
/// `with_surface_mut`, which yield nothing unless the surface is `Ready`.
pub struct SurfaceManager {
    mount: Arc<dyn Mount>,
    style: StyleSheet,
    layouts: LayoutOrchestrator,
    state: SurfaceState,
    surface: Option<Surface>,
}

impl SurfaceManager {
    pub fn new(mount: Arc<dyn Mount>, style: StyleSheet, layouts: LayoutOrchestrator) -> Self {
        Self {
            mount,
            style,
            layouts,
            state: SurfaceState::Unmounted,
            surface: None,
        }
    }

    pub fn state(&self) -> SurfaceState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == SurfaceState::Ready
    }

    pub fn mount(&self) -> &Arc<dyn Mount> {
        &self.mount
    }

    /// Build a surface for `scene`, bind listeners and run the initial layout.
    ///
    /// Any existing surface is destroyed first. On error the manager is left
    /// `Unmounted` with no surface.
    pub fn initialize(&mut self, scene: Arc<Scene>, layout: &str) -> Result<LayoutName, AppError> {
        if self.state != SurfaceState::Unmounted {
            tracing::warn!(state = ?self.state, "Initializing over a live surface, destroying it first");
            self.destroy();
        }

        self.state = SurfaceState::Initializing;
        let mut surface = match Surface::create(self.mount.clone(), scene, self.style.clone()) {
            Ok(surface) => surface,
            Err(e) => {
                self.state = SurfaceState::Unmounted;
                return Err(e);
            }
        };

        surface.bind_listeners();
        let applied = self.layouts.apply(&mut surface, layout).unwrap_or_else(|| {
            tracing::warn!(layout = %layout, "Initial layout failed, nodes stay at their seeded positions");
            surface.current_layout()
        });

        tracing::debug!(
            surface = surface.id(),
            nodes = surface.scene().nodes.len(),
            layout = %applied,
            "Render surface ready"
        );
        self.surface = Some(surface);
        self.state = SurfaceState::Ready;
        Ok(applied)
    }

    /// Tear down the current surface, if any. Completes synchronously.
    pub fn destroy(&mut self) {
        if let Some(surface) = self.surface.take() {
            self.state = SurfaceState::Destroying;
            surface.release();
        }
        self.state = SurfaceState::Unmounted;
    }

    /// Run a layout on the live surface. `None` if not ready or the layout failed.
    pub fn apply_layout(&mut self, name: &str) -> Option<LayoutName> {
        let layouts = self.layouts;
        self.with_surface_mut(|surface| layouts.apply(surface, name))
            .flatten()
    }

    pub fn with_surface<R>(&self, f: impl FnOnce(&Surface) -> R) -> Option<R> {
        if self.state != SurfaceState::Ready {
            return None;
        }
        self.surface.as_ref().map(f)
    }

    pub fn with_surface_mut<R>(&mut self, f: impl FnOnce(&mut Surface) -> R) -> Option<R> {
        if self.state != SurfaceState::Ready {
            return None;
        }
        self.surface.as_mut().map(f)
    }
}

impl Drop for SurfaceManager {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SceneConfig;
    use crate::models::{Entity, Relation, VisualOverrides};
    use crate::visualization::scene::build_scene;
    use crate::visualization::surface::HeadlessMount;

    fn scene() -> Arc<Scene> {
        Arc::new(build_scene(
            &[Entity::new("1", "Alice", "Person"), Entity::new("2", "Acme", "Org")],
            &[Relation::new("r1", "1", "2", "works_for")],
            &VisualOverrides::default(),
            &SceneConfig::default(),
        ))
    }

    fn manager(mount: &Arc<HeadlessMount>) -> SurfaceManager {
        SurfaceManager::new(mount.clone(), StyleSheet::default(), LayoutOrchestrator::default())
    }

    #[test]
    fn test_initialize_and_destroy() {
        let mount = Arc::new(HeadlessMount::new("graph", 800.0, 600.0));
        let mut manager = manager(&mount);
        assert_eq!(manager.state(), SurfaceState::Unmounted);

        let layout = manager.initialize(scene(), "circular").unwrap();
        assert_eq!(layout, LayoutName::Circular);
        assert!(manager.is_ready());
        assert!(mount.is_attached());
        assert_eq!(manager.with_surface(|s| s.scene().nodes.len()), Some(2));

        manager.destroy();
        assert_eq!(manager.state(), SurfaceState::Unmounted);
        assert!(!mount.is_attached());
        assert!(manager.with_surface(|_| ()).is_none());
    }

    #[test]
    fn test_reinitialize_keeps_one_instance() {
        let mount = Arc::new(HeadlessMount::new("graph", 800.0, 600.0));
        let mut manager = manager(&mount);
        for _ in 0..3 {
            manager.initialize(scene(), "grid").unwrap();
            assert!(mount.is_attached());
        }
        assert_eq!(mount.attach_count(), 3);
        manager.destroy();
        manager.initialize(scene(), "grid").unwrap();
        assert_eq!(mount.attach_count(), 4);
    }

    #[test]
    fn test_failed_initialize_leaves_nothing_behind() {
        let mount = Arc::new(HeadlessMount::new("graph", 0.0, 0.0));
        let mut manager = manager(&mount);
        let result = manager.initialize(scene(), "grid");
        assert!(matches!(result, Err(AppError::MountNotSized(_))));
        assert_eq!(manager.state(), SurfaceState::Unmounted);
        assert!(!mount.is_attached());

        mount.resize(800.0, 600.0);
        let result = manager.initialize(Arc::new(Scene::default()), "grid");
        assert!(matches!(result, Err(AppError::EmptyScene)));
        assert!(!mount.is_attached());
    }

    #[test]
    fn test_apply_layout_requires_ready() {
        let mount = Arc::new(HeadlessMount::new("graph", 800.0, 600.0));
        let mut manager = manager(&mount);
        assert_eq!(manager.apply_layout("grid"), None);

        manager.initialize(scene(), "grid").unwrap();
        assert_eq!(manager.apply_layout("nonsense"), Some(LayoutName::ForceDirected));
        assert_eq!(
            manager.with_surface(|s| s.current_layout()),
            Some(LayoutName::ForceDirected)
        );
    }

    #[test]
    fn test_drop_releases_mount() {
        let mount = Arc::new(HeadlessMount::new("graph", 800.0, 600.0));
        {
            let mut manager = manager(&mount);
            manager.initialize(scene(), "random").unwrap();
        }
        assert!(!mount.is_attached());
    }
}
