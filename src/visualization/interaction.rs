//! Interaction controller: selection, highlight and search.
//!
//! Selection is published on a watch channel. Host callbacks are handed out
//! as [`SelectionCallbacks`] so the caller can invoke them after releasing
//! any engine lock.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::watch;

use crate::models::{Entity, Relation, Selection};

use super::manager::SurfaceManager;
use super::viewport::ViewportController;

pub type EntityCallback = Arc<dyn Fn(&Entity) + Send + Sync>;
pub type RelationCallback = Arc<dyn Fn(&Relation) + Send + Sync>;

/// Host callbacks fired when something is selected.
#[derive(Clone, Default)]
pub struct SelectionCallbacks {
    on_entity: Option<EntityCallback>,
    on_relation: Option<RelationCallback>,
}

impl SelectionCallbacks {
    pub fn notify(&self, selection: &Selection) {
        match selection {
            Selection::Entity(entity) => {
                if let Some(cb) = &self.on_entity {
                    cb(entity);
                }
            }
            Selection::Relation(relation) => {
                if let Some(cb) = &self.on_relation {
                    cb(relation);
                }
            }
            Selection::None => {}
        }
    }
}

impl std::fmt::Debug for SelectionCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectionCallbacks")
            .field("on_entity", &self.on_entity.is_some())
            .field("on_relation", &self.on_relation.is_some())
            .finish()
    }
}

/// Routes taps to selection and applies highlight marks.
#[derive(Debug)]
pub struct InteractionController {
    selection: watch::Sender<Selection>,
    callbacks: SelectionCallbacks,
}

impl Default for InteractionController {
    fn default() -> Self {
        Self::new()
    }
}

impl InteractionController {
    pub fn new() -> Self {
        let (selection, _) = watch::channel(Selection::None);
        Self {
            selection,
            callbacks: SelectionCallbacks::default(),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Selection> {
        self.selection.subscribe()
    }

    pub fn current(&self) -> Selection {
        self.selection.borrow().clone()
    }

    pub fn set_on_entity_selected(&mut self, cb: EntityCallback) {
        self.callbacks.on_entity = Some(cb);
    }

    pub fn set_on_relation_selected(&mut self, cb: RelationCallback) {
        self.callbacks.on_relation = Some(cb);
    }

    pub fn callbacks(&self) -> SelectionCallbacks {
        self.callbacks.clone()
    }

    /// Select the entity behind node `id` and mark its neighborhood.
    ///
    /// Returns the new selection, or `None` if there is no surface or the ID
    /// does not resolve.
    pub fn on_node_tap(&self, manager: &mut SurfaceManager, id: &str) -> Option<Selection> {
        let resolved = manager.with_surface_mut(|surface| {
            let scene = surface.scene();
            let entity = scene.entity(id)?.clone();
            let mut nodes = scene.neighbors(id);
            nodes.insert(id.to_string());
            let edges = scene.edges_touching(&HashSet::from([id.to_string()]));
            surface.set_selection_marks(nodes, edges);
            Some(entity)
        });

        match resolved {
            Some(Some(entity)) => {
                tracing::debug!(entity = %entity.id, "Entity selected");
                Some(self.select(Selection::Entity(entity)))
            }
            Some(None) => {
                tracing::warn!(node = id, "Tapped node does not resolve to an entity");
                None
            }
            None => {
                tracing::warn!(node = id, "No live render surface, ignoring tap");
                None
            }
        }
    }

    /// Select the relation behind edge `id` and mark it with both endpoints.
    pub fn on_edge_tap(&self, manager: &mut SurfaceManager, id: &str) -> Option<Selection> {
        let resolved = manager.with_surface_mut(|surface| {
            let relation = surface.scene().relation(id)?.clone();
            let nodes = HashSet::from([relation.source.clone(), relation.target.clone()]);
            let edges = HashSet::from([id.to_string()]);
            surface.set_selection_marks(nodes, edges);
            Some(relation)
        });

        match resolved {
            Some(Some(relation)) => {
                tracing::debug!(relation = %relation.id, "Relation selected");
                Some(self.select(Selection::Relation(relation)))
            }
            Some(None) => {
                tracing::warn!(edge = id, "Tapped edge does not resolve to a relation");
                None
            }
            None => {
                tracing::warn!(edge = id, "No live render surface, ignoring tap");
                None
            }
        }
    }

    pub fn clear_selection(&self, manager: &mut SurfaceManager) {
        manager.with_surface_mut(|surface| surface.clear_selection_marks());
        self.select(Selection::None);
    }

    /// Forget the selection without touching any surface, used when the scene is replaced.
    pub fn reset_state(&self) {
        self.select(Selection::None);
    }

    fn select(&self, selection: Selection) -> Selection {
        self.selection.send_replace(selection.clone());
        selection
    }

    /// Replace the highlight with `ids` and every edge touching them.
    pub fn highlight(&self, manager: &mut SurfaceManager, ids: &HashSet<String>) -> bool {
        let applied = manager.with_surface_mut(|surface| {
            let edges = surface.scene().edges_touching(ids);
            surface.clear_highlight();
            surface.add_highlight(ids, &edges);
        });
        if applied.is_none() {
            tracing::warn!(nodes = ids.len(), "No live render surface, ignoring highlight");
        }
        applied.is_some()
    }

    /// Highlight entities whose label or type contains `query`, case-insensitively.
    ///
    /// An empty query clears the highlight. Matches are fitted into view; no
    /// match leaves the viewport where it was. Returns matched IDs in scene order.
    pub fn search(
        &self,
        manager: &mut SurfaceManager,
        viewport: &ViewportController,
        query: &str,
    ) -> Vec<String> {
        let needle = query.to_lowercase();
        if needle.is_empty() {
            if manager.with_surface_mut(|surface| surface.clear_highlight()).is_none() {
                tracing::warn!("No live render surface, ignoring search");
            }
            return Vec::new();
        }

        let Some(matches) = manager.with_surface(|surface| {
            surface
                .scene()
                .entities
                .iter()
                .filter(|e| e.matches(&needle))
                .map(|e| e.id.clone())
                .collect::<Vec<_>>()
        }) else {
            tracing::warn!(query, "No live render surface, ignoring search");
            return Vec::new();
        };

        let ids: HashSet<String> = matches.iter().cloned().collect();
        self.highlight(manager, &ids);
        if !ids.is_empty() {
            viewport.fit(manager, Some(&ids), viewport.config().search_fit_padding);
        }
        tracing::debug!(query, matches = matches.len(), "Search applied");
        matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SceneConfig, ViewportConfig};
    use crate::models::VisualOverrides;
    use crate::visualization::layout::LayoutOrchestrator;
    use crate::visualization::scene::build_scene;
    use crate::visualization::surface::{HeadlessMount, StyleSheet};
    use std::sync::Mutex;

    fn ready_manager() -> SurfaceManager {
        let scene = Arc::new(build_scene(
            &[
                Entity::new("1", "Alice", "Person"),
                Entity::new("2", "Acme", "Org"),
                Entity::new("3", "Paris", "Location"),
                Entity::new("4", "Bob", "Person"),
            ],
            &[
                Relation::new("r1", "1", "2", "works_for"),
                Relation::new("r2", "2", "3", "located_in"),
            ],
            &VisualOverrides::default(),
            &SceneConfig::default(),
        ));
        let mount = Arc::new(HeadlessMount::new("graph", 800.0, 600.0));
        let mut manager = SurfaceManager::new(mount, StyleSheet::default(), LayoutOrchestrator::default());
        manager.initialize(scene, "grid").unwrap();
        manager
    }

    fn set(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_node_tap_selects_and_marks_neighborhood() {
        let mut manager = ready_manager();
        let interaction = InteractionController::new();
        let mut rx = interaction.subscribe();

        let selection = interaction.on_node_tap(&mut manager, "2").unwrap();
        assert_eq!(selection.selected_entity().map(|e| e.label.as_str()), Some("Acme"));
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().selected_entity().unwrap().id, "2");

        let (nodes, edges) = manager
            .with_surface(|s| (s.selected_nodes().clone(), s.selected_edges().clone()))
            .unwrap();
        assert_eq!(nodes, set(&["1", "2", "3"]));
        assert_eq!(edges, set(&["r1", "r2"]));
    }

    #[test]
    fn test_edge_tap_selects_relation() {
        let mut manager = ready_manager();
        let interaction = InteractionController::new();

        let selection = interaction.on_edge_tap(&mut manager, "r1").unwrap();
        assert_eq!(selection.selected_relation().unwrap().relation_type, "works_for");
        let nodes = manager.with_surface(|s| s.selected_nodes().clone()).unwrap();
        assert_eq!(nodes, set(&["1", "2"]));
    }

    #[test]
    fn test_unknown_ids_are_ignored() {
        let mut manager = ready_manager();
        let interaction = InteractionController::new();
        interaction.on_node_tap(&mut manager, "1");

        assert!(interaction.on_node_tap(&mut manager, "ghost").is_none());
        assert!(interaction.on_edge_tap(&mut manager, "ghost").is_none());
        assert_eq!(interaction.current().selected_entity().unwrap().id, "1");
    }

    #[test]
    fn test_callbacks_fire_on_notify() {
        let mut manager = ready_manager();
        let mut interaction = InteractionController::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        interaction.set_on_entity_selected(Arc::new(move |e: &Entity| {
            sink.lock().unwrap().push(e.id.clone());
        }));

        let selection = interaction.on_node_tap(&mut manager, "4").unwrap();
        interaction.callbacks().notify(&selection);
        interaction.callbacks().notify(&Selection::None);
        assert_eq!(*seen.lock().unwrap(), vec!["4".to_string()]);
    }

    #[test]
    fn test_highlight_replaces_previous_marks() {
        let mut manager = ready_manager();
        let interaction = InteractionController::new();

        assert!(interaction.highlight(&mut manager, &set(&["1"])));
        assert!(interaction.highlight(&mut manager, &set(&["3", "ghost"])));
        let (nodes, edges) = manager
            .with_surface(|s| (s.highlighted_nodes().clone(), s.highlighted_edges().clone()))
            .unwrap();
        assert_eq!(nodes, set(&["3"]));
        assert_eq!(edges, set(&["r2"]));
    }

    #[test]
    fn test_search_matches_label_and_type() {
        let mut manager = ready_manager();
        let interaction = InteractionController::new();
        let viewport = ViewportController::new(ViewportConfig::default());

        let matches = interaction.search(&mut manager, &viewport, "PERSON");
        assert_eq!(matches, vec!["1".to_string(), "4".to_string()]);
        assert_ne!(viewport.current(), Default::default());

        let matches = interaction.search(&mut manager, &viewport, "acm");
        assert_eq!(matches, vec!["2".to_string()]);
        let nodes = manager.with_surface(|s| s.highlighted_nodes().clone()).unwrap();
        assert_eq!(nodes, set(&["2"]));
    }

    #[test]
    fn test_search_without_matches_keeps_viewport() {
        let mut manager = ready_manager();
        let interaction = InteractionController::new();
        let viewport = ViewportController::new(ViewportConfig::default());
        interaction.search(&mut manager, &viewport, "alice");
        let before = manager.with_surface(|s| s.viewport()).unwrap();

        assert!(interaction.search(&mut manager, &viewport, "zzz").is_empty());
        let (view, highlighted) = manager
            .with_surface(|s| (s.viewport(), s.highlighted_nodes().len()))
            .unwrap();
        assert_eq!(view, before);
        assert_eq!(highlighted, 0);
    }

    #[test]
    fn test_empty_search_clears_highlight() {
        let mut manager = ready_manager();
        let interaction = InteractionController::new();
        let viewport = ViewportController::new(ViewportConfig::default());
        interaction.search(&mut manager, &viewport, "acme");

        assert!(interaction.search(&mut manager, &viewport, "").is_empty());
        assert!(manager
            .with_surface(|s| s.highlighted_nodes().is_empty())
            .unwrap());
    }

    #[test]
    fn test_search_whitespace_is_literal() {
        let mut manager = ready_manager();
        let interaction = InteractionController::new();
        let viewport = ViewportController::new(ViewportConfig::default());

        assert!(interaction.search(&mut manager, &viewport, " acme").is_empty());
        assert!(interaction.search(&mut manager, &viewport, "   ").is_empty());
        assert_eq!(
            interaction.search(&mut manager, &viewport, "acme"),
            vec!["2".to_string()]
        );
    }
}
