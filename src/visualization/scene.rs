//! Graph model adapter: domain entities/relations to a renderer-facing scene.
//!
//! Scene building is pure. The same entities, relations, overrides and
//! sizing config always produce the same scene.

use std::collections::{HashMap, HashSet};

use crate::config::SceneConfig;
use crate::models::{
    property_number, DomainGraph, Entity, GraphStatistics, Relation, VisualOverrides,
};

use super::constants::{
    node_color_for_type, normalize_type, COLOR_EDGE_DEFAULT, DEFAULT_EDGE_WEIGHT,
};

/// A node as the renderer sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct VisualNode {
    pub id: String,
    pub label: String,
    /// Raw entity type.
    pub node_type: String,
    /// Clamped visual diameter.
    pub size: f64,
    pub color: String,
    /// Classification tag derived from the normalized type (`type-person`).
    pub class: String,
}

/// An edge as the renderer sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct VisualEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    /// Relation type.
    pub label: String,
    pub color: String,
    pub weight: f64,
}

/// Renderer-facing collection of visual nodes and edges.
///
/// Keeps the entities and relations it was built from so selection can
/// resolve IDs back to domain objects.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scene {
    pub nodes: Vec<VisualNode>,
    pub edges: Vec<VisualEdge>,
    pub entities: Vec<Entity>,
    pub relations: Vec<Relation>,
    /// Relations excluded because an endpoint was missing.
    pub dropped_relations: usize,
    /// Entities excluded because their ID was already taken.
    pub duplicate_entities: usize,
    node_index: HashMap<String, usize>,
    edge_index: HashMap<String, usize>,
}

impl Scene {
    /// Build a scene from a domain graph.
    pub fn build(graph: &DomainGraph, config: &SceneConfig) -> Self {
        build_scene(&graph.entities, &graph.relations, &graph.overrides, config)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&VisualNode> {
        self.node_index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn edge(&self, id: &str) -> Option<&VisualEdge> {
        self.edge_index.get(id).map(|&i| &self.edges[i])
    }

    pub fn node_idx(&self, id: &str) -> Option<usize> {
        self.node_index.get(id).copied()
    }

    pub fn entity(&self, id: &str) -> Option<&Entity> {
        self.node_index.get(id).map(|&i| &self.entities[i])
    }

    pub fn relation(&self, id: &str) -> Option<&Relation> {
        self.edge_index.get(id).map(|&i| &self.relations[i])
    }

    /// IDs of edges touching any of `node_ids`.
    pub fn edges_touching(&self, node_ids: &HashSet<String>) -> HashSet<String> {
        self.edges
            .iter()
            .filter(|e| node_ids.contains(&e.source) || node_ids.contains(&e.target))
            .map(|e| e.id.clone())
            .collect()
    }

    /// IDs of nodes directly connected to `id`, excluding `id` itself.
    pub fn neighbors(&self, id: &str) -> HashSet<String> {
        self.edges
            .iter()
            .filter_map(|e| {
                if e.source == id && e.target != id {
                    Some(e.target.clone())
                } else if e.target == id && e.source != id {
                    Some(e.source.clone())
                } else {
                    None
                }
            })
            .collect()
    }

    /// Edges as `(source_idx, target_idx)` pairs, in edge order.
    pub fn index_pairs(&self) -> Vec<(usize, usize)> {
        self.edges
            .iter()
            .filter_map(|e| Some((self.node_idx(&e.source)?, self.node_idx(&e.target)?)))
            .collect()
    }

    /// Counts by type over what is actually rendered.
    pub fn statistics(&self) -> GraphStatistics {
        GraphStatistics::from_parts(&self.entities, &self.relations)
    }
}

/// Convert entities and relations into a scene.
///
/// Every entity becomes a visual node (duplicate IDs after the first are
/// skipped). Every relation whose endpoints both exist becomes a visual
/// edge; the rest are counted in `dropped_relations` and logged.
pub fn build_scene(
    entities: &[Entity],
    relations: &[Relation],
    overrides: &VisualOverrides,
    config: &SceneConfig,
) -> Scene {
    let mut scene = Scene::default();

    for entity in entities {
        if scene.node_index.contains_key(&entity.id) {
            scene.duplicate_entities += 1;
            continue;
        }
        let node_override = overrides.nodes.get(&entity.id);
        let normalized = normalize_type(&entity.entity_type);

        let size = node_size(
            entity,
            node_override.and_then(|o| o.size),
            config,
        );
        let color = node_override
            .and_then(|o| o.color.clone())
            .unwrap_or_else(|| node_color_for_type(&normalized).to_string());

        scene.node_index.insert(entity.id.clone(), scene.nodes.len());
        scene.nodes.push(VisualNode {
            id: entity.id.clone(),
            label: entity.label.clone(),
            node_type: entity.entity_type.clone(),
            size,
            color,
            class: format!("type-{}", normalized),
        });
        scene.entities.push(entity.clone());
    }

    for relation in relations {
        let endpoints_present = scene.node_index.contains_key(&relation.source)
            && scene.node_index.contains_key(&relation.target);
        if !endpoints_present || scene.edge_index.contains_key(&relation.id) {
            scene.dropped_relations += 1;
            continue;
        }

        let color = overrides
            .edges
            .get(&relation.id)
            .and_then(|o| o.color.clone())
            .or_else(|| relation.properties.get("color").and_then(|v| v.as_str()).map(str::to_string))
            .unwrap_or_else(|| COLOR_EDGE_DEFAULT.to_string());
        let weight = property_number(&relation.properties, "weight")
            .filter(|w| *w > 0.0)
            .unwrap_or(DEFAULT_EDGE_WEIGHT);

        scene.edge_index.insert(relation.id.clone(), scene.edges.len());
        scene.edges.push(VisualEdge {
            id: relation.id.clone(),
            source: relation.source.clone(),
            target: relation.target.clone(),
            label: relation.relation_type.clone(),
            color,
            weight,
        });
        scene.relations.push(relation.clone());
    }

    if scene.dropped_relations > 0 {
        tracing::warn!(
            dropped = scene.dropped_relations,
            "Dropped relations with a missing endpoint or duplicate ID"
        );
    }
    if scene.duplicate_entities > 0 {
        tracing::warn!(
            duplicates = scene.duplicate_entities,
            "Skipped entities with duplicate IDs"
        );
    }

    scene
}

/// Visual size: explicit override, else derived from the `connections` property.
///
/// Always clamped to `[min_node_size, max_node_size]`, so zero-connection and
/// malformed inputs still get the minimum size.
fn node_size(entity: &Entity, size_override: Option<f64>, config: &SceneConfig) -> f64 {
    let raw = size_override
        .filter(|s| s.is_finite())
        .unwrap_or_else(|| {
            let connections = property_number(&entity.properties, "connections")
                .unwrap_or(0.0)
                .max(0.0);
            config.min_node_size + connections * config.size_per_connection
        });
    raw.clamp(config.min_node_size, config.max_node_size.max(config.min_node_size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VisualOverride;

    fn sample() -> (Vec<Entity>, Vec<Relation>) {
        (
            vec![
                Entity::new("1", "Alice", "Person"),
                Entity::new("2", "Acme", "Org"),
            ],
            vec![Relation::new("r1", "1", "2", "works_for")],
        )
    }

    #[test]
    fn test_build_scene_scenario() {
        let (entities, relations) = sample();
        let scene = build_scene(
            &entities,
            &relations,
            &VisualOverrides::default(),
            &SceneConfig::default(),
        );

        assert_eq!(scene.nodes.len(), 2);
        assert_eq!(scene.edges.len(), 1);
        assert_eq!(scene.nodes[0].class, "type-person");
        assert_eq!(scene.nodes[1].color, "#10b981");
        assert_eq!(scene.edges[0].label, "works_for");
        assert_eq!(scene.edges[0].weight, 1.0);
        assert_eq!(scene.dropped_relations, 0);
    }

    #[test]
    fn test_build_scene_is_pure() {
        let (entities, relations) = sample();
        let config = SceneConfig::default();
        let a = build_scene(&entities, &relations, &VisualOverrides::default(), &config);
        let b = build_scene(&entities, &relations, &VisualOverrides::default(), &config);
        assert_eq!(a, b);
    }

    #[test]
    fn test_dangling_relation_dropped() {
        let (entities, mut relations) = sample();
        relations.push(Relation::new("r2", "1", "3", "knows"));
        relations.push(Relation::new("r3", "2", "1", "employs"));

        let scene = build_scene(
            &entities,
            &relations,
            &VisualOverrides::default(),
            &SceneConfig::default(),
        );

        let ids: Vec<&str> = scene.edges.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["r1", "r3"]);
        assert_eq!(scene.dropped_relations, 1);
        assert_eq!(scene.nodes.len(), 2);
        assert!(scene.relation("r2").is_none());

        // Statistics count what is rendered, not what was requested.
        let stats = scene.statistics();
        assert_eq!(stats.total_relations, 2);
        assert!(!stats.relation_types.contains_key("knows"));
    }

    #[test]
    fn test_node_size_clamped_and_defaulted() {
        let config = SceneConfig::default();
        let entities = vec![
            Entity::new("a", "A", "T"),
            Entity::new("b", "B", "T").with_property("connections", 5),
            Entity::new("c", "C", "T").with_property("connections", 1000),
            Entity::new("d", "D", "T").with_property("connections", "lots"),
            Entity::new("e", "E", "T").with_property("connections", -4),
        ];
        let scene = build_scene(&entities, &[], &VisualOverrides::default(), &config);
        let sizes: Vec<f64> = scene.nodes.iter().map(|n| n.size).collect();
        assert_eq!(sizes, vec![20.0, 30.0, 60.0, 20.0, 20.0]);
    }

    #[test]
    fn test_overrides_win() {
        let (entities, relations) = sample();
        let mut overrides = VisualOverrides::default();
        overrides.nodes.insert(
            "1".to_string(),
            VisualOverride {
                size: Some(45.0),
                color: Some("#000000".to_string()),
            },
        );
        overrides.edges.insert(
            "r1".to_string(),
            VisualOverride {
                size: None,
                color: Some("#123456".to_string()),
            },
        );
        let scene = build_scene(&entities, &relations, &overrides, &SceneConfig::default());
        assert_eq!(scene.nodes[0].size, 45.0);
        assert_eq!(scene.nodes[0].color, "#000000");
        assert_eq!(scene.edges[0].color, "#123456");
    }

    #[test]
    fn test_duplicate_entity_ids_keep_first() {
        let entities = vec![
            Entity::new("1", "First", "Person"),
            Entity::new("1", "Second", "Person"),
        ];
        let scene = build_scene(&entities, &[], &VisualOverrides::default(), &SceneConfig::default());
        assert_eq!(scene.nodes.len(), 1);
        assert_eq!(scene.nodes[0].label, "First");
        assert_eq!(scene.duplicate_entities, 1);
    }

    #[test]
    fn test_neighbors_and_edges_touching() {
        let (entities, relations) = sample();
        let scene = build_scene(&entities, &relations, &VisualOverrides::default(), &SceneConfig::default());
        assert_eq!(scene.neighbors("1"), HashSet::from(["2".to_string()]));
        let touching = scene.edges_touching(&HashSet::from(["2".to_string()]));
        assert!(touching.contains("r1"));
        assert_eq!(scene.index_pairs(), vec![(0, 1)]);
    }
}
