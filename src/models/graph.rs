//! Graph payloads exchanged with the backend and the host.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::entity::{Entity, Properties, Relation};

/// Backend graph query, scoped to a project by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_types: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relation_types: Option<Vec<String>>,
    pub limit: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

/// Backend graph query result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphResponse {
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub relations: Vec<Relation>,
}

/// Aggregate counts by entity and relation type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphStatistics {
    pub total_entities: usize,
    pub total_relations: usize,
    pub entity_types: BTreeMap<String, usize>,
    pub relation_types: BTreeMap<String, usize>,
}

impl GraphStatistics {
    /// Count entities and relations by type.
    pub fn from_parts(entities: &[Entity], relations: &[Relation]) -> Self {
        let mut stats = Self {
            total_entities: entities.len(),
            total_relations: relations.len(),
            ..Default::default()
        };
        for entity in entities {
            *stats.entity_types.entry(entity.entity_type.clone()).or_default() += 1;
        }
        for relation in relations {
            *stats
                .relation_types
                .entry(relation.relation_type.clone())
                .or_default() += 1;
        }
        stats
    }
}

// ============================================================================
// External data mode
// ============================================================================

/// A node supplied directly by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalNode {
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default, rename = "type")]
    pub node_type: Option<String>,
    /// Visual size override.
    #[serde(default)]
    pub size: Option<f64>,
    /// Visual color override.
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub properties: Properties,
}

/// An edge supplied directly by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalEdge {
    #[serde(default)]
    pub id: Option<String>,
    pub source: String,
    pub target: String,
    #[serde(default, alias = "type")]
    pub label: Option<String>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub properties: Properties,
}

impl ExternalNode {
    /// A bare node: label and type fall back to defaults on conversion.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: None,
            node_type: None,
            size: None,
            color: None,
            properties: Properties::new(),
        }
    }
}

impl ExternalEdge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: None,
            source: source.into(),
            target: target.into(),
            label: None,
            weight: None,
            color: None,
            properties: Properties::new(),
        }
    }
}

/// Ready-made node/edge lists that bypass the backend query entirely.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphData {
    #[serde(default)]
    pub nodes: Vec<ExternalNode>,
    #[serde(default)]
    pub edges: Vec<ExternalEdge>,
}

/// Size/color supplied by the host for a single node or edge.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisualOverride {
    pub size: Option<f64>,
    pub color: Option<String>,
}

/// Per-id visual overrides, keyed by node/edge ID.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisualOverrides {
    pub nodes: HashMap<String, VisualOverride>,
    pub edges: HashMap<String, VisualOverride>,
}

/// Entities and relations plus any visual overrides that came with them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DomainGraph {
    pub entities: Vec<Entity>,
    pub relations: Vec<Relation>,
    pub overrides: VisualOverrides,
}

impl From<GraphResponse> for DomainGraph {
    fn from(response: GraphResponse) -> Self {
        Self {
            entities: response.entities,
            relations: response.relations,
            overrides: VisualOverrides::default(),
        }
    }
}

impl GraphData {
    /// Convert host-supplied nodes/edges into domain entities and relations.
    ///
    /// Missing labels fall back to the node ID, missing types to `"default"`.
    /// Edges without an ID get `"<source>-<target>-<index>"`. Edge weights are
    /// carried as a `weight` property.
    pub fn to_domain(&self) -> DomainGraph {
        let mut overrides = VisualOverrides::default();

        let entities = self
            .nodes
            .iter()
            .map(|node| {
                if node.size.is_some() || node.color.is_some() {
                    overrides.nodes.insert(
                        node.id.clone(),
                        VisualOverride {
                            size: node.size,
                            color: node.color.clone(),
                        },
                    );
                }
                Entity {
                    id: node.id.clone(),
                    label: node.label.clone().unwrap_or_else(|| node.id.clone()),
                    entity_type: node
                        .node_type
                        .clone()
                        .unwrap_or_else(|| "default".to_string()),
                    properties: node.properties.clone(),
                }
            })
            .collect();

        let relations = self
            .edges
            .iter()
            .enumerate()
            .map(|(i, edge)| {
                let id = edge
                    .id
                    .clone()
                    .unwrap_or_else(|| format!("{}-{}-{}", edge.source, edge.target, i));
                if edge.color.is_some() {
                    overrides.edges.insert(
                        id.clone(),
                        VisualOverride {
                            size: None,
                            color: edge.color.clone(),
                        },
                    );
                }
                let mut properties = edge.properties.clone();
                if let Some(weight) = edge.weight {
                    properties.insert("weight".to_string(), weight.into());
                }
                Relation {
                    id,
                    source: edge.source.clone(),
                    target: edge.target.clone(),
                    relation_type: edge.label.clone().unwrap_or_default(),
                    properties,
                }
            })
            .collect();

        DomainGraph {
            entities,
            relations,
            overrides,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::property_number;
    use serde_json::json;

    #[test]
    fn test_graph_data_to_domain() {
        let data: GraphData = serde_json::from_value(json!({
            "nodes": [
                {"id": "a", "label": "Alpha", "type": "Person", "color": "#ff0000"},
                {"id": "b"}
            ],
            "edges": [
                {"source": "a", "target": "b", "label": "knows", "weight": 2.5}
            ]
        }))
        .unwrap();

        let domain = data.to_domain();
        assert_eq!(domain.entities.len(), 2);
        assert_eq!(domain.entities[1].label, "b");
        assert_eq!(domain.entities[1].entity_type, "default");
        assert_eq!(domain.relations[0].id, "a-b-0");
        assert_eq!(domain.relations[0].relation_type, "knows");
        assert_eq!(
            property_number(&domain.relations[0].properties, "weight"),
            Some(2.5)
        );
        assert_eq!(
            domain.overrides.nodes["a"].color.as_deref(),
            Some("#ff0000")
        );
        assert!(!domain.overrides.nodes.contains_key("b"));
    }

    #[test]
    fn test_statistics_from_parts() {
        let entities = vec![
            Entity::new("1", "Alice", "Person"),
            Entity::new("2", "Bob", "Person"),
            Entity::new("3", "Acme", "Org"),
        ];
        let relations = vec![Relation::new("r1", "1", "3", "works_for")];
        let stats = GraphStatistics::from_parts(&entities, &relations);
        assert_eq!(stats.total_entities, 3);
        assert_eq!(stats.entity_types["Person"], 2);
        assert_eq!(stats.relation_types["works_for"], 1);
    }
}
