//! Filter options driving which part of the domain graph is requested.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use super::entity::{property_number, Entity, Relation};
use super::graph::GraphQuery;

/// Filters selected in the host chrome. Changing any field triggers a reload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterOptions {
    /// Entity types to request (empty means all).
    pub entity_types: BTreeSet<String>,
    /// Relation types to request (empty means all).
    pub relation_types: BTreeSet<String>,
    /// Minimum number of connections an entity needs to be shown.
    pub min_connections: usize,
    /// Maximum number of entities to request; `0` means the configured default.
    pub max_nodes: usize,
    /// Free-text search forwarded to the backend.
    pub search_query: String,
}

impl FilterOptions {
    /// Build the backend request for these filters.
    pub fn to_query(&self, default_max_nodes: usize) -> GraphQuery {
        let limit = if self.max_nodes == 0 {
            default_max_nodes.max(1)
        } else {
            self.max_nodes
        };
        let search = self.search_query.trim();

        GraphQuery {
            entity_types: (!self.entity_types.is_empty())
                .then(|| self.entity_types.iter().cloned().collect()),
            relation_types: (!self.relation_types.is_empty())
                .then(|| self.relation_types.iter().cloned().collect()),
            limit,
            search: (!search.is_empty()).then(|| search.to_string()),
        }
    }

    /// Drop entities with fewer than `min_connections` connections.
    ///
    /// An explicit `connections` property wins over the degree counted from
    /// `relations`. Input order is preserved.
    pub fn retain_connected(&self, entities: Vec<Entity>, relations: &[Relation]) -> Vec<Entity> {
        if self.min_connections == 0 {
            return entities;
        }

        let mut degree: HashMap<&str, usize> = HashMap::new();
        for relation in relations {
            *degree.entry(relation.source.as_str()).or_default() += 1;
            *degree.entry(relation.target.as_str()).or_default() += 1;
        }

        let min = self.min_connections;
        entities
            .into_iter()
            .filter(|entity| {
                let connections = property_number(&entity.properties, "connections")
                    .map(|c| c.max(0.0) as usize)
                    .unwrap_or_else(|| degree.get(entity.id.as_str()).copied().unwrap_or(0));
                connections >= min
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_query_defaults() {
        let filters = FilterOptions::default();
        let query = filters.to_query(200);
        assert_eq!(query.limit, 200);
        assert!(query.entity_types.is_none());
        assert!(query.relation_types.is_none());
        assert!(query.search.is_none());
    }

    #[test]
    fn test_to_query_with_filters() {
        let filters = FilterOptions {
            entity_types: ["Person".to_string()].into(),
            max_nodes: 25,
            search_query: "  ali ".to_string(),
            ..Default::default()
        };
        let query = filters.to_query(200);
        assert_eq!(query.limit, 25);
        assert_eq!(query.entity_types, Some(vec!["Person".to_string()]));
        assert_eq!(query.search.as_deref(), Some("ali"));
    }

    #[test]
    fn test_retain_connected() {
        let entities = vec![
            Entity::new("1", "A", "T"),
            Entity::new("2", "B", "T"),
            Entity::new("3", "C", "T"),
            Entity::new("4", "D", "T").with_property("connections", 9),
        ];
        let relations = vec![Relation::new("r1", "1", "2", "x"), Relation::new("r2", "1", "3", "x")];
        let filters = FilterOptions {
            min_connections: 2,
            ..Default::default()
        };

        let kept: Vec<String> = filters
            .retain_connected(entities, &relations)
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(kept, vec!["1", "4"]);
    }
}
