//! Entity and relation models: the domain nodes and edges of a graph.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Open property bag attached to entities and relations.
pub type Properties = HashMap<String, Value>;

/// A typed node in the domain graph.
///
/// Identity is the `id`; `entity_type` drives the default visual
/// classification. Entities are replaced wholesale on reload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Unique identifier.
    pub id: String,
    /// Human-readable label.
    pub label: String,
    /// Open type tag (Person, Organization, ...).
    #[serde(rename = "type")]
    pub entity_type: String,
    /// Arbitrary properties.
    #[serde(default)]
    pub properties: Properties,
}

impl Entity {
    /// Creates an entity with no properties.
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        entity_type: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            entity_type: entity_type.into(),
            properties: Properties::new(),
        }
    }

    /// Adds a property, builder style.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Case-insensitive substring match against label and type.
    ///
    /// `needle` must already be lowercase.
    pub fn matches(&self, needle: &str) -> bool {
        self.label.to_lowercase().contains(needle)
            || self.entity_type.to_lowercase().contains(needle)
    }
}

/// A typed, directed edge between two entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    /// Unique identifier.
    pub id: String,
    /// Source entity ID.
    pub source: String,
    /// Target entity ID.
    pub target: String,
    /// Relation type (works_for, located_in, ...).
    #[serde(rename = "type")]
    pub relation_type: String,
    /// Arbitrary properties.
    #[serde(default)]
    pub properties: Properties,
}

impl Relation {
    /// Creates a relation with no properties.
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
        relation_type: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            relation_type: relation_type.into(),
            properties: Properties::new(),
        }
    }

    /// Adds a property, builder style.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// Read a finite numeric property, accepting numbers and numeric strings.
///
/// Missing or malformed values yield `None` so callers can fall back to a default.
pub fn property_number(properties: &Properties, key: &str) -> Option<f64> {
    let value = match properties.get(key)? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    value.is_finite().then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entity_deserializes_type_field() {
        let entity: Entity =
            serde_json::from_value(json!({"id": "1", "label": "Alice", "type": "Person"}))
                .unwrap();
        assert_eq!(entity.entity_type, "Person");
        assert!(entity.properties.is_empty());
    }

    #[test]
    fn test_entity_matches_is_case_insensitive() {
        let entity = Entity::new("1", "Alice", "Person");
        assert!(entity.matches("alice"));
        assert!(entity.matches("pers"));
        assert!(!entity.matches("acme"));
    }

    #[test]
    fn test_property_number_defensive() {
        let entity = Entity::new("1", "A", "T")
            .with_property("a", 3)
            .with_property("b", " 4.5 ")
            .with_property("c", "many")
            .with_property("d", json!([1, 2]));
        assert_eq!(property_number(&entity.properties, "a"), Some(3.0));
        assert_eq!(property_number(&entity.properties, "b"), Some(4.5));
        assert_eq!(property_number(&entity.properties, "c"), None);
        assert_eq!(property_number(&entity.properties, "d"), None);
        assert_eq!(property_number(&entity.properties, "missing"), None);
    }
}
