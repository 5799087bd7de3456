//! Schema descriptors: entities, attributes, relationships.
//!
//! A `Model` is immutable once built. Validation happens at construction
//! (`ModelBuilder::build`) or at bundle load time, never during commits.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::ModelError;

/// The value kind an attribute admits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKind {
    Text,
    Integer,
    Float,
    Boolean,
    /// RFC 3339 timestamp, stored as a JSON string.
    Timestamp,
    /// Arbitrary JSON payload; no conformance check beyond being present.
    Json,
}

impl AttributeKind {
    /// Whether `value` conforms to this kind.
    ///
    /// `Null` is admitted everywhere: absence of a value is a storage
    /// concern, not a schema violation.
    pub fn admits(&self, value: &Value) -> bool {
        match self {
            AttributeKind::Text => value.is_string() || value.is_null(),
            AttributeKind::Integer => value.is_i64() || value.is_u64() || value.is_null(),
            AttributeKind::Float => value.is_number() || value.is_null(),
            AttributeKind::Boolean => value.is_boolean() || value.is_null(),
            AttributeKind::Timestamp => value.is_string() || value.is_null(),
            AttributeKind::Json => true,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeKind::Text => "text",
            AttributeKind::Integer => "integer",
            AttributeKind::Float => "float",
            AttributeKind::Boolean => "boolean",
            AttributeKind::Timestamp => "timestamp",
            AttributeKind::Json => "json",
        }
    }
}

/// A named, typed attribute of an entity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub kind: AttributeKind,
    #[serde(default)]
    pub optional: bool,
}

/// A named edge from one entity to another.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Relationship {
    pub name: String,
    pub target: String,
    #[serde(default)]
    pub to_many: bool,
}

/// One entity description: attributes plus outgoing relationships.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Entity {
    pub name: String,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

impl Entity {
    /// Lookup an attribute by name.
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Lookup a relationship by name.
    pub fn relationship(&self, name: &str) -> Option<&Relationship> {
        self.relationships.iter().find(|r| r.name == name)
    }
}

/// The immutable schema shared by the store coordinator and every session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Model {
    pub name: String,
    entities: BTreeMap<String, Entity>,
}

impl Model {
    pub fn builder(name: impl Into<String>) -> ModelBuilder {
        ModelBuilder {
            name: name.into(),
            entities: Vec::new(),
        }
    }

    /// Lookup one entity description by name.
    pub fn entity(&self, name: &str) -> Option<&Entity> {
        self.entities.get(name)
    }

    pub fn has_entity(&self, name: &str) -> bool {
        self.entities.contains_key(name)
    }

    /// Iterate entities in deterministic name order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Validate structural constraints over a parsed entity list.
    ///
    /// Rejects duplicate entity names, duplicate attribute or relationship
    /// names within an entity, and relationships targeting unknown entities.
    pub fn from_entities(
        name: impl Into<String>,
        entities: Vec<Entity>,
    ) -> Result<Self, ModelError> {
        let name = name.into();
        let mut index: BTreeMap<String, Entity> = BTreeMap::new();

        for entity in &entities {
            if index.contains_key(&entity.name) {
                return Err(ModelError::Invalid {
                    name,
                    message: format!("duplicate entity: {}", entity.name),
                });
            }

            let mut seen = std::collections::BTreeSet::new();
            for attribute in &entity.attributes {
                if !seen.insert(attribute.name.as_str()) {
                    return Err(ModelError::Invalid {
                        name,
                        message: format!(
                            "entity {}: duplicate attribute: {}",
                            entity.name, attribute.name
                        ),
                    });
                }
            }
            for relationship in &entity.relationships {
                if !seen.insert(relationship.name.as_str()) {
                    return Err(ModelError::Invalid {
                        name,
                        message: format!(
                            "entity {}: duplicate relationship: {}",
                            entity.name, relationship.name
                        ),
                    });
                }
            }

            index.insert(entity.name.clone(), entity.clone());
        }

        for entity in index.values() {
            for relationship in &entity.relationships {
                if !index.contains_key(&relationship.target) {
                    return Err(ModelError::Invalid {
                        name,
                        message: format!(
                            "entity {}: relationship {} targets unknown entity {}",
                            entity.name, relationship.name, relationship.target
                        ),
                    });
                }
            }
        }

        Ok(Self {
            name,
            entities: index,
        })
    }
}

/// Builder for in-code model construction (used heavily by tests).
#[derive(Debug, Clone)]
pub struct ModelBuilder {
    name: String,
    entities: Vec<Entity>,
}

impl ModelBuilder {
    pub fn entity(mut self, entity: Entity) -> Self {
        self.entities.push(entity);
        self
    }

    pub fn build(self) -> Result<Model, ModelError> {
        Model::from_entities(self.name, self.entities)
    }
}

/// Shorthand attribute constructor.
pub fn attr(name: impl Into<String>, kind: AttributeKind) -> Attribute {
    Attribute {
        name: name.into(),
        kind,
        optional: false,
    }
}
