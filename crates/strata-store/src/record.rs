//! Stored records and entity identity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Identity of one entity instance, stable across sessions and commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(Uuid);

impl EntityId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Field values keyed by attribute name.
pub type FieldMap = BTreeMap<String, Value>;

/// Committed records keyed by identity.
pub type RecordMap = BTreeMap<EntityId, StoredRecord>;

/// One committed entity instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredRecord {
    pub id: EntityId,
    pub kind: String,
    #[serde(default)]
    pub fields: FieldMap,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredRecord {
    pub fn new(id: EntityId, kind: impl Into<String>, fields: FieldMap) -> Self {
        let now = Utc::now();
        Self {
            id,
            kind: kind.into(),
            fields,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a field delta, refreshing `updated_at`.
    pub fn apply_delta(&mut self, delta: &FieldMap) {
        for (name, value) in delta {
            self.fields.insert(name.clone(), value.clone());
        }
        self.updated_at = Utc::now();
    }
}
