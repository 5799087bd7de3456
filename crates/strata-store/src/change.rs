//! Change sets: the pending, not-yet-propagated edits of one session.
//!
//! A `ChangeSet` is both a session's working set and the input to
//! `StoreCoordinator::commit`. Absorption (`absorb`) is the in-memory merge
//! of a child set into a parent set; conflicts resolve deterministically
//! last-absorbed-wins per field.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::record::{EntityId, FieldMap};

/// One pending change for one identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum EntityChange {
    /// A new instance with its full field map.
    Insert { kind: String, fields: FieldMap },
    /// A field delta against the committed (or inserted) state.
    Update { fields: FieldMap },
    /// Removal of the instance.
    Delete,
}

/// Pending changes keyed by identity.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChangeSet {
    changes: BTreeMap<EntityId, EntityChange>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an insert, generating a fresh identity.
    pub fn insert(&mut self, kind: impl Into<String>, fields: FieldMap) -> EntityId {
        let id = EntityId::generate();
        self.changes.insert(
            id,
            EntityChange::Insert {
                kind: kind.into(),
                fields,
            },
        );
        id
    }

    /// Record a field delta for `id`, composing with any pending change.
    pub fn update(&mut self, id: EntityId, delta: FieldMap) {
        let composed = match self.changes.remove(&id) {
            Some(EntityChange::Insert { kind, mut fields }) => {
                fields.extend(delta);
                EntityChange::Insert { kind, fields }
            }
            Some(EntityChange::Update { mut fields }) => {
                fields.extend(delta);
                EntityChange::Update { fields }
            }
            // The newer intent wins, including over a pending delete.
            Some(EntityChange::Delete) | None => EntityChange::Update { fields: delta },
        };
        self.changes.insert(id, composed);
    }

    /// Record a deletion for `id`, superseding any pending change.
    pub fn delete(&mut self, id: EntityId) {
        self.changes.insert(id, EntityChange::Delete);
    }

    pub fn get(&self, id: &EntityId) -> Option<&EntityChange> {
        self.changes.get(id)
    }

    /// Whether `id` has a pending local change.
    pub fn is_dirty(&self, id: &EntityId) -> bool {
        self.changes.contains_key(id)
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn clear(&mut self) {
        self.changes.clear();
    }

    /// Identities touched by this set, in deterministic order.
    pub fn identities(&self) -> BTreeSet<EntityId> {
        self.changes.keys().copied().collect()
    }

    /// Iterate pending changes in identity order.
    pub fn iter(&self) -> impl Iterator<Item = (&EntityId, &EntityChange)> {
        self.changes.iter()
    }

    /// Absorb `child` into this set, consuming it.
    ///
    /// Each child entry composes onto the matching parent entry; the child
    /// is the later writer, so its values win field-by-field. The child set
    /// is left empty by construction (it is consumed).
    pub fn absorb(&mut self, child: ChangeSet) {
        for (id, change) in child.changes {
            match change {
                EntityChange::Insert { kind, fields } => {
                    self.changes.insert(id, EntityChange::Insert { kind, fields });
                }
                EntityChange::Update { fields } => self.update(id, fields),
                EntityChange::Delete => self.delete(id),
            }
        }
    }
}
