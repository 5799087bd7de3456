//! Scratch sessions: isolated, discard-on-save working state.
//!
//! The analog of a disposable context: useful for speculative edits (form
//! drafts, previews) that must never reach the shared store. `save`
//! discards instead of persisting.

use std::marker::PhantomData;

use strata_store::{ChangeSet, EntityChange, EntityId, FieldMap, StoredRecord};

/// An isolated session with no parent and no store.
///
/// Reads observe only this session's own pending changes; `save` resets
/// the session to empty.
pub struct ScratchSession {
    working: ChangeSet,
    _affine: PhantomData<*const ()>,
}

impl ScratchSession {
    pub(crate) fn new() -> Self {
        Self {
            working: ChangeSet::new(),
            _affine: PhantomData,
        }
    }

    pub fn insert(&mut self, kind: &str, fields: FieldMap) -> EntityId {
        self.working.insert(kind, fields)
    }

    pub fn update(&mut self, id: EntityId, delta: FieldMap) {
        self.working.update(id, delta);
    }

    pub fn delete(&mut self, id: EntityId) {
        self.working.delete(id);
    }

    pub fn get(&self, id: &EntityId) -> Option<StoredRecord> {
        match self.working.get(id)? {
            EntityChange::Insert { kind, fields } => {
                Some(StoredRecord::new(*id, kind.clone(), fields.clone()))
            }
            // No committed base exists to apply a delta to or delete from.
            EntityChange::Update { .. } | EntityChange::Delete => None,
        }
    }

    pub fn pending_changes(&self) -> usize {
        self.working.len()
    }

    /// Discard all pending changes. Nothing is ever persisted.
    pub fn save(&mut self) {
        tracing::debug!(discarded = self.working.len(), "scratch session reset on save");
        self.working.clear();
    }
}
