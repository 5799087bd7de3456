//! The store coordinator: owns the model, one backend, and committed state.
//!
//! This is the only component that performs physical I/O. A commit either
//! lands in full or leaves the observable store exactly as of the last
//! successful commit — changes are applied to a scratch copy and swapped
//! in only after the backend persisted them.

use std::sync::Arc;

use strata_model::{Entity, Model};

use crate::backend::StoreBackend;
use crate::change::{ChangeSet, EntityChange};
use crate::error::{CommitError, StoreOpenError};
use crate::record::{EntityId, FieldMap, RecordMap, StoredRecord};

/// Outcome of a successful commit: the identities it touched.
#[derive(Debug, Clone)]
pub struct CommitReceipt {
    pub identities: std::collections::BTreeSet<EntityId>,
}

pub struct StoreCoordinator {
    model: Arc<Model>,
    backend: Box<dyn StoreBackend>,
    committed: RecordMap,
}

impl std::fmt::Debug for StoreCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreCoordinator")
            .field("model", &self.model)
            .field("backend", &self.backend.describe())
            .field("committed", &self.committed)
            .finish()
    }
}

impl StoreCoordinator {
    /// Open the store: load committed state and check it against the model.
    pub fn open(
        model: Arc<Model>,
        mut backend: Box<dyn StoreBackend>,
    ) -> Result<Self, StoreOpenError> {
        let committed = backend.load()?;

        for record in committed.values() {
            let entity = model.entity(&record.kind).ok_or_else(|| {
                StoreOpenError::Incompatible {
                    model: model.name.clone(),
                    message: format!("record {} has unknown entity kind {}", record.id, record.kind),
                }
            })?;
            for field in record.fields.keys() {
                if entity.attribute(field).is_none() && entity.relationship(field).is_none() {
                    return Err(StoreOpenError::Incompatible {
                        model: model.name.clone(),
                        message: format!(
                            "record {} ({}) has unknown field {field}",
                            record.id, record.kind
                        ),
                    });
                }
            }
        }

        tracing::info!(
            store = %backend.describe(),
            model = %model.name,
            records = committed.len(),
            "store opened"
        );

        Ok(Self {
            model,
            backend,
            committed,
        })
    }

    pub fn model(&self) -> &Arc<Model> {
        &self.model
    }

    /// Durably apply a change set.
    ///
    /// Validates against the model, applies to a scratch copy, persists via
    /// the backend, and only then swaps the committed state.
    pub fn commit(&mut self, changes: &ChangeSet) -> Result<CommitReceipt, CommitError> {
        let mut scratch = self.committed.clone();

        for (id, change) in changes.iter() {
            match change {
                EntityChange::Insert { kind, fields } => {
                    let entity = self.entity_for(kind)?;
                    validate_fields(entity, fields)?;
                    scratch.insert(*id, StoredRecord::new(*id, kind.clone(), fields.clone()));
                }
                EntityChange::Update { fields } => {
                    match scratch.get_mut(id) {
                        Some(record) => {
                            let kind = record.kind.clone();
                            let entity = self.entity_for(&kind)?;
                            validate_fields(entity, fields)?;
                            record.apply_delta(fields);
                        }
                        None => {
                            // The target was deleted by an earlier commit; the
                            // earlier delete wins and the update is dropped.
                            tracing::debug!(%id, "update targets missing record, skipped");
                        }
                    }
                }
                EntityChange::Delete => {
                    scratch.remove(id);
                }
            }
        }

        self.backend.persist(&scratch).inspect_err(|error| {
            tracing::warn!(%error, "commit failed, committed state unchanged");
        })?;
        self.committed = scratch;

        tracing::debug!(changes = changes.len(), "commit applied");
        Ok(CommitReceipt {
            identities: changes.identities(),
        })
    }

    /// Read one committed record.
    pub fn fetch(&self, id: &EntityId) -> Option<StoredRecord> {
        self.committed.get(id).cloned()
    }

    /// Read all committed records of one entity kind, in identity order.
    pub fn fetch_kind(&self, kind: &str) -> Vec<StoredRecord> {
        self.committed
            .values()
            .filter(|r| r.kind == kind)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.committed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.committed.is_empty()
    }

    /// Release the backend. Used only by lifecycle reset.
    pub fn close(&mut self) {
        tracing::info!(store = %self.backend.describe(), "store closed");
        self.backend.close();
    }

    fn entity_for(&self, kind: &str) -> Result<&Entity, CommitError> {
        self.model
            .entity(kind)
            .ok_or_else(|| CommitError::Constraint(format!("unknown entity kind: {kind}")))
    }
}

fn validate_fields(entity: &Entity, fields: &FieldMap) -> Result<(), CommitError> {
    for (name, value) in fields {
        if let Some(attribute) = entity.attribute(name) {
            if !attribute.kind.admits(value) {
                return Err(CommitError::Constraint(format!(
                    "entity {}: attribute {name} expects {}, got {value}",
                    entity.name,
                    attribute.kind.as_str()
                )));
            }
        } else if entity.relationship(name).is_none() {
            return Err(CommitError::Constraint(format!(
                "entity {}: unknown field {name}",
                entity.name
            )));
        }
    }
    Ok(())
}
