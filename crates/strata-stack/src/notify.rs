//! Ephemeral events broadcast around the save protocol.

use std::collections::BTreeSet;

use strata_store::EntityId;

/// Sent to live sessions after a successful commit: the identities that
/// changed, so cached copies can be refreshed without a full reload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeNotification {
    pub identities: BTreeSet<EntityId>,
}

/// Outcome of a root commit attempt, observable via
/// `LifecycleManager::subscribe_persist_events`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistEvent {
    Persisted { identities: BTreeSet<EntityId> },
    Failed { message: String },
}
