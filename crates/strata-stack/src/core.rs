//! Shared stack state: one store, one main working set, one hierarchy.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use strata_store::{ChangeSet, EntityId, StoreCoordinator, StoredRecord};

use crate::hierarchy::SessionHierarchy;

/// Lock a mutex, recovering from poisoning.
///
/// A poisoned lock means another session panicked mid-operation; the
/// protected maps are structurally valid, and the save protocol never
/// leaves them half-applied across an await point (there are none).
pub(crate) fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The main session's state: its working set and read cache, behind the
/// single logical lock that serializes absorption and commit.
#[derive(Default)]
pub(crate) struct MainState {
    pub(crate) working: ChangeSet,
    pub(crate) cache: BTreeMap<EntityId, StoredRecord>,
}

/// One stack generation. Dropped (and replaced) on lifecycle reset, which
/// is what invalidates outstanding session handles: they hold `Weak`
/// references and fail their upgrade afterwards.
pub(crate) struct StackCore {
    pub(crate) store: Mutex<StoreCoordinator>,
    pub(crate) main: Mutex<MainState>,
    pub(crate) hierarchy: SessionHierarchy,
}

impl StackCore {
    pub(crate) fn new(store: StoreCoordinator) -> Self {
        Self {
            store: Mutex::new(store),
            main: Mutex::new(MainState::default()),
            hierarchy: SessionHierarchy::new(),
        }
    }

    /// Read one committed record, going through the store lock.
    pub(crate) fn fetch_committed(&self, id: &EntityId) -> Option<StoredRecord> {
        lock_unpoisoned(&self.store).fetch(id)
    }
}
