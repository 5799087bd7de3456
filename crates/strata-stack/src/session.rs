//! Sessions: bounded unit-of-work views over the object graph.
//!
//! A session owns its working set exclusively; cross-session visibility
//! happens only through the save/merge protocol. Handles are `!Send`
//! (raw-pointer marker), so a session cannot leave the thread it was
//! created on — cross-domain mutation is unrepresentable rather than
//! undefined.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::mpsc;
use std::sync::{Arc, Weak};

use strata_store::{ChangeSet, EntityChange, EntityId, FieldMap, StoredRecord};

use crate::core::{StackCore, lock_unpoisoned};
use crate::error::StackError;
use crate::notify::MergeNotification;
use crate::save::SaveCoordinator;

/// Marker making session handles thread-affine.
type Affine = PhantomData<*const ()>;

/// Where a session's changes go on save.
#[derive(Clone)]
pub(crate) enum SessionParent {
    /// Absorb into the main working set under the main lock, then commit.
    Main,
    /// Absorb into the creating session's set (same thread), then recurse.
    Nested {
        set: Rc<RefCell<ChangeSet>>,
        parent: Box<SessionParent>,
    },
}

/// Materialize the view of one identity: pending change over committed base.
fn overlay(
    id: EntityId,
    change: Option<EntityChange>,
    base: Option<StoredRecord>,
) -> Option<StoredRecord> {
    match change {
        Some(EntityChange::Delete) => None,
        Some(EntityChange::Insert { kind, fields }) => {
            Some(StoredRecord::new(id, kind, fields))
        }
        Some(EntityChange::Update { fields }) => base.map(|mut record| {
            record.apply_delta(&fields);
            record
        }),
        None => base,
    }
}

/// The foreground session: a handle over the stack's single main state.
///
/// All handles returned by `LifecycleManager::main_session` share the same
/// working set and read cache. The handle is `!Send`; obtain one per thread
/// of control and keep it on the foreground domain.
#[derive(Debug)]
pub struct MainSession {
    core: Weak<StackCore>,
    _affine: Affine,
}

impl MainSession {
    pub(crate) fn attached(core: &Arc<StackCore>) -> Self {
        Self {
            core: Arc::downgrade(core),
            _affine: PhantomData,
        }
    }

    fn core(&self) -> Result<Arc<StackCore>, StackError> {
        self.core.upgrade().ok_or(StackError::StaleSession)
    }

    /// Record a new instance in the main working set.
    pub fn insert(&self, kind: &str, fields: FieldMap) -> Result<EntityId, StackError> {
        let core = self.core()?;
        let mut main = lock_unpoisoned(&core.main);
        Ok(main.working.insert(kind, fields))
    }

    /// Record a field delta in the main working set.
    pub fn update(&self, id: EntityId, delta: FieldMap) -> Result<(), StackError> {
        let core = self.core()?;
        let mut main = lock_unpoisoned(&core.main);
        main.working.update(id, delta);
        Ok(())
    }

    /// Record a deletion in the main working set.
    pub fn delete(&self, id: EntityId) -> Result<(), StackError> {
        let core = self.core()?;
        let mut main = lock_unpoisoned(&core.main);
        main.working.delete(id);
        Ok(())
    }

    /// Read one identity: pending main edits overlaid on committed state.
    pub fn get(&self, id: &EntityId) -> Result<Option<StoredRecord>, StackError> {
        let core = self.core()?;
        let mut main = lock_unpoisoned(&core.main);
        let change = main.working.get(id).cloned();

        let base = match main.cache.get(id) {
            Some(record) => Some(record.clone()),
            None => {
                let fetched = core.fetch_committed(id);
                if let Some(record) = &fetched {
                    main.cache.insert(*id, record.clone());
                }
                fetched
            }
        };

        Ok(overlay(*id, change, base))
    }

    /// Whether `id` has unsaved main-session edits.
    pub fn is_dirty(&self, id: &EntityId) -> Result<bool, StackError> {
        let core = self.core()?;
        let main = lock_unpoisoned(&core.main);
        Ok(main.working.is_dirty(id))
    }

    /// Number of pending main-session changes.
    pub fn pending_changes(&self) -> Result<usize, StackError> {
        let core = self.core()?;
        let main = lock_unpoisoned(&core.main);
        Ok(main.working.len())
    }

    /// Commit the accumulated main working set to the store.
    ///
    /// On failure the working set is preserved for retry.
    pub fn save(&self) -> Result<(), StackError> {
        let core = self.core()?;
        let coordinator = SaveCoordinator::new(&core);
        let mut main = lock_unpoisoned(&core.main);
        coordinator.commit_root(&mut main)
    }

    /// Allocate a background session parented to main, affine to the
    /// calling thread.
    pub fn new_child(&self) -> Result<BackgroundSession, StackError> {
        let core = self.core()?;
        Ok(BackgroundSession::attached(&core))
    }
}

/// A writer session bound to one worker thread.
///
/// Created parented to the main session (or to another background session
/// via `new_child`). `save` pushes its working set up the parent chain and
/// synchronously through to the store.
pub struct BackgroundSession {
    core: Weak<StackCore>,
    working: Rc<RefCell<ChangeSet>>,
    cache: RefCell<BTreeMap<EntityId, StoredRecord>>,
    merges: mpsc::Receiver<MergeNotification>,
    parent: SessionParent,
    _affine: Affine,
}

impl BackgroundSession {
    pub(crate) fn attached(core: &Arc<StackCore>) -> Self {
        Self {
            core: Arc::downgrade(core),
            working: Rc::new(RefCell::new(ChangeSet::new())),
            cache: RefCell::new(BTreeMap::new()),
            merges: core.hierarchy.register_merge_subscriber(),
            parent: SessionParent::Main,
            _affine: PhantomData,
        }
    }

    fn core(&self) -> Result<Arc<StackCore>, StackError> {
        self.core.upgrade().ok_or(StackError::StaleSession)
    }

    /// Allocate a child session parented to `self`, on the same thread.
    pub fn new_child(&self) -> Result<BackgroundSession, StackError> {
        let core = self.core()?;
        Ok(Self {
            core: Arc::downgrade(&core),
            working: Rc::new(RefCell::new(ChangeSet::new())),
            cache: RefCell::new(BTreeMap::new()),
            merges: core.hierarchy.register_merge_subscriber(),
            parent: SessionParent::Nested {
                set: Rc::clone(&self.working),
                parent: Box::new(self.parent.clone()),
            },
            _affine: PhantomData,
        })
    }

    pub fn insert(&self, kind: &str, fields: FieldMap) -> Result<EntityId, StackError> {
        self.core()?;
        Ok(self.working.borrow_mut().insert(kind, fields))
    }

    pub fn update(&self, id: EntityId, delta: FieldMap) -> Result<(), StackError> {
        self.core()?;
        self.working.borrow_mut().update(id, delta);
        Ok(())
    }

    pub fn delete(&self, id: EntityId) -> Result<(), StackError> {
        self.core()?;
        self.working.borrow_mut().delete(id);
        Ok(())
    }

    /// Read one identity: local pending edits overlaid on committed state.
    ///
    /// Pending merge notifications are applied first, so a read observes
    /// upstream commits that happened since the last operation.
    pub fn get(&self, id: &EntityId) -> Result<Option<StoredRecord>, StackError> {
        let core = self.core()?;
        self.pump_merges();

        let change = self.working.borrow().get(id).cloned();
        let base = match self.cache.borrow().get(id) {
            Some(record) => Some(record.clone()),
            None => core.fetch_committed(id),
        };
        if let Some(record) = &base {
            self.cache.borrow_mut().insert(*id, record.clone());
        }

        Ok(overlay(*id, change, base))
    }

    pub fn is_dirty(&self, id: &EntityId) -> Result<bool, StackError> {
        self.core()?;
        Ok(self.working.borrow().is_dirty(id))
    }

    pub fn pending_changes(&self) -> Result<usize, StackError> {
        self.core()?;
        Ok(self.working.borrow().len())
    }

    /// Refresh local cached copies named by `notification`.
    ///
    /// Policy: identities with unsaved local edits are left untouched
    /// (local edits win); clean cached copies are discarded so the next
    /// read refetches committed state. This is a policy choice, not
    /// conflict resolution — strata never merges fields on the receiving
    /// side.
    pub fn apply_merge(&self, notification: &MergeNotification) {
        let working = self.working.borrow();
        let mut cache = self.cache.borrow_mut();
        for id in &notification.identities {
            if !working.is_dirty(id) {
                cache.remove(id);
            }
        }
    }

    /// Drain and apply any pending merge notifications.
    pub fn refresh(&self) {
        self.pump_merges();
    }

    /// Propagate this session's working set to its parent and transitively
    /// to the store. Blocks until the change set is durably committed.
    ///
    /// On commit failure the changes are preserved in the root (main)
    /// working set; this session's own set has been drained by absorption,
    /// which cannot fail.
    pub fn save(&self) -> Result<(), StackError> {
        let core = self.core()?;
        let set = std::mem::take(&mut *self.working.borrow_mut());
        SaveCoordinator::new(&core).save(set, &self.parent)
    }

    fn pump_merges(&self) {
        while let Ok(notification) = self.merges.try_recv() {
            self.apply_merge(&notification);
        }
    }
}
