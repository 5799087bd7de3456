//! The save protocol: absorb up the parent chain, commit at the root.
//!
//! Absorption is a pure in-memory merge and cannot fail. Only the terminal
//! commit can fail, and that failure propagates synchronously back to the
//! original caller with the accumulated root working set left intact for
//! retry.

use std::sync::Arc;

use strata_store::ChangeSet;

use crate::core::{MainState, StackCore, lock_unpoisoned};
use crate::error::StackError;
use crate::notify::{MergeNotification, PersistEvent};
use crate::session::SessionParent;

pub(crate) struct SaveCoordinator<'a> {
    core: &'a Arc<StackCore>,
}

impl<'a> SaveCoordinator<'a> {
    pub(crate) fn new(core: &'a Arc<StackCore>) -> Self {
        Self { core }
    }

    /// Propagate `set` through `parent` and transitively to the store.
    ///
    /// Each intermediate level absorbs the incoming set into its own and is
    /// drained in turn, so after a successful save every working set along
    /// the chain is empty. At the root the accumulated main set (which may
    /// include the foreground's own pending edits) is committed while the
    /// main lock is held — the serialization that makes last-absorbed-wins
    /// well-defined.
    pub(crate) fn save(&self, set: ChangeSet, parent: &SessionParent) -> Result<(), StackError> {
        match parent {
            SessionParent::Nested { set: parent_set, parent: next } => {
                let drained = {
                    let mut parent_set = parent_set.borrow_mut();
                    parent_set.absorb(set);
                    std::mem::take(&mut *parent_set)
                };
                self.save(drained, next)
            }
            SessionParent::Main => {
                let mut main = lock_unpoisoned(&self.core.main);
                main.working.absorb(set);
                self.commit_root(&mut main)
            }
        }
    }

    /// Commit the accumulated main working set. Caller holds the main lock.
    pub(crate) fn commit_root(&self, main: &mut MainState) -> Result<(), StackError> {
        if main.working.is_empty() {
            return Ok(());
        }

        let mut store = lock_unpoisoned(&self.core.store);
        match store.commit(&main.working) {
            Ok(receipt) => {
                main.working.clear();
                // Refresh the foreground's cached copies before releasing
                // either lock: committed identities re-read, deletions evicted.
                for id in &receipt.identities {
                    match store.fetch(id) {
                        Some(record) => {
                            main.cache.insert(*id, record);
                        }
                        None => {
                            main.cache.remove(id);
                        }
                    }
                }
                drop(store);

                let notification = MergeNotification {
                    identities: receipt.identities.clone(),
                };
                self.core.hierarchy.broadcast_merge(&notification);
                self.core.hierarchy.broadcast_persist(&PersistEvent::Persisted {
                    identities: receipt.identities,
                });
                Ok(())
            }
            Err(error) => {
                drop(store);
                self.core.hierarchy.broadcast_persist(&PersistEvent::Failed {
                    message: error.to_string(),
                });
                Err(StackError::Commit(error))
            }
        }
    }
}
