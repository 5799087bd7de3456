//! # Strata stack
//!
//! A persistence-session coordinator: a hierarchy of unit-of-work sessions
//! layered over one physical store, so a long-lived foreground session
//! serves reads while short-lived background sessions write without
//! blocking or corrupting the foreground view.
//!
//! ## Architecture
//!
//! ```text
//! LifecycleManager       ← explicit instance: config, construction, reset
//!     │
//! StackCore              ← one generation: store + main state + hierarchy
//!     │
//! MainSession            ← foreground view (working set + cache, one lock)
//!     │
//! BackgroundSession      ← per-worker writers, parented to main
//!     │
//! SaveCoordinator        ← absorb up the chain, commit at the root
//!     │
//! StoreCoordinator       ← the only component that performs I/O
//! ```
//!
//! Saving a background session absorbs its working set into its parent
//! (an in-memory merge, last-absorbed-wins per field), then commits the
//! accumulated main set to the store while holding the main lock. After a
//! successful commit, a `MergeNotification` fans out to live sessions so
//! cached copies refresh; local unsaved edits always win over the refresh.

mod core;
mod hierarchy;
mod save;

pub mod error;
pub mod lifecycle;
pub mod notify;
pub mod scratch;
pub mod session;

pub use error::StackError;
pub use lifecycle::{LifecycleManager, StackConfig, StoreKind};
pub use notify::{MergeNotification, PersistEvent};
pub use scratch::ScratchSession;
pub use session::{BackgroundSession, MainSession};

pub use strata_model::{Model, ModelBundle, ModelError, load_model};
pub use strata_store::{
    ChangeSet, CommitError, EntityChange, EntityId, FieldMap, StoreBackend, StoreOpenError,
    StoredRecord,
};
