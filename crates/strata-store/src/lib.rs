//! # Strata store
//!
//! The physical-store layer: the only part of strata that performs I/O.
//!
//! ```text
//! StoreCoordinator      ← owns the Model + one backend + committed state
//!     │
//! StoreBackend          ← seam: MemoryBackend | FileBackend | test doubles
//!     │
//! jsonl                 ← one record per line, atomic replacement
//! ```
//!
//! `ChangeSet` lives here too: it is the shared vocabulary between sessions
//! (working sets) and the coordinator (commit input).

pub mod backend;
pub mod change;
pub mod coordinator;
pub mod error;
pub mod jsonl;
pub mod record;

pub use backend::{FileBackend, MemoryBackend, StoreBackend};
pub use change::{ChangeSet, EntityChange};
pub use coordinator::{CommitReceipt, StoreCoordinator};
pub use error::{CommitError, StoreOpenError};
pub use record::{EntityId, FieldMap, RecordMap, StoredRecord};
