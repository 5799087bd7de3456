//! Error taxonomy for stack operations.

use strata_model::ModelError;
use strata_store::{CommitError, StoreOpenError};

/// Errors surfaced by sessions and the lifecycle manager.
///
/// Commit failures are recoverable (working sets are preserved for retry);
/// model and open failures are fatal to the stack generation that attempted
/// construction; stale-session use is a programming error and fails fast.
#[derive(Debug, thiserror::Error)]
pub enum StackError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Open(#[from] StoreOpenError),

    #[error(transparent)]
    Commit(#[from] CommitError),

    /// The session's lifecycle manager was reset; the handle is dead.
    #[error("stale session: the owning stack was reset")]
    StaleSession,
}
