//! Error types for store open and commit paths.

/// Errors raised while opening or creating the physical store.
///
/// Fatal to the stack generation that attempted the open; surfaced to the
/// caller that triggered construction, never swallowed.
#[derive(Debug, thiserror::Error)]
pub enum StoreOpenError {
    #[error("store I/O error: {0}")]
    Io(String),

    /// The store file exists but its content is unreadable.
    #[error("corrupted store: {0}")]
    Corrupt(String),

    /// The store content does not fit the model it was opened with.
    #[error("store incompatible with model {model}: {message}")]
    Incompatible { model: String, message: String },
}

/// Errors raised during a commit.
///
/// Recoverable: the committed state observable through the coordinator is
/// unchanged and the caller's working set is preserved for retry.
#[derive(Debug, thiserror::Error)]
pub enum CommitError {
    /// The change set violates the model (unknown entity kind, unknown
    /// attribute, or a value of the wrong kind).
    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("commit I/O error: {0}")]
    Io(String),
}
