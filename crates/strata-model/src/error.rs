//! Error types for model loading and validation.

/// Errors raised while loading or validating a schema model.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// The named model resource does not exist in the bundle.
    #[error("model resource not found: {name} ({source_hint})")]
    MissingResource { name: String, source_hint: String },

    /// The resource exists but is not valid model JSON.
    #[error("model {name}: parse error: {message}")]
    Parse { name: String, message: String },

    /// The model parsed but violates a structural constraint.
    #[error("model {name}: {message}")]
    Invalid { name: String, message: String },

    /// I/O failure while reading the resource.
    #[error("model {name}: I/O error: {message}")]
    Io { name: String, message: String },
}
