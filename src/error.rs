//! Error types for keyroute.

use thiserror::Error;

/// Main error type for all registry operations.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Explicit schema was constructed without any key names.
    #[error("Schema must contain at least one key")]
    EmptySchema,

    /// Selector with no key/value pairs.
    #[error("Selector must contain at least one key")]
    EmptySelector,

    /// Selector value is an array or object.
    #[error("Selector value for key '{key}' must be a scalar")]
    InvalidSelector { key: String },

    /// Selector key set differs from the explicit schema.
    #[error("Selector keys {found:?} do not match schema keys {expected:?}")]
    SelectorMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },

    /// Payload is not a JSON object.
    #[error("Payload must be a JSON object")]
    NotAnObject,

    /// Payload satisfies no recognized schema (strict mode only).
    #[error("No keys found: payload matches no recognized schema")]
    NoMatchingSchema,

    /// `unregister` called past the end of binding storage.
    #[error("Binding index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },

    /// Typed handler could not deserialize the data portion.
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Result type alias using DispatchError.
pub type Result<T> = std::result::Result<T, DispatchError>;
