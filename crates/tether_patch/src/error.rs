//! Error types for patch operations.

use thiserror::Error;

/// Result type for patch operations.
pub type PatchResult<T> = Result<T, PatchError>;

/// Errors raised while parsing or applying a patch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatchError {
    /// The pointer string is not a valid slash-delimited pointer.
    #[error("invalid pointer {pointer:?}: {reason}")]
    InvalidPointer {
        /// The offending pointer text.
        pointer: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The operation kind is not one of `add`, `remove`, `replace`.
    #[error("unknown patch operation: {0}")]
    UnknownOp(String),

    /// A required field is missing or has the wrong type.
    #[error("{op} operation is missing field `{field}`")]
    MissingField {
        /// Operation kind (or `patch` when the kind itself is missing).
        op: String,
        /// Name of the missing field.
        field: &'static str,
    },

    /// The operation is not a JSON object.
    #[error("patch operation must be an object, got {0}")]
    NotAnObject(String),

    /// The patch is not a JSON array of operations.
    #[error("patch must be an array of operations")]
    NotAnArray,

    /// The path walks into a value that cannot hold children.
    #[error("cannot index into scalar at {path}")]
    NotAContainer {
        /// Pointer to the scalar.
        path: String,
    },

    /// An array segment is not a decimal index.
    #[error("invalid array index {segment:?} at {path}")]
    InvalidIndex {
        /// Pointer to the array.
        path: String,
        /// The rejected segment.
        segment: String,
    },

    /// An array index is past the end of the array.
    #[error("index {index} out of bounds for array of length {len} at {path}")]
    IndexOutOfBounds {
        /// Pointer to the array.
        path: String,
        /// Requested index.
        index: usize,
        /// Array length at the time of application.
        len: usize,
    },

    /// The document root cannot be removed.
    #[error("cannot remove the document root")]
    RootRemoval,

    /// An operation inside a patch failed.
    #[error("operation {index} failed: {source}")]
    AtOperation {
        /// Zero-based position of the failing operation.
        index: usize,
        /// Underlying failure.
        #[source]
        source: Box<PatchError>,
    },

    /// Patch text is not valid JSON.
    #[error("patch is not valid JSON: {0}")]
    Json(String),
}

impl PatchError {
    /// Creates an invalid pointer error.
    pub fn invalid_pointer(pointer: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPointer {
            pointer: pointer.into(),
            reason: reason.into(),
        }
    }

    /// Wraps this error with the position of the operation that raised it.
    pub fn at_operation(self, index: usize) -> Self {
        Self::AtOperation {
            index,
            source: Box::new(self),
        }
    }

    /// Returns the position of the failing operation, if known.
    pub fn operation_index(&self) -> Option<usize> {
        match self {
            PatchError::AtOperation { index, .. } => Some(*index),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for PatchError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}
