//! Error types for the sync engine.

use tether_patch::PatchError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during a sync round.
///
/// Failures are scoped to one round: the baseline is only replaced after a
/// response has been fully applied, so none of these leave it half-updated.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The request could not be dispatched or did not complete.
    ///
    /// The operations it carried are returned to the pending queue.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// The response body is neither a document nor a patch.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// A patch operation could not be parsed or applied.
    #[error("malformed patch: {0}")]
    MalformedPatch(#[from] PatchError),

    /// The requested action is not valid in the current state.
    #[error("invalid state transition from {from:?} to {to:?}")]
    InvalidStateTransition {
        /// Current state.
        from: String,
        /// Attempted target state.
        to: String,
    },

    /// The engine has no model yet.
    #[error("engine has no model; initial load has not completed")]
    NotReady,

    /// The pointer does not address a value in the model.
    #[error("no value at {0}")]
    UnknownField(String),

    /// Codec error.
    #[error("codec error: {0}")]
    Codec(String),
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            _ => false,
        }
    }

    /// Returns true if this is a transport failure.
    pub fn is_transport(&self) -> bool {
        matches!(self, SyncError::Transport { .. })
    }
}
