//! Error types for the document server.

use tether_patch::PatchError;
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the document server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// No document at this path.
    #[error("not found: {0}")]
    NotFound(String),

    /// The request carried more operations than allowed.
    #[error("too many operations: {count} exceeds limit of {max}")]
    TooManyOperations {
        /// Operations in the request.
        count: usize,
        /// Configured limit.
        max: usize,
    },

    /// The patch could not be parsed or does not apply.
    #[error("rejected patch: {0}")]
    Patch(#[from] PatchError),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        !self.is_server_error()
    }

    /// Returns true if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        matches!(self, ServerError::Internal(_))
    }

    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            ServerError::NotFound(_) => 404,
            ServerError::TooManyOperations { .. } => 413,
            ServerError::Patch(_) => 422,
            ServerError::Internal(_) => 500,
        }
    }
}
