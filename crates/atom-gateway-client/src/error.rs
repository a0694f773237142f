//! Runtime client errors.

use thiserror::Error;

/// Failure modes of a runtime API call.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ClientError {
    /// The request never produced an HTTP response.
    #[error("Failed to reach {base}: {cause}")]
    Network {
        /// Normalized base URL of the runtime.
        base: String,
        /// Underlying transport error.
        cause: String,
    },

    /// The runtime answered, but not with the expected envelope.
    #[error("invalid runtime response: {0}")]
    InvalidResponse(String),

    /// The runtime returned an `{ok: false, error}` envelope.
    #[error("{code}: {message}")]
    Remote {
        /// Machine-readable error code.
        code: String,
        /// Human-readable error message.
        message: String,
    },
}
