//! Manager errors.

use thiserror::Error;

use atom_gateway_types::error::ConfigError;

/// Errors raised by the gateway manager's control path.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ManagerError {
    /// The channel selector expression is malformed.
    #[error("invalid channel selector: {0}")]
    InvalidSelector(String),

    /// `start()` was called before a runtime server URL was set.
    #[error("server URL must be set before starting the gateway")]
    ServerUrlNotSet,

    /// Configuration failed to load or validate.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
