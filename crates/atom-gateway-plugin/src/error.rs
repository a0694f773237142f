//! Plugin runtime errors.

use thiserror::Error;

/// Errors raised by the plugin server runtime and RPC handlers.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum PluginError {
    /// The plugin could not start (bad environment, bind failure,
    /// webhook registration failure). Always fatal; the process exits
    /// non-zero.
    #[error("startup failed: {0}")]
    Startup(String),

    /// An RPC handler failed.
    #[error("{0}")]
    Handler(String),

    /// Underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startup_display() {
        let err = PluginError::Startup("ATOM_MESSAGE_GATEWAY_CHANNEL_CONFIG is not set".into());
        assert!(err.to_string().starts_with("startup failed: "));
    }
}
