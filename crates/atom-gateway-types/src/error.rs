//! Error types shared across the gateway crates.
//!
//! [`ConfigError`] is fatal at startup; [`ChannelError`] covers failures
//! inside a channel plugin's message pipeline. Both are non-exhaustive to
//! allow future extension without breaking downstream.

use thiserror::Error;

/// Configuration loading / validation failure.
///
/// Always fatal: the gateway refuses to start on a bad config rather than
/// running with a partial one.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ConfigError {
    /// The config document violates the schema. The message carries the
    /// JSON path of the offending value (e.g. `channels[2].channelEndpoint.port`).
    #[error("invalid config: {0}")]
    Invalid(String),

    /// A required secret did not resolve from either its environment
    /// variable or its literal value.
    #[error("missing secret: {0}")]
    MissingSecret(String),

    /// Underlying I/O error while reading the config file.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The config file is not valid JSON.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Channel-plugin error type.
///
/// Used by the Telegram and HTTP channel implementations to report
/// failures in registering webhooks, exchanging messages with the
/// platform, or driving the task runtime.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ChannelError {
    /// The platform API rejected a request (`ok: false` envelope).
    #[error("platform error: {0}")]
    Platform(String),

    /// An HTTP call to the platform failed at the transport layer.
    #[error("transport error: {0}")]
    Transport(String),

    /// Channel settings are malformed.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// Message splitting was asked for a non-positive chunk size.
    #[error("invalid chunk size: {0}")]
    InvalidChunkSize(i64),

    /// The task runtime rejected or failed a request.
    #[error("{0}")]
    Runtime(String),

    /// Catch-all for errors that do not fit other variants.
    #[error("{0}")]
    Other(String),
}
