//! Shared data model for the atom message gateway.
//!
//! This crate holds the types that cross crate boundaries:
//!
//! - [`config`] -- the workspace config file schema, validation, and the
//!   resolved [`config::GatewayConfig`] / [`config::ChannelDescriptor`] model
//! - [`inbound`] -- the neutral shape of one inbound webhook call and the
//!   messages parsed out of it
//! - [`task`] -- snapshots of runtime tasks as returned by the task API
//! - [`secret`] -- a redacting string wrapper and env-or-literal resolution
//! - [`error`] -- error types shared by the channel plugins

pub mod config;
pub mod error;
pub mod inbound;
pub mod secret;
pub mod task;

pub use config::{ChannelDescriptor, ChannelEndpoint, ChannelType, GatewayConfig};
pub use error::ChannelError;
pub use inbound::{ImmediateReply, InboundMessage, InboundRequest, ParsedInbound};
pub use secret::{Secret, SecretRef, SecretSource};
pub use task::{TaskSnapshot, TaskStatus};

/// Environment variable carrying the resolved channel descriptor JSON.
pub const ENV_CHANNEL_CONFIG: &str = "ATOM_MESSAGE_GATEWAY_CHANNEL_CONFIG";

/// Environment variable carrying the gateway-global config JSON.
pub const ENV_GLOBAL_CONFIG: &str = "ATOM_MESSAGE_GATEWAY_GLOBAL_CONFIG";

/// Environment variable carrying the task runtime base URL.
pub const ENV_SERVER_URL: &str = "ATOM_MESSAGE_GATEWAY_SERVER_URL";

/// Task type submitted for every inbound gateway message.
pub const GATEWAY_TASK_TYPE: &str = "message_gateway.input";
