//! In-process HTTP server runtime embedded in every channel plugin.
//!
//! Every channel plugin process hosts one [`PluginServer`] bound to its
//! configured loopback endpoint. The server offers:
//!
//! - `GET <healthPath>` -- health probe consumed by the gateway manager
//! - `POST <invokePath>` -- an RPC dispatcher over registered
//!   [`RpcHandler`]s (`{method, params}` in, `{ok, result|error}` out)
//! - extension routes the channel registers for raw platform webhooks
//!
//! [`PluginBootstrap`] parses the three `ATOM_MESSAGE_GATEWAY_*`
//! environment variables the manager hands to every plugin subprocess.

mod bootstrap;
mod error;
mod rpc;
mod server;

pub use bootstrap::PluginBootstrap;
pub use error::PluginError;
pub use rpc::{RpcHandler, RpcRegistry};
pub use server::{PluginServer, PluginServerBuilder, spawn_signal_listener};
