//! Environment bootstrap for plugin subprocesses.
//!
//! The gateway manager hands every plugin three environment variables:
//! the resolved channel descriptor, the gateway-global config, and the
//! task runtime base URL. [`PluginBootstrap::from_env`] parses them and
//! fails with a message naming the offending variable.

use atom_gateway_types::config::{ChannelDescriptor, GlobalConfig};
use atom_gateway_types::{ENV_CHANNEL_CONFIG, ENV_GLOBAL_CONFIG, ENV_SERVER_URL};

use crate::error::PluginError;

/// Everything a plugin process needs from its spawn environment.
#[derive(Debug, Clone)]
pub struct PluginBootstrap {
    /// The channel this process implements.
    pub descriptor: ChannelDescriptor,
    /// Gateway-global settings.
    pub global: GlobalConfig,
    /// Base URL of the task runtime.
    pub server_url: String,
}

impl PluginBootstrap {
    /// Parse the spawn environment.
    pub fn from_env() -> Result<Self, PluginError> {
        let descriptor: ChannelDescriptor = parse_json_var(ENV_CHANNEL_CONFIG)?;
        let global: GlobalConfig = parse_json_var(ENV_GLOBAL_CONFIG)?;

        let server_url = std::env::var(ENV_SERVER_URL)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| PluginError::Startup(format!("{ENV_SERVER_URL} is not set")))?;

        Ok(Self {
            descriptor,
            global,
            server_url,
        })
    }
}

fn parse_json_var<T: serde::de::DeserializeOwned>(name: &str) -> Result<T, PluginError> {
    let raw = std::env::var(name)
        .map_err(|_| PluginError::Startup(format!("{name} is not set")))?;
    serde_json::from_str(&raw)
        .map_err(|e| PluginError::Startup(format!("{name} is not valid JSON: {e}")))
}
