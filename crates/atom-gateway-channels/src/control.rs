//! Control RPC methods shared by every channel plugin.
//!
//! Both shipped channels register `channel.shutdown` (trigger the
//! graceful-shutdown sequence) and `channel.describe` (introspection for
//! the manager and operators).

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tokio_util::sync::CancellationToken;
use tracing::info;

use atom_gateway_plugin::{PluginError, RpcHandler};
use atom_gateway_types::config::ChannelType;

/// `channel.shutdown` -- request the plugin's graceful-shutdown sequence.
pub struct ShutdownRpc {
    stop: CancellationToken,
}

impl ShutdownRpc {
    /// Wrap the plugin's stop token.
    pub fn new(stop: CancellationToken) -> Arc<Self> {
        Arc::new(Self { stop })
    }
}

#[async_trait]
impl RpcHandler for ShutdownRpc {
    async fn handle(&self, _params: Option<Map<String, Value>>) -> Result<Value, PluginError> {
        info!("shutdown requested via rpc");
        self.stop.cancel();
        Ok(json!({"stopping": true}))
    }
}

/// `channel.describe` -- identity and uptime of this plugin process.
pub struct DescribeRpc {
    channel_id: String,
    channel_type: ChannelType,
    started_at: Instant,
}

impl DescribeRpc {
    /// Describe a channel that started now.
    pub fn new(channel_id: impl Into<String>, channel_type: ChannelType) -> Arc<Self> {
        Arc::new(Self {
            channel_id: channel_id.into(),
            channel_type,
            started_at: Instant::now(),
        })
    }
}

#[async_trait]
impl RpcHandler for DescribeRpc {
    async fn handle(&self, _params: Option<Map<String, Value>>) -> Result<Value, PluginError> {
        Ok(json!({
            "channelId": self.channel_id,
            "channelType": self.channel_type.as_str(),
            "uptimeMs": self.started_at.elapsed().as_millis() as u64,
        }))
    }
}
