//! Gateway configuration schema, loading, and validation.
//!
//! The gateway reads one JSON document from the workspace (default
//! `message_gateway.config.json`). An absent file yields the disabled-empty
//! config. Validation walks the raw JSON so that every violation is
//! reported with the precise path of the offending value, e.g.
//! `channels[2].channelEndpoint.port: must be an integer in [1, 65535]`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::ConfigError;
use crate::secret::{Secret, SecretRef};

/// Default config file name, resolved against the workspace directory.
pub const DEFAULT_CONFIG_FILE: &str = "message_gateway.config.json";

/// Default inbound path announced to plugins.
pub const DEFAULT_INBOUND_PATH: &str = "/v1/message-gateway/inbound";

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_HEALTH_PATH: &str = "/healthz";
const DEFAULT_INVOKE_PATH: &str = "/rpc";
const DEFAULT_STARTUP_TIMEOUT_MS: u64 = 10_000;

const MIN_STARTUP_TIMEOUT_MS: u64 = 1_000;
const MAX_STARTUP_TIMEOUT_MS: u64 = 120_000;

/// Kind of a configured channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    Telegram,
    Http,
}

impl ChannelType {
    /// The type name as written in config files.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelType::Telegram => "telegram",
            ChannelType::Http => "http",
        }
    }
}

impl std::fmt::Display for ChannelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Local endpoint a channel plugin binds its HTTP server to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelEndpoint {
    /// Bind host. Defaults to the loopback.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Path of the health probe route.
    pub health_path: String,
    /// Path of the RPC route.
    pub invoke_path: String,
    /// How long the manager waits for the plugin to become healthy.
    pub startup_timeout_ms: u64,
}

impl ChannelEndpoint {
    /// Base URL the manager uses to reach this plugin.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// One resolved channel definition. Immutable once resolved.
///
/// Serializes to the JSON handed to the plugin subprocess via
/// `ATOM_MESSAGE_GATEWAY_CHANNEL_CONFIG`; plugins deserialize the same
/// shape back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelDescriptor {
    /// Unique channel id.
    pub id: String,
    /// Channel kind.
    #[serde(rename = "type")]
    pub channel_type: ChannelType,
    /// Disabled channels are skipped on start.
    pub enabled: bool,
    /// Plugin endpoint.
    #[serde(rename = "channelEndpoint")]
    pub endpoint: ChannelEndpoint,
    /// Opaque settings object; interpretation is delegated to the channel
    /// type.
    pub settings: Value,
}

/// The resolved gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Master switch; when false the manager logs and does nothing.
    pub enabled: bool,
    /// Inbound path of the host HTTP surface, announced to plugins.
    pub inbound_path: String,
    /// Bearer token plugins present to the host inbound surface.
    /// Present whenever the gateway is enabled.
    pub bearer_token: Option<Secret>,
    /// All configured channels, enabled or not, in file order.
    pub channels: Vec<ChannelDescriptor>,
}

impl GatewayConfig {
    /// The disabled-empty config used when no config file exists.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            inbound_path: DEFAULT_INBOUND_PATH.to_string(),
            bearer_token: None,
            channels: Vec::new(),
        }
    }

    /// Resolve the config file path for a workspace.
    pub fn config_path(workspace: &Path, override_path: Option<&Path>) -> PathBuf {
        match override_path {
            Some(p) if p.is_absolute() => p.to_path_buf(),
            Some(p) => workspace.join(p),
            None => workspace.join(DEFAULT_CONFIG_FILE),
        }
    }

    /// Load and validate the gateway config from a workspace.
    ///
    /// An absent file yields [`GatewayConfig::disabled`]; everything else
    /// that goes wrong is a hard error.
    pub fn load(workspace: &Path, override_path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = Self::config_path(workspace, override_path);
        if !path.exists() {
            return Ok(Self::disabled());
        }
        let text = std::fs::read_to_string(&path)?;
        let raw: Value = serde_json::from_str(&text)?;
        Self::from_value(&raw)
    }

    /// Validate a raw JSON document into a resolved config.
    pub fn from_value(raw: &Value) -> Result<Self, ConfigError> {
        let root = expect_object(raw, "$")?;

        let gateway = match root.get("gateway") {
            None => None,
            Some(v) => Some(expect_object(v, "gateway")?),
        };

        let enabled = opt_bool(gateway, "enabled", "gateway.enabled", true)?;
        let inbound_path = opt_path(
            gateway,
            "inboundPath",
            "gateway.inboundPath",
            DEFAULT_INBOUND_PATH,
        )?;

        let auth = match gateway.and_then(|g| g.get("auth")) {
            None => None,
            Some(v) => Some(expect_object(v, "gateway.auth")?),
        };
        let bearer = SecretRef {
            env_name: opt_string(auth, "bearerTokenEnv", "gateway.auth.bearerTokenEnv")?,
            inline_value: opt_string(auth, "bearerToken", "gateway.auth.bearerToken")?,
        };
        let bearer_token = if enabled {
            Some(bearer.resolve("gateway.auth.bearerToken")?)
        } else {
            bearer.resolve_optional()
        };

        let channels = match root.get("channels") {
            None => Vec::new(),
            Some(Value::Array(items)) => {
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    out.push(resolve_channel(item, i)?);
                }
                out
            }
            Some(_) => {
                return Err(ConfigError::Invalid("channels: must be an array".into()));
            }
        };

        let mut seen = HashSet::new();
        for (i, channel) in channels.iter().enumerate() {
            if !seen.insert(channel.id.clone()) {
                return Err(ConfigError::Invalid(format!(
                    "channels[{i}].id: duplicate channel id \"{}\"",
                    channel.id
                )));
            }
        }

        Ok(Self {
            enabled,
            inbound_path,
            bearer_token,
            channels,
        })
    }

    /// The JSON handed to plugin subprocesses via
    /// `ATOM_MESSAGE_GATEWAY_GLOBAL_CONFIG`.
    ///
    /// Carries the resolved bearer token; the child needs the real value.
    pub fn global_config_json(&self) -> Value {
        json!({
            "enabled": self.enabled,
            "inboundPath": self.inbound_path,
            "auth": { "bearerToken": self.bearer_token.as_ref().map(Secret::reveal) },
        })
    }
}

/// Gateway-global information as seen from inside a plugin subprocess.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalConfig {
    /// Whether the gateway as a whole is enabled.
    #[serde(default)]
    pub enabled: bool,
    /// Inbound path of the host HTTP surface.
    #[serde(default)]
    pub inbound_path: String,
    /// Auth block.
    #[serde(default)]
    pub auth: GlobalAuth,
}

/// Auth block of [`GlobalConfig`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalAuth {
    /// Resolved bearer token for the host inbound surface.
    #[serde(default)]
    pub bearer_token: Option<Secret>,
}

fn resolve_channel(item: &Value, index: usize) -> Result<ChannelDescriptor, ConfigError> {
    let at = format!("channels[{index}]");
    let obj = expect_object(item, &at)?;

    let id = opt_string(Some(obj), "id", &format!("{at}.id"))?
        .ok_or_else(|| ConfigError::Invalid(format!("{at}.id: must be a non-empty string")))?;

    let channel_type = match obj.get("type") {
        Some(Value::String(s)) if s == "telegram" => ChannelType::Telegram,
        Some(Value::String(s)) if s == "http" => ChannelType::Http,
        Some(Value::String(s)) => {
            return Err(ConfigError::Invalid(format!(
                "{at}.type: unknown channel type \"{s}\""
            )));
        }
        _ => {
            return Err(ConfigError::Invalid(format!(
                "{at}.type: must be \"telegram\" or \"http\""
            )));
        }
    };

    let enabled = opt_bool(Some(obj), "enabled", &format!("{at}.enabled"), true)?;

    let ep_at = format!("{at}.channelEndpoint");
    let endpoint_obj = match obj.get("channelEndpoint") {
        None => None,
        Some(v) => Some(expect_object(v, &ep_at)?),
    };

    let host = opt_string(endpoint_obj, "host", &format!("{ep_at}.host"))?
        .unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = match endpoint_obj.and_then(|e| e.get("port")) {
        Some(Value::Number(n)) => match n.as_u64() {
            Some(p @ 1..=65535) => p as u16,
            _ => {
                return Err(ConfigError::Invalid(format!(
                    "{ep_at}.port: must be an integer in [1, 65535]"
                )));
            }
        },
        _ => {
            return Err(ConfigError::Invalid(format!(
                "{ep_at}.port: must be an integer in [1, 65535]"
            )));
        }
    };

    let health_path = opt_path(
        endpoint_obj,
        "healthPath",
        &format!("{ep_at}.healthPath"),
        DEFAULT_HEALTH_PATH,
    )?;
    let invoke_path = opt_path(
        endpoint_obj,
        "invokePath",
        &format!("{ep_at}.invokePath"),
        DEFAULT_INVOKE_PATH,
    )?;

    let startup_timeout_ms = match endpoint_obj.and_then(|e| e.get("startupTimeoutMs")) {
        None => DEFAULT_STARTUP_TIMEOUT_MS,
        Some(Value::Number(n)) => match n.as_u64() {
            Some(ms) if (MIN_STARTUP_TIMEOUT_MS..=MAX_STARTUP_TIMEOUT_MS).contains(&ms) => ms,
            _ => {
                return Err(ConfigError::Invalid(format!(
                    "{ep_at}.startupTimeoutMs: must be an integer in [{MIN_STARTUP_TIMEOUT_MS}, {MAX_STARTUP_TIMEOUT_MS}]"
                )));
            }
        },
        Some(_) => {
            return Err(ConfigError::Invalid(format!(
                "{ep_at}.startupTimeoutMs: must be an integer in [{MIN_STARTUP_TIMEOUT_MS}, {MAX_STARTUP_TIMEOUT_MS}]"
            )));
        }
    };

    let settings = match obj.get("settings") {
        None => Value::Object(Map::new()),
        Some(v @ Value::Object(_)) => v.clone(),
        Some(_) => {
            return Err(ConfigError::Invalid(format!(
                "{at}.settings: must be an object"
            )));
        }
    };

    Ok(ChannelDescriptor {
        id,
        channel_type,
        enabled,
        endpoint: ChannelEndpoint {
            host,
            port,
            health_path,
            invoke_path,
            startup_timeout_ms,
        },
        settings,
    })
}

fn expect_object<'a>(v: &'a Value, path: &str) -> Result<&'a Map<String, Value>, ConfigError> {
    v.as_object()
        .ok_or_else(|| ConfigError::Invalid(format!("{path}: must be an object")))
}

fn opt_bool(
    obj: Option<&Map<String, Value>>,
    key: &str,
    path: &str,
    default: bool,
) -> Result<bool, ConfigError> {
    match obj.and_then(|o| o.get(key)) {
        None | Some(Value::Null) => Ok(default),
        Some(Value::Bool(b)) => Ok(*b),
        Some(_) => Err(ConfigError::Invalid(format!("{path}: must be a boolean"))),
    }
}

/// An optional string field; trimmed, with empty treated as absent.
fn opt_string(
    obj: Option<&Map<String, Value>>,
    key: &str,
    path: &str,
) -> Result<Option<String>, ConfigError> {
    match obj.and_then(|o| o.get(key)) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Ok(None)
            } else {
                Ok(Some(trimmed.to_string()))
            }
        }
        Some(_) => Err(ConfigError::Invalid(format!("{path}: must be a string"))),
    }
}

/// An optional path field with a default; must start with `/`.
fn opt_path(
    obj: Option<&Map<String, Value>>,
    key: &str,
    path: &str,
    default: &str,
) -> Result<String, ConfigError> {
    let value = opt_string(obj, key, path)?.unwrap_or_else(|| default.to_string());
    if !value.starts_with('/') {
        return Err(ConfigError::Invalid(format!(
            "{path}: must start with \"/\""
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secret::SecretSource;

    fn valid_config() -> Value {
        json!({
            "gateway": {
                "enabled": true,
                "auth": { "bearerToken": "tok-123" }
            },
            "channels": [
                {
                    "id": "tg-main",
                    "type": "telegram",
                    "channelEndpoint": { "port": 8701 },
                    "settings": { "botToken": "x" }
                },
                {
                    "id": "hooks",
                    "type": "http",
                    "enabled": false,
                    "channelEndpoint": {
                        "host": "0.0.0.0",
                        "port": 8702,
                        "healthPath": "/health",
                        "invokePath": "/invoke",
                        "startupTimeoutMs": 5000
                    }
                }
            ]
        })
    }

    #[test]
    fn resolves_valid_config() {
        let config = GatewayConfig::from_value(&valid_config()).unwrap();
        assert!(config.enabled);
        assert_eq!(config.inbound_path, DEFAULT_INBOUND_PATH);
        assert_eq!(config.bearer_token.as_ref().unwrap().reveal(), "tok-123");
        assert_eq!(config.channels.len(), 2);

        let tg = &config.channels[0];
        assert_eq!(tg.id, "tg-main");
        assert_eq!(tg.channel_type, ChannelType::Telegram);
        assert!(tg.enabled);
        assert_eq!(tg.endpoint.host, "127.0.0.1");
        assert_eq!(tg.endpoint.port, 8701);
        assert_eq!(tg.endpoint.health_path, "/healthz");
        assert_eq!(tg.endpoint.invoke_path, "/rpc");
        assert_eq!(tg.endpoint.startup_timeout_ms, 10_000);
        assert_eq!(tg.endpoint.base_url(), "http://127.0.0.1:8701");

        let http = &config.channels[1];
        assert!(!http.enabled);
        assert_eq!(http.endpoint.host, "0.0.0.0");
        assert_eq!(http.endpoint.startup_timeout_ms, 5000);
    }

    #[test]
    fn absent_file_is_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let config = GatewayConfig::load(dir.path(), None).unwrap();
        assert!(!config.enabled);
        assert!(config.channels.is_empty());
        assert!(config.bearer_token.is_none());
    }

    #[test]
    fn loads_from_workspace_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(DEFAULT_CONFIG_FILE),
            serde_json::to_string(&valid_config()).unwrap(),
        )
        .unwrap();
        let config = GatewayConfig::load(dir.path(), None).unwrap();
        assert!(config.enabled);
        assert_eq!(config.channels.len(), 2);
    }

    #[test]
    fn override_path_is_honored() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("alt.json"),
            serde_json::to_string(&valid_config()).unwrap(),
        )
        .unwrap();
        let config = GatewayConfig::load(dir.path(), Some(Path::new("alt.json"))).unwrap();
        assert_eq!(config.channels.len(), 2);
    }

    #[test]
    fn root_must_be_object() {
        let err = GatewayConfig::from_value(&json!([])).unwrap_err();
        assert!(err.to_string().contains("$: must be an object"));
    }

    #[test]
    fn channels_must_be_array() {
        let err = GatewayConfig::from_value(&json!({"channels": {}})).unwrap_err();
        assert!(err.to_string().contains("channels: must be an array"));
    }

    #[test]
    fn inbound_path_must_start_with_slash() {
        let raw = json!({
            "gateway": { "enabled": false, "inboundPath": "inbound" }
        });
        let err = GatewayConfig::from_value(&raw).unwrap_err();
        assert!(err.to_string().contains("gateway.inboundPath"));
    }

    #[test]
    fn enabled_gateway_requires_bearer_token() {
        let raw = json!({ "gateway": { "enabled": true } });
        let err = GatewayConfig::from_value(&raw).unwrap_err();
        assert!(err.to_string().contains("gateway.auth.bearerToken"));
    }

    #[test]
    fn disabled_gateway_tolerates_missing_token() {
        let raw = json!({ "gateway": { "enabled": false } });
        let config = GatewayConfig::from_value(&raw).unwrap();
        assert!(config.bearer_token.is_none());
    }

    #[test]
    fn bearer_env_wins_over_literal() {
        unsafe { std::env::set_var("ATOM_TEST_BEARER", "env-token") };
        let raw = json!({
            "gateway": {
                "auth": { "bearerTokenEnv": "ATOM_TEST_BEARER", "bearerToken": "literal" }
            }
        });
        let config = GatewayConfig::from_value(&raw).unwrap();
        let token = config.bearer_token.unwrap();
        assert_eq!(token.reveal(), "env-token");
        assert_eq!(token.source(), &SecretSource::Env("ATOM_TEST_BEARER".into()));
        unsafe { std::env::remove_var("ATOM_TEST_BEARER") };
    }

    #[test]
    fn channel_id_required() {
        let raw = json!({
            "gateway": { "enabled": false },
            "channels": [{ "type": "http", "channelEndpoint": { "port": 1 } }]
        });
        let err = GatewayConfig::from_value(&raw).unwrap_err();
        assert!(err.to_string().contains("channels[0].id"));
    }

    #[test]
    fn unknown_channel_type_rejected() {
        let raw = json!({
            "gateway": { "enabled": false },
            "channels": [{ "id": "a", "type": "discord", "channelEndpoint": { "port": 1 } }]
        });
        let err = GatewayConfig::from_value(&raw).unwrap_err();
        assert!(err.to_string().contains("channels[0].type"));
        assert!(err.to_string().contains("discord"));
    }

    #[test]
    fn port_range_enforced() {
        for port in [json!(0), json!(65536), json!(-1), json!("80")] {
            let raw = json!({
                "gateway": { "enabled": false },
                "channels": [{ "id": "a", "type": "http", "channelEndpoint": { "port": port } }]
            });
            let err = GatewayConfig::from_value(&raw).unwrap_err();
            assert!(
                err.to_string()
                    .contains("channels[0].channelEndpoint.port"),
                "got: {err}"
            );
        }
    }

    #[test]
    fn startup_timeout_range_enforced() {
        for ms in [999, 120_001] {
            let raw = json!({
                "gateway": { "enabled": false },
                "channels": [{
                    "id": "a", "type": "http",
                    "channelEndpoint": { "port": 1, "startupTimeoutMs": ms }
                }]
            });
            let err = GatewayConfig::from_value(&raw).unwrap_err();
            assert!(err.to_string().contains("startupTimeoutMs"), "got: {err}");
        }
    }

    #[test]
    fn health_path_must_start_with_slash() {
        let raw = json!({
            "gateway": { "enabled": false },
            "channels": [{
                "id": "a", "type": "http",
                "channelEndpoint": { "port": 1, "healthPath": "healthz" }
            }]
        });
        let err = GatewayConfig::from_value(&raw).unwrap_err();
        assert!(err.to_string().contains("channels[0].channelEndpoint.healthPath"));
    }

    #[test]
    fn duplicate_channel_ids_rejected() {
        let raw = json!({
            "gateway": { "enabled": false },
            "channels": [
                { "id": "dup", "type": "http", "channelEndpoint": { "port": 1 } },
                { "id": "dup", "type": "telegram", "channelEndpoint": { "port": 2 } }
            ]
        });
        let err = GatewayConfig::from_value(&raw).unwrap_err();
        assert!(err.to_string().contains("channels[1].id"));
        assert!(err.to_string().contains("dup"));
    }

    #[test]
    fn settings_must_be_object() {
        let raw = json!({
            "gateway": { "enabled": false },
            "channels": [{
                "id": "a", "type": "http",
                "channelEndpoint": { "port": 1 },
                "settings": []
            }]
        });
        let err = GatewayConfig::from_value(&raw).unwrap_err();
        assert!(err.to_string().contains("channels[0].settings"));
    }

    #[test]
    fn descriptor_round_trips_through_json() {
        let config = GatewayConfig::from_value(&valid_config()).unwrap();
        let encoded = serde_json::to_string(&config.channels[0]).unwrap();
        let decoded: ChannelDescriptor = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, config.channels[0]);
        // Wire format uses the config-file field names.
        assert!(encoded.contains("\"channelEndpoint\""));
        assert!(encoded.contains("\"type\":\"telegram\""));
    }

    #[test]
    fn global_config_json_carries_resolved_token() {
        let config = GatewayConfig::from_value(&valid_config()).unwrap();
        let global = config.global_config_json();
        assert_eq!(global["auth"]["bearerToken"], "tok-123");
        assert_eq!(global["enabled"], true);

        let parsed: GlobalConfig = serde_json::from_value(global).unwrap();
        let token = parsed.auth.bearer_token.unwrap();
        assert_eq!(token.reveal(), "tok-123");
        assert_eq!(token.source(), &SecretSource::Spawn);
        assert!(parsed.enabled);
    }

    #[test]
    fn global_config_json_without_token_parses_back() {
        let config = GatewayConfig::disabled();
        let global = config.global_config_json();
        assert!(global["auth"]["bearerToken"].is_null());

        let parsed: GlobalConfig = serde_json::from_value(global).unwrap();
        assert!(parsed.auth.bearer_token.is_none());
    }
}
