//! HTTP channel settings resolution.

use serde_json::Value;

use atom_gateway_types::secret::{Secret, SecretRef};
use atom_gateway_types::ChannelError;

const DEFAULT_INBOUND_PATH: &str = "/http/webhook";

/// Validated settings of one HTTP channel.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    /// Route the webhook listens on.
    pub inbound_path: String,
    /// Bearer token producers must present; `None` disables auth.
    pub auth_token: Option<Secret>,
}

impl HttpSettings {
    /// Resolve raw channel `settings` into validated HTTP settings.
    pub fn resolve(settings: &Value) -> Result<Self, ChannelError> {
        let obj = settings
            .as_object()
            .ok_or_else(|| ChannelError::InvalidSettings("settings: must be an object".into()))?;

        let inbound_path = obj
            .get("inboundPath")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .unwrap_or_else(|| DEFAULT_INBOUND_PATH.into());
        if !inbound_path.starts_with('/') {
            return Err(ChannelError::InvalidSettings(
                "settings.inboundPath: must start with \"/\"".into(),
            ));
        }

        let auth_token = SecretRef {
            env_name: obj
                .get("authTokenEnv")
                .and_then(Value::as_str)
                .map(String::from),
            inline_value: obj
                .get("authToken")
                .and_then(Value::as_str)
                .map(String::from),
        }
        .resolve_optional();

        Ok(Self {
            inbound_path,
            auth_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_apply() {
        let settings = HttpSettings::resolve(&json!({})).unwrap();
        assert_eq!(settings.inbound_path, "/http/webhook");
        assert!(settings.auth_token.is_none());
    }

    #[test]
    fn custom_path_and_token() {
        let settings = HttpSettings::resolve(&json!({
            "inboundPath": "/ingest",
            "authToken": "  T  "
        }))
        .unwrap();
        assert_eq!(settings.inbound_path, "/ingest");
        assert_eq!(settings.auth_token.unwrap().reveal(), "T");
    }

    #[test]
    fn path_must_start_with_slash() {
        let err = HttpSettings::resolve(&json!({"inboundPath": "ingest"})).unwrap_err();
        assert!(err.to_string().contains("inboundPath"));
    }

    #[test]
    fn token_env_wins() {
        unsafe { std::env::set_var("ATOM_TEST_HTTP_TOKEN", "env-T") };
        let settings = HttpSettings::resolve(&json!({
            "authTokenEnv": "ATOM_TEST_HTTP_TOKEN",
            "authToken": "literal-T"
        }))
        .unwrap();
        assert_eq!(settings.auth_token.unwrap().reveal(), "env-T");
        unsafe { std::env::remove_var("ATOM_TEST_HTTP_TOKEN") };
    }
}
