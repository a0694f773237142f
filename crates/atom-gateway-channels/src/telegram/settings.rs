//! Telegram channel settings resolution.

use std::collections::HashSet;

use serde_json::Value;

use atom_gateway_types::secret::{Secret, SecretRef};
use atom_gateway_types::ChannelError;

const DEFAULT_WEBHOOK_PATH: &str = "/telegram/webhook";
const DEFAULT_CHUNK_SIZE: usize = 3500;
const MAX_CHUNK_SIZE: usize = 4096;
const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
const MAX_POLL_INTERVAL_MS: u64 = 60_000;

/// Outgoing-message formatting mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseMode {
    /// Escape replies and send with `parse_mode: "MarkdownV2"`.
    #[default]
    MarkdownV2,
    /// Send replies verbatim with no parse mode.
    Plain,
}

impl ParseMode {
    /// The `parse_mode` value to send to the Bot API, when any.
    pub fn api_value(&self) -> Option<&'static str> {
        match self {
            ParseMode::MarkdownV2 => Some("MarkdownV2"),
            ParseMode::Plain => None,
        }
    }
}

/// Validated and normalized settings of one Telegram channel.
#[derive(Debug, Clone)]
pub struct TelegramSettings {
    /// Chat ids the bot answers; everything else is silently dropped.
    pub allowed_chat_ids: HashSet<String>,
    /// Bot API token.
    pub bot_token: Secret,
    /// Public base URL the webhook is registered under, no trailing `/`.
    pub webhook_public_base_url: String,
    /// Webhook route path on the plugin server.
    pub webhook_path: String,
    /// Secret token Telegram echoes back in a header, when configured.
    pub webhook_secret_token: Option<Secret>,
    /// Whether pending updates are dropped when the webhook is set.
    pub drop_pending_updates_on_start: bool,
    /// Reply formatting mode.
    pub parse_mode: ParseMode,
    /// Maximum characters per outgoing message chunk.
    pub chunk_size: usize,
    /// Delay between task polls.
    pub poll_interval_ms: u64,
}

impl TelegramSettings {
    /// Resolve raw channel `settings` into validated Telegram settings.
    pub fn resolve(settings: &Value) -> Result<Self, ChannelError> {
        let obj = settings
            .as_object()
            .ok_or_else(|| invalid("settings", "must be an object"))?;

        let allowed_chat_ids = resolve_allowed_chat_ids(obj.get("allowedChatIds"))?;

        let bot_token = SecretRef {
            env_name: string_field(obj.get("botTokenEnv")),
            inline_value: string_field(obj.get("botToken")),
        }
        .resolve("settings.botToken")
        .map_err(|e| ChannelError::InvalidSettings(e.to_string()))?;

        let webhook_public_base_url = string_field(obj.get("webhookPublicBaseUrl"))
            .map(|u| u.trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty())
            .ok_or_else(|| invalid("webhookPublicBaseUrl", "must be a non-empty string"))?;

        let webhook_path =
            string_field(obj.get("webhookPath")).unwrap_or_else(|| DEFAULT_WEBHOOK_PATH.into());
        if !webhook_path.starts_with('/') {
            return Err(invalid("webhookPath", "must start with \"/\""));
        }

        let webhook_secret_token = SecretRef {
            env_name: string_field(obj.get("webhookSecretTokenEnv")),
            inline_value: string_field(obj.get("webhookSecretToken")),
        }
        .resolve_optional();

        let drop_pending_updates_on_start = match obj.get("dropPendingUpdatesOnStart") {
            None | Some(Value::Null) => true,
            Some(Value::Bool(b)) => *b,
            Some(_) => return Err(invalid("dropPendingUpdatesOnStart", "must be a boolean")),
        };

        let parse_mode = match obj.get("parseMode") {
            None | Some(Value::Null) => ParseMode::MarkdownV2,
            Some(Value::String(s)) if s == "MarkdownV2" => ParseMode::MarkdownV2,
            Some(Value::String(s)) if s == "plain" => ParseMode::Plain,
            Some(_) => {
                return Err(invalid("parseMode", "must be \"MarkdownV2\" or \"plain\""));
            }
        };

        let chunk_size = match obj.get("chunkSize") {
            None | Some(Value::Null) => DEFAULT_CHUNK_SIZE,
            Some(Value::Number(n)) => match n.as_u64() {
                Some(size @ 1..) if size as usize <= MAX_CHUNK_SIZE => size as usize,
                _ => return Err(invalid("chunkSize", "must be an integer in [1, 4096]")),
            },
            Some(_) => return Err(invalid("chunkSize", "must be an integer in [1, 4096]")),
        };

        let poll_interval_ms = match obj.get("pollIntervalMs") {
            None | Some(Value::Null) => DEFAULT_POLL_INTERVAL_MS,
            Some(Value::Number(n)) => match n.as_u64() {
                Some(ms) if ms <= MAX_POLL_INTERVAL_MS => ms,
                _ => return Err(invalid("pollIntervalMs", "must be an integer in [0, 60000]")),
            },
            Some(_) => return Err(invalid("pollIntervalMs", "must be an integer in [0, 60000]")),
        };

        Ok(Self {
            allowed_chat_ids,
            bot_token,
            webhook_public_base_url,
            webhook_path,
            webhook_secret_token,
            drop_pending_updates_on_start,
            parse_mode,
            chunk_size,
            poll_interval_ms,
        })
    }

    /// Full public webhook URL registered with the Bot API.
    pub fn webhook_url(&self) -> String {
        format!("{}{}", self.webhook_public_base_url, self.webhook_path)
    }
}

fn resolve_allowed_chat_ids(value: Option<&Value>) -> Result<HashSet<String>, ChannelError> {
    let ids: HashSet<String> = match value {
        Some(Value::Array(items)) => {
            let mut ids = HashSet::new();
            for item in items {
                match item {
                    Value::String(s) => {
                        let trimmed = s.trim();
                        if !trimmed.is_empty() {
                            ids.insert(trimmed.to_string());
                        }
                    }
                    Value::Number(n) => {
                        ids.insert(n.to_string());
                    }
                    _ => {
                        return Err(invalid(
                            "allowedChatIds",
                            "entries must be strings or numbers",
                        ));
                    }
                }
            }
            ids
        }
        Some(Value::String(csv)) => csv
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        _ => {
            return Err(invalid(
                "allowedChatIds",
                "must be an array of chat ids or a comma-separated string",
            ));
        }
    };

    if ids.is_empty() {
        return Err(invalid("allowedChatIds", "at least one chat id required"));
    }
    Ok(ids)
}

fn string_field(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn invalid(field: &str, reason: &str) -> ChannelError {
    ChannelError::InvalidSettings(format!("settings.{field}: {reason}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal() -> Value {
        json!({
            "allowedChatIds": ["100"],
            "botToken": "123:ABC",
            "webhookPublicBaseUrl": "https://bot.example.com/"
        })
    }

    #[test]
    fn resolves_minimal_settings_with_defaults() {
        let settings = TelegramSettings::resolve(&minimal()).unwrap();
        assert_eq!(settings.allowed_chat_ids, HashSet::from(["100".to_string()]));
        assert_eq!(settings.bot_token.reveal(), "123:ABC");
        // Trailing slash stripped, default path appended.
        assert_eq!(settings.webhook_public_base_url, "https://bot.example.com");
        assert_eq!(settings.webhook_path, "/telegram/webhook");
        assert_eq!(
            settings.webhook_url(),
            "https://bot.example.com/telegram/webhook"
        );
        assert!(settings.webhook_secret_token.is_none());
        assert!(settings.drop_pending_updates_on_start);
        assert_eq!(settings.parse_mode, ParseMode::MarkdownV2);
        assert_eq!(settings.chunk_size, 3500);
        assert_eq!(settings.poll_interval_ms, 1000);
    }

    #[test]
    fn chat_ids_accept_csv_string() {
        let mut raw = minimal();
        raw["allowedChatIds"] = json!(" 100 , 200 ,, 300 ");
        let settings = TelegramSettings::resolve(&raw).unwrap();
        assert_eq!(
            settings.allowed_chat_ids,
            HashSet::from(["100".into(), "200".into(), "300".into()])
        );
    }

    #[test]
    fn chat_ids_accept_numbers() {
        let mut raw = minimal();
        raw["allowedChatIds"] = json!([100, "200"]);
        let settings = TelegramSettings::resolve(&raw).unwrap();
        assert!(settings.allowed_chat_ids.contains("100"));
        assert!(settings.allowed_chat_ids.contains("200"));
    }

    #[test]
    fn empty_chat_ids_rejected() {
        let mut raw = minimal();
        raw["allowedChatIds"] = json!(["  ", ""]);
        let err = TelegramSettings::resolve(&raw).unwrap_err();
        assert!(err.to_string().contains("allowedChatIds"));

        let mut raw = minimal();
        raw["allowedChatIds"] = json!(" , ");
        assert!(TelegramSettings::resolve(&raw).is_err());
    }

    #[test]
    fn bot_token_env_wins() {
        unsafe { std::env::set_var("ATOM_TEST_TG_TOKEN", "env-token") };
        let mut raw = minimal();
        raw["botTokenEnv"] = json!("ATOM_TEST_TG_TOKEN");
        let settings = TelegramSettings::resolve(&raw).unwrap();
        assert_eq!(settings.bot_token.reveal(), "env-token");
        unsafe { std::env::remove_var("ATOM_TEST_TG_TOKEN") };
    }

    #[test]
    fn missing_bot_token_rejected() {
        let mut raw = minimal();
        raw.as_object_mut().unwrap().remove("botToken");
        let err = TelegramSettings::resolve(&raw).unwrap_err();
        assert!(err.to_string().contains("botToken"));
    }

    #[test]
    fn missing_base_url_rejected() {
        let mut raw = minimal();
        raw.as_object_mut().unwrap().remove("webhookPublicBaseUrl");
        let err = TelegramSettings::resolve(&raw).unwrap_err();
        assert!(err.to_string().contains("webhookPublicBaseUrl"));
    }

    #[test]
    fn webhook_path_must_start_with_slash() {
        let mut raw = minimal();
        raw["webhookPath"] = json!("telegram/webhook");
        let err = TelegramSettings::resolve(&raw).unwrap_err();
        assert!(err.to_string().contains("webhookPath"));
    }

    #[test]
    fn parse_mode_plain() {
        let mut raw = minimal();
        raw["parseMode"] = json!("plain");
        let settings = TelegramSettings::resolve(&raw).unwrap();
        assert_eq!(settings.parse_mode, ParseMode::Plain);
        assert!(settings.parse_mode.api_value().is_none());
    }

    #[test]
    fn unknown_parse_mode_rejected() {
        let mut raw = minimal();
        raw["parseMode"] = json!("HTML");
        assert!(TelegramSettings::resolve(&raw).is_err());
    }

    #[test]
    fn chunk_size_bounds() {
        for bad in [0, 4097] {
            let mut raw = minimal();
            raw["chunkSize"] = json!(bad);
            assert!(TelegramSettings::resolve(&raw).is_err(), "chunkSize {bad}");
        }
        let mut raw = minimal();
        raw["chunkSize"] = json!(4096);
        assert_eq!(TelegramSettings::resolve(&raw).unwrap().chunk_size, 4096);
    }

    #[test]
    fn poll_interval_bounds() {
        let mut raw = minimal();
        raw["pollIntervalMs"] = json!(60_001);
        assert!(TelegramSettings::resolve(&raw).is_err());

        let mut raw = minimal();
        raw["pollIntervalMs"] = json!(0);
        assert_eq!(TelegramSettings::resolve(&raw).unwrap().poll_interval_ms, 0);
    }

    #[test]
    fn secret_token_resolves_from_env() {
        unsafe { std::env::set_var("ATOM_TEST_TG_SECRET", "hook-secret") };
        let mut raw = minimal();
        raw["webhookSecretTokenEnv"] = json!("ATOM_TEST_TG_SECRET");
        let settings = TelegramSettings::resolve(&raw).unwrap();
        assert_eq!(
            settings.webhook_secret_token.unwrap().reveal(),
            "hook-secret"
        );
        unsafe { std::env::remove_var("ATOM_TEST_TG_SECRET") };
    }
}
