//! HTTP client wrapper for the Telegram Bot API.
//!
//! [`TelegramApi`] provides typed methods for the subset of the Bot API
//! the webhook-mode channel uses: `setWebhook`, `deleteWebhook`, and
//! `sendMessage`. The channel never calls `getUpdates` -- updates arrive
//! on the webhook route.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use atom_gateway_types::secret::Secret;
use atom_gateway_types::ChannelError;

/// Wrapper for all Telegram Bot API responses.
///
/// Every method returns `{ ok: bool, description?, result? }`. When `ok`
/// is `false`, `description` carries the error message.
#[derive(Debug, Deserialize)]
struct TelegramResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Request body for `setWebhook`.
#[derive(Debug, Serialize)]
struct SetWebhookRequest<'a> {
    url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    secret_token: Option<&'a str>,
    drop_pending_updates: bool,
}

/// Request body for `deleteWebhook`.
#[derive(Debug, Serialize)]
struct DeleteWebhookRequest {
    drop_pending_updates: bool,
}

/// Request body for `sendMessage`.
#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'a str>,
}

/// HTTP client for the Telegram Bot API.
///
/// Wraps a [`reqwest::Client`] and the bot token. The base URL can be
/// overridden for testing.
pub struct TelegramApi {
    http: Client,
    /// Base URL: `https://api.telegram.org/bot{token}` by default.
    base_url: String,
}

impl TelegramApi {
    /// Create a new client with the given bot token.
    pub fn new(token: &Secret) -> Self {
        Self {
            http: Client::new(),
            base_url: format!("https://api.telegram.org/bot{}", token.reveal()),
        }
    }

    /// Create a client pointing at a custom base URL (for testing).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Register the webhook URL for this bot.
    pub async fn set_webhook(
        &self,
        url: &str,
        secret_token: Option<&str>,
        drop_pending_updates: bool,
    ) -> Result<(), ChannelError> {
        debug!(url = %url, drop_pending_updates, "registering webhook");
        self.call(
            "setWebhook",
            &SetWebhookRequest {
                url,
                secret_token,
                drop_pending_updates,
            },
        )
        .await
    }

    /// Remove the webhook registration.
    pub async fn delete_webhook(&self, drop_pending_updates: bool) -> Result<(), ChannelError> {
        debug!(drop_pending_updates, "deleting webhook");
        self.call(
            "deleteWebhook",
            &DeleteWebhookRequest {
                drop_pending_updates,
            },
        )
        .await
    }

    /// Send one text message to a chat.
    pub async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        parse_mode: Option<&str>,
    ) -> Result<(), ChannelError> {
        debug!(chat_id = %chat_id, chars = text.chars().count(), "sending message");
        self.call(
            "sendMessage",
            &SendMessageRequest {
                chat_id,
                text,
                parse_mode,
            },
        )
        .await
    }

    async fn call<B: Serialize>(&self, method: &str, body: &B) -> Result<(), ChannelError> {
        let url = format!("{}/{method}", self.base_url);

        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| ChannelError::Transport(format!("{method}: {e}")))?;

        let envelope: TelegramResponse = response
            .json()
            .await
            .map_err(|e| ChannelError::Transport(format!("{method}: {e}")))?;

        if !envelope.ok {
            let desc = envelope
                .description
                .unwrap_or_else(|| "unknown error".into());
            return Err(ChannelError::Platform(format!("{method}: {desc}")));
        }
        Ok(())
    }
}
