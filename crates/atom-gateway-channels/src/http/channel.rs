//! The HTTP channel runtime.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::Query;
use axum::http::{HeaderMap, StatusCode};
use axum::response::Json;
use axum::routing::post;
use serde_json::{Map, Value, json};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use atom_gateway_client::{CreateTaskRequest, RuntimeClient};
use atom_gateway_plugin::{PluginBootstrap, PluginError, PluginServer};
use atom_gateway_types::InboundRequest;

use crate::control::{DescribeRpc, ShutdownRpc};
use crate::frame_task_input;

use super::settings::HttpSettings;

/// Fallback conversation id when the payload names none.
const DEFAULT_CONVERSATION_ID: &str = "http";

/// Fallback sender id when the payload names none.
const DEFAULT_SENDER_ID: &str = "unknown";

/// One HTTP webhook channel.
pub struct HttpChannel {
    channel_id: String,
    settings: HttpSettings,
    runtime: RuntimeClient,
}

impl HttpChannel {
    /// Assemble a channel from resolved parts.
    pub fn new(
        channel_id: impl Into<String>,
        settings: HttpSettings,
        runtime: RuntimeClient,
    ) -> Self {
        Self {
            channel_id: channel_id.into(),
            settings,
            runtime,
        }
    }

    /// The channel's resolved settings.
    pub fn settings(&self) -> &HttpSettings {
        &self.settings
    }

    /// Handle one inbound post: authenticate, extract the text, submit a
    /// task, answer with the task id. Unlike the Telegram channel there
    /// is no reply polling -- delivery back to the producer is a no-op.
    pub async fn handle_webhook(&self, request: InboundRequest) -> (StatusCode, Json<Value>) {
        if let Some(token) = &self.settings.auth_token {
            let expected = format!("Bearer {}", token.reveal());
            if request.header("authorization") != Some(expected.as_str()) {
                warn!(
                    channel_id = %self.channel_id,
                    request_id = %request.request_id,
                    "inbound post rejected: bad bearer token"
                );
                return (
                    StatusCode::UNAUTHORIZED,
                    Json(json!({"ok": false, "error": "unauthorized"})),
                );
            }
        }

        let empty = Map::new();
        let body = request
            .body
            .as_ref()
            .and_then(Value::as_object)
            .unwrap_or(&empty);

        let Some(text) = first_text(body, &["text", "message", "input"]) else {
            return (
                StatusCode::ACCEPTED,
                Json(json!({"ok": true, "accepted": false, "reason": "no text"})),
            );
        };

        let conversation_id = first_id(body, &["conversationId", "chatId", "threadId"])
            .unwrap_or_else(|| DEFAULT_CONVERSATION_ID.into());
        let sender_id = first_id(body, &["senderId", "userId", "from"])
            .unwrap_or_else(|| DEFAULT_SENDER_ID.into());

        let input = frame_task_input(&self.channel_id, &conversation_id, &sender_id, &text);
        match self
            .runtime
            .create_task(&CreateTaskRequest::gateway_input(input))
            .await
        {
            Ok(created) => {
                info!(
                    channel_id = %self.channel_id,
                    conversation_id = %conversation_id,
                    task_id = %created.task_id,
                    "task created"
                );
                (
                    StatusCode::ACCEPTED,
                    Json(json!({"ok": true, "accepted": true, "taskId": created.task_id})),
                )
            }
            Err(e) => {
                warn!(
                    channel_id = %self.channel_id,
                    error = %e,
                    "task submission failed"
                );
                (
                    StatusCode::BAD_GATEWAY,
                    Json(json!({"ok": false, "error": e.to_string()})),
                )
            }
        }
    }
}

/// First non-empty trimmed string among `keys`.
fn first_text(body: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        body.get(*key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
    })
}

/// First usable id among `keys`; numbers are stringified.
fn first_id(body: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match body.get(*key) {
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Entry point of the `atom-gateway-http` plugin binary.
pub async fn run() -> Result<(), PluginError> {
    let boot = PluginBootstrap::from_env()?;
    let descriptor = boot.descriptor;

    let settings = HttpSettings::resolve(&descriptor.settings)
        .map_err(|e| PluginError::Startup(e.to_string()))?;
    let inbound_path = settings.inbound_path.clone();
    let channel = Arc::new(HttpChannel::new(
        descriptor.id.clone(),
        settings,
        RuntimeClient::new(boot.server_url),
    ));

    let stop = CancellationToken::new();

    let webhook = {
        let channel = Arc::clone(&channel);
        post(
            move |Query(query): Query<HashMap<String, String>>,
                  headers: HeaderMap,
                  body: Bytes| {
                let channel = channel.clone();
                async move {
                    let headers = headers
                        .iter()
                        .map(|(name, value)| {
                            (
                                name.as_str().to_string(),
                                value.to_str().unwrap_or_default().to_string(),
                            )
                        })
                        .collect();
                    let request = InboundRequest::capture(
                        "POST",
                        headers,
                        query,
                        String::from_utf8_lossy(&body).into_owned(),
                    );
                    channel.handle_webhook(request).await
                }
            },
        )
    };

    // No platform teardown to run, so the server's own signal capture
    // drives shutdown.
    let server = PluginServer::builder(descriptor.id.clone(), descriptor.endpoint.clone())
        .with_cancel_token(stop.clone())
        .capture_signals(true)
        .rpc_method("channel.shutdown", ShutdownRpc::new(stop.clone()))
        .rpc_method(
            "channel.describe",
            DescribeRpc::new(descriptor.id.clone(), descriptor.channel_type),
        )
        .route(inbound_path, webhook)
        .start()
        .await?;

    info!(channel_id = %server.channel_id(), "http channel running");

    server.cancelled().await;
    server.shutdown().await;
    Ok(())
}
