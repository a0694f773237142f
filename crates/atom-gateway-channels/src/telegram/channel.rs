//! The Telegram channel runtime: webhook handling, the per-message task
//! pipeline, and reply delivery.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::Query;
use axum::http::{HeaderMap, StatusCode};
use axum::response::Json;
use axum::routing::post;
use rand::Rng;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use atom_gateway_client::{CreateTaskRequest, RuntimeClient};
use atom_gateway_plugin::{PluginBootstrap, PluginError, PluginServer, spawn_signal_listener};
use atom_gateway_types::{ChannelError, InboundMessage, InboundRequest, ParsedInbound};

use crate::control::{DescribeRpc, ShutdownRpc};
use crate::frame_task_input;
use crate::summary::summarize_terminal_task;
use crate::text::{escape_markdown_v2, split_message};

use super::api::TelegramApi;
use super::inbound::{ACK_POOL, parse_inbound};
use super::settings::TelegramSettings;

/// One Telegram channel bound to a bot token and an allow-list.
///
/// The webhook handler parses synchronously and spawns the task pipeline
/// fire-and-forget, answering 202 within milliseconds. Concurrent updates
/// fan out in parallel; per-conversation ordering is not guaranteed.
pub struct TelegramChannel {
    channel_id: String,
    settings: TelegramSettings,
    api: TelegramApi,
    runtime: RuntimeClient,
}

impl TelegramChannel {
    /// Assemble a channel from resolved parts.
    pub fn new(
        channel_id: impl Into<String>,
        settings: TelegramSettings,
        api: TelegramApi,
        runtime: RuntimeClient,
    ) -> Self {
        Self {
            channel_id: channel_id.into(),
            settings,
            api,
            runtime,
        }
    }

    /// The channel's resolved settings.
    pub fn settings(&self) -> &TelegramSettings {
        &self.settings
    }

    /// Register this channel's webhook with the Bot API. Fatal at
    /// startup when the registration is rejected.
    pub async fn register_webhook(&self) -> Result<(), ChannelError> {
        let url = self.settings.webhook_url();
        self.api
            .set_webhook(
                &url,
                self.settings
                    .webhook_secret_token
                    .as_ref()
                    .map(|s| s.reveal()),
                self.settings.drop_pending_updates_on_start,
            )
            .await?;
        info!(channel_id = %self.channel_id, url = %url, "webhook registered");
        Ok(())
    }

    /// Best-effort webhook removal during graceful shutdown.
    pub async fn remove_webhook(&self) {
        if let Err(e) = self
            .api
            .delete_webhook(self.settings.drop_pending_updates_on_start)
            .await
        {
            warn!(channel_id = %self.channel_id, error = %e, "deleteWebhook failed");
        }
    }

    /// Handle one webhook delivery: parse synchronously, spawn the
    /// processor, answer immediately.
    pub fn handle_webhook(self: &Arc<Self>, request: InboundRequest) -> (StatusCode, Json<Value>) {
        let request_id = request.request_id;
        let parsed = parse_inbound(&request, &self.settings);

        if !parsed.accepted {
            warn!(
                channel_id = %self.channel_id,
                request_id = %request_id,
                "webhook delivery rejected"
            );
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({"ok": false, "error": "unauthorized"})),
            );
        }

        if !parsed.is_empty() {
            let channel = Arc::clone(self);
            tokio::spawn(async move {
                channel.process_parsed(parsed).await;
            });
        }

        (
            StatusCode::ACCEPTED,
            Json(json!({"ok": true, "accepted": true})),
        )
    }

    /// Run the asynchronous part of one delivery: immediate responses,
    /// then the full ack / task / poll / reply pipeline per message.
    /// Nothing here ever propagates -- failures are logged and answered
    /// with a best-effort error notice.
    async fn process_parsed(self: Arc<Self>, parsed: ParsedInbound) {
        for reply in parsed.immediate_responses.into_iter().flatten() {
            if let Err(e) = self.send_text(&reply.conversation_id, &reply.text).await {
                error!(
                    channel_id = %self.channel_id,
                    conversation_id = %reply.conversation_id,
                    error = %e,
                    "failed to send immediate response"
                );
            }
        }

        for message in parsed.messages {
            let conversation_id = message.conversation_id.clone();
            if let Err(e) = self.run_message_pipeline(message).await {
                error!(
                    channel_id = %self.channel_id,
                    conversation_id = %conversation_id,
                    error = %e,
                    "message pipeline failed"
                );
                let notice = format!("Task failed: {e}");
                if let Err(e) = self.send_text(&conversation_id, &notice).await {
                    error!(
                        channel_id = %self.channel_id,
                        conversation_id = %conversation_id,
                        error = %e,
                        "failed to deliver error notice"
                    );
                }
            }
        }
    }

    /// ack -> create task -> poll -> reply, strictly in order.
    async fn run_message_pipeline(&self, message: InboundMessage) -> Result<(), ChannelError> {
        let ack = ACK_POOL[rand::thread_rng().gen_range(0..ACK_POOL.len())];
        if let Err(e) = self.send_text(&message.conversation_id, ack).await {
            // Ack failure is cosmetic; the pipeline continues.
            warn!(
                channel_id = %self.channel_id,
                conversation_id = %message.conversation_id,
                error = %e,
                "failed to send ack"
            );
        }

        let input = frame_task_input(
            &self.channel_id,
            &message.conversation_id,
            message.sender_id.as_deref().unwrap_or("unknown"),
            &message.text,
        );
        let created = self
            .runtime
            .create_task(&CreateTaskRequest::gateway_input(input))
            .await
            .map_err(|e| ChannelError::Runtime(e.to_string()))?;
        info!(
            channel_id = %self.channel_id,
            conversation_id = %message.conversation_id,
            task_id = %created.task_id,
            "task created"
        );

        let reply = self.await_task_result(&created.task_id).await?;
        self.send_text(&message.conversation_id, &reply).await
    }

    /// Poll the runtime until the task reaches a terminal state, then
    /// summarize it into the reply text.
    async fn await_task_result(&self, task_id: &str) -> Result<String, ChannelError> {
        loop {
            let fetched = self
                .runtime
                .get_task(task_id)
                .await
                .map_err(|e| ChannelError::Runtime(e.to_string()))?;

            if fetched.task.status.is_still_running() {
                tokio::time::sleep(std::time::Duration::from_millis(
                    self.settings.poll_interval_ms,
                ))
                .await;
                continue;
            }

            let completion = summarize_terminal_task(&fetched.task);
            return Ok(completion.user_reply().to_string());
        }
    }

    /// Deliver text to a chat: normalize, escape when in MarkdownV2 mode,
    /// split, and send the chunks sequentially. The first chunk failure
    /// aborts the rest and propagates.
    pub async fn send_text(&self, chat_id: &str, text: &str) -> Result<(), ChannelError> {
        let text = if text.is_empty() { "(empty result)" } else { text };

        let rendered;
        let outgoing = match self.settings.parse_mode.api_value() {
            Some(_) => {
                rendered = escape_markdown_v2(text);
                rendered.as_str()
            }
            None => text,
        };

        let chunks = split_message(outgoing, self.settings.chunk_size)?;
        for chunk in &chunks {
            self.api
                .send_message(chat_id, chunk, self.settings.parse_mode.api_value())
                .await?;
        }
        Ok(())
    }
}

/// Entry point of the `atom-gateway-telegram` plugin binary.
pub async fn run() -> Result<(), PluginError> {
    let boot = PluginBootstrap::from_env()?;
    let descriptor = boot.descriptor;

    let settings = TelegramSettings::resolve(&descriptor.settings)
        .map_err(|e| PluginError::Startup(e.to_string()))?;
    let api = TelegramApi::new(&settings.bot_token);
    let runtime = RuntimeClient::new(boot.server_url);
    let webhook_path = settings.webhook_path.clone();
    let channel = Arc::new(TelegramChannel::new(
        descriptor.id.clone(),
        settings,
        api,
        runtime,
    ));

    // One token drives the shutdown RPC, the signal handlers, and the
    // server's graceful stop.
    let stop = CancellationToken::new();

    let webhook = {
        let channel = Arc::clone(&channel);
        post(
            move |Query(query): Query<HashMap<String, String>>,
                  headers: HeaderMap,
                  body: Bytes| {
                let channel = channel.clone();
                async move {
                    let request = snapshot_request(&headers, query, &body);
                    channel.handle_webhook(request)
                }
            },
        )
    };

    let server = PluginServer::builder(descriptor.id.clone(), descriptor.endpoint.clone())
        .with_cancel_token(stop.clone())
        .capture_signals(false)
        .rpc_method("channel.shutdown", ShutdownRpc::new(stop.clone()))
        .rpc_method(
            "channel.describe",
            DescribeRpc::new(descriptor.id.clone(), descriptor.channel_type),
        )
        .route(webhook_path, webhook)
        .start()
        .await?;

    channel
        .register_webhook()
        .await
        .map_err(|e| PluginError::Startup(e.to_string()))?;

    // The channel owns graceful shutdown (webhook removal before the
    // server stops), so the server's own signal capture stays off.
    spawn_signal_listener(stop.clone());
    info!(channel_id = %server.channel_id(), "telegram channel running");

    stop.cancelled().await;
    channel.remove_webhook().await;
    server.shutdown().await;
    Ok(())
}

/// Build the neutral request snapshot from axum extractor output.
fn snapshot_request(
    headers: &HeaderMap,
    query: HashMap<String, String>,
    body: &Bytes,
) -> InboundRequest {
    let headers = headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                value.to_str().unwrap_or_default().to_string(),
            )
        })
        .collect();
    InboundRequest::capture(
        "POST",
        headers,
        query,
        String::from_utf8_lossy(body).into_owned(),
    )
}
