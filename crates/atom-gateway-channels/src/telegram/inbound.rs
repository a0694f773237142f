//! Pure parsing of Telegram webhook updates.
//!
//! [`parse_inbound`] interprets one [`InboundRequest`] against the channel
//! settings. It performs no I/O: secret validation, allow-list filtering,
//! and command handling all reduce to a [`ParsedInbound`] value the
//! channel acts on afterwards.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value, json};

use atom_gateway_types::{ImmediateReply, InboundMessage, InboundRequest, ParsedInbound};

use super::settings::TelegramSettings;

/// Header Telegram echoes the configured secret token in.
pub const SECRET_TOKEN_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Reply for updates that carry no usable text.
pub(crate) const NON_TEXT_REPLY: &str = "Only text messages are supported.";

/// Reply to the `/start` command.
pub(crate) const START_REPLY: &str = "Atom bot is ready. Send a message to start a task.";

/// Reply to the `/help` command.
pub(crate) const HELP_REPLY: &str = "Atom message gateway\n\n\
    /start - check that the bot is ready\n\
    /help - show this help\n\n\
    Any other text message is submitted to the task runtime; the reply \
    arrives in this chat once the task finishes.";

/// Reassurance strings sent before task submission so the user sees
/// immediate liveness. One is drawn uniformly per message.
pub const ACK_POOL: [&str; 10] = [
    "收到，正在思考中，请稍候。",
    "好的，我马上处理。",
    "明白了，正在为你安排任务。",
    "收到消息，稍等片刻。",
    "正在处理中，请稍候。",
    "好的，任务已经开始执行。",
    "收到，让我想一想。",
    "了解，正在准备回复。",
    "消息已收到，正在处理。",
    "稍等一下，马上给你结果。",
];

/// Leading bot command, with optional `@BotName` suffix.
static COMMAND_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/([a-zA-Z0-9_]+)(?:@[a-zA-Z0-9_]+)?(?:\s|$)").expect("command regex compiles")
});

/// Parse one webhook delivery.
pub fn parse_inbound(request: &InboundRequest, settings: &TelegramSettings) -> ParsedInbound {
    if let Some(secret) = &settings.webhook_secret_token
        && request.header(SECRET_TOKEN_HEADER) != Some(secret.reveal())
    {
        return ParsedInbound::rejected();
    }

    let Some(body) = request.body.as_ref().and_then(Value::as_object) else {
        return ParsedInbound::ignored();
    };
    let Some(message) = body.get("message").and_then(Value::as_object) else {
        return ParsedInbound::ignored();
    };

    let Some(chat_id) = message
        .get("chat")
        .and_then(|chat| chat.get("id"))
        .and_then(stringify_id)
    else {
        return ParsedInbound::ignored();
    };

    if !settings.allowed_chat_ids.contains(&chat_id) {
        // Silent drop; unauthorized chats get no feedback at all.
        return ParsedInbound::ignored();
    }

    let text = message
        .get("text")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string();
    if text.is_empty() {
        return ParsedInbound::immediate(ImmediateReply {
            conversation_id: chat_id,
            text: NON_TEXT_REPLY.into(),
            metadata: None,
        });
    }

    if let Some(captures) = COMMAND_RE.captures(&text) {
        let command = captures[1].to_lowercase();
        match command.as_str() {
            "start" => {
                return ParsedInbound::immediate(ImmediateReply {
                    conversation_id: chat_id,
                    text: START_REPLY.into(),
                    metadata: None,
                });
            }
            "help" => {
                return ParsedInbound::immediate(ImmediateReply {
                    conversation_id: chat_id,
                    text: HELP_REPLY.into(),
                    metadata: None,
                });
            }
            // Unknown commands flow through to the runtime as plain text.
            _ => {}
        }
    }

    let sender_id = message
        .get("from")
        .and_then(|from| from.get("id"))
        .and_then(stringify_id);
    let message_id = message.get("message_id").and_then(stringify_id);

    let mut metadata = Map::new();
    if let Some(update_id) = body.get("update_id") {
        metadata.insert("updateId".into(), update_id.clone());
    }
    if let Some(chat_type) = message
        .get("chat")
        .and_then(|chat| chat.get("type"))
        .and_then(Value::as_str)
    {
        metadata.insert("chatType".into(), json!(chat_type));
    }

    ParsedInbound::message(InboundMessage {
        message_id,
        conversation_id: chat_id,
        sender_id,
        text,
        metadata: Some(Value::Object(metadata)),
    })
}

/// Chat / user / message ids arrive as numbers; normalize to strings.
fn stringify_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
