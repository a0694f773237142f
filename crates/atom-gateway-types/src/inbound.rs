//! Neutral inbound-message shapes.
//!
//! An [`InboundRequest`] is the snapshot of one external HTTP call taken at
//! the webhook edge, before any platform-specific interpretation. Channel
//! parsers turn it into a [`ParsedInbound`]: zero or more normalized
//! [`InboundMessage`]s plus optional [`ImmediateReply`]s that are delivered
//! without a runtime round-trip.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Snapshot of one external HTTP call.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    /// Fresh UUID assigned at reception.
    pub request_id: Uuid,
    /// HTTP method, upper-case.
    pub method: String,
    /// Request headers with lower-cased keys.
    pub headers: HashMap<String, String>,
    /// Query-string parameters.
    pub query: HashMap<String, String>,
    /// Body parsed as JSON, when it parses.
    pub body: Option<serde_json::Value>,
    /// The raw body text.
    pub raw_body: String,
    /// Wall-clock reception time.
    pub received_at: DateTime<Utc>,
}

impl InboundRequest {
    /// Capture a request snapshot. Header keys are lower-cased and the body
    /// is parsed as JSON best-effort (parse failure leaves `body` unset).
    pub fn capture(
        method: &str,
        headers: HashMap<String, String>,
        query: HashMap<String, String>,
        raw_body: String,
    ) -> Self {
        let headers = headers
            .into_iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v))
            .collect();
        let body = serde_json::from_str(&raw_body).ok();
        Self {
            request_id: Uuid::new_v4(),
            method: method.to_ascii_uppercase(),
            headers,
            query,
            body,
            raw_body,
            received_at: Utc::now(),
        }
    }

    /// Look up a header by its lower-cased name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

/// One user-originated text event after normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Platform message identifier, when the payload carries one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    /// Conversation the message belongs to. Required; plugins invent one
    /// when the platform payload omits it.
    pub conversation_id: String,
    /// Sender identifier, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<String>,
    /// Non-empty message text.
    pub text: String,
    /// Opaque platform metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// A reply delivered without a runtime round-trip (commands, help,
/// validation notices).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImmediateReply {
    /// Conversation to deliver the reply to.
    pub conversation_id: String,
    /// Reply text.
    pub text: String,
    /// Opaque metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// Result of parsing one [`InboundRequest`].
///
/// `accepted == false` means "reject at the HTTP layer" (401). An accepted
/// result with no messages and no immediate responses means "silently
/// ignore" -- e.g. a chat id that is not allow-listed.
#[derive(Debug, Clone, Default)]
pub struct ParsedInbound {
    /// Whether the delivery is accepted at the HTTP layer.
    pub accepted: bool,
    /// Normalized messages to run through the task pipeline.
    pub messages: Vec<InboundMessage>,
    /// Replies to send without touching the runtime.
    pub immediate_responses: Option<Vec<ImmediateReply>>,
}

impl ParsedInbound {
    /// Reject the delivery at the HTTP layer.
    pub fn rejected() -> Self {
        Self {
            accepted: false,
            messages: Vec::new(),
            immediate_responses: None,
        }
    }

    /// Accept the delivery but do nothing with it.
    pub fn ignored() -> Self {
        Self {
            accepted: true,
            messages: Vec::new(),
            immediate_responses: None,
        }
    }

    /// Accept with a single immediate reply and no pipeline messages.
    pub fn immediate(reply: ImmediateReply) -> Self {
        Self {
            accepted: true,
            messages: Vec::new(),
            immediate_responses: Some(vec![reply]),
        }
    }

    /// Accept with a single pipeline message.
    pub fn message(message: InboundMessage) -> Self {
        Self {
            accepted: true,
            messages: vec![message],
            immediate_responses: None,
        }
    }

    /// True when there is nothing to process asynchronously.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
            && self
                .immediate_responses
                .as_ref()
                .is_none_or(|r| r.is_empty())
    }
}
