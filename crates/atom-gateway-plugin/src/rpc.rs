//! RPC dispatch over registered handlers.
//!
//! The dispatcher is deliberately decoupled from the HTTP layer: it takes
//! the raw request body and returns a status code plus envelope, which
//! makes the validation rules directly testable.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::StatusCode;
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use crate::error::PluginError;

/// One RPC method implementation.
///
/// `params` is the optional `params` object of the request; handlers
/// return the `result` payload. Handlers may run concurrently; no
/// per-handler synchronization is provided.
#[async_trait]
pub trait RpcHandler: Send + Sync {
    async fn handle(&self, params: Option<Map<String, Value>>) -> Result<Value, PluginError>;
}

/// Named registry of [`RpcHandler`]s.
#[derive(Clone, Default)]
pub struct RpcRegistry {
    handlers: HashMap<String, Arc<dyn RpcHandler>>,
}

impl RpcRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under a method name. A later registration for
    /// the same name replaces the earlier one.
    pub fn register(&mut self, method: impl Into<String>, handler: Arc<dyn RpcHandler>) {
        self.handlers.insert(method.into(), handler);
    }

    /// Dispatch one raw request body.
    ///
    /// Returns the HTTP status and the response envelope:
    /// `{ok: true, result}` on success, `{ok: false, error}` otherwise.
    pub async fn dispatch(&self, body: &[u8]) -> (StatusCode, Value) {
        let parsed: Value = match serde_json::from_slice(body) {
            Ok(v) => v,
            Err(_) => {
                return bad_request("request body must be valid JSON");
            }
        };

        let Some(obj) = parsed.as_object() else {
            return bad_request("request body must be a JSON object");
        };

        let method = match obj.get("method") {
            Some(Value::String(m)) if !m.trim().is_empty() => m.trim().to_string(),
            _ => return bad_request("\"method\" must be a non-empty string"),
        };

        let params = match obj.get("params") {
            None | Some(Value::Null) => None,
            Some(Value::Object(p)) => Some(p.clone()),
            Some(_) => return bad_request("\"params\" must be an object"),
        };

        let Some(handler) = self.handlers.get(&method) else {
            debug!(method = %method, "rpc method not found");
            return (
                StatusCode::NOT_FOUND,
                json!({"ok": false, "error": format!("unknown method: {method}")}),
            );
        };

        match handler.handle(params).await {
            Ok(result) => (StatusCode::OK, json!({"ok": true, "result": result})),
            Err(e) => {
                warn!(method = %method, error = %e, "rpc handler failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({"ok": false, "error": e.to_string()}),
                )
            }
        }
    }
}

fn bad_request(message: &str) -> (StatusCode, Value) {
    (
        StatusCode::BAD_REQUEST,
        json!({"ok": false, "error": message}),
    )
}
