//! The per-plugin HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::body::Bytes;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{MethodRouter, get, post};
use serde_json::json;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use atom_gateway_types::config::ChannelEndpoint;

use crate::error::PluginError;
use crate::rpc::{RpcHandler, RpcRegistry};

/// Builder for a [`PluginServer`].
pub struct PluginServerBuilder {
    channel_id: String,
    endpoint: ChannelEndpoint,
    rpc: RpcRegistry,
    routes: Vec<(String, MethodRouter)>,
    capture_signals: bool,
    cancel: Option<CancellationToken>,
}

impl PluginServerBuilder {
    /// Use an externally created cancellation token as the server's
    /// shutdown signal. Channels share one token between their
    /// `channel.shutdown` RPC handler, signal handling, and the server.
    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Register an RPC method handler.
    pub fn rpc_method(mut self, method: impl Into<String>, handler: Arc<dyn RpcHandler>) -> Self {
        self.rpc.register(method, handler);
        self
    }

    /// Register an extension route (e.g. a platform webhook path).
    /// Extension routes are matched before the default 404 fallback.
    pub fn route(mut self, path: impl Into<String>, method_router: MethodRouter) -> Self {
        self.routes.push((path.into(), method_router));
        self
    }

    /// Whether the server installs its own SIGINT/SIGTERM handlers that
    /// trigger graceful shutdown. Channels that run their own
    /// shutdown sequence (e.g. webhook deregistration) disable this and
    /// install handlers themselves.
    pub fn capture_signals(mut self, capture: bool) -> Self {
        self.capture_signals = capture;
        self
    }

    /// Bind the listener and start serving.
    pub async fn start(self) -> Result<PluginServer, PluginError> {
        let cancel = self.cancel.unwrap_or_default();
        let started_at = Instant::now();

        let channel_id = self.channel_id.clone();
        let health = {
            let channel_id = channel_id.clone();
            get(move || async move {
                Json(json!({
                    "ok": true,
                    "data": {
                        "channelId": channel_id,
                        "status": "ok",
                        "uptimeMs": started_at.elapsed().as_millis() as u64,
                    }
                }))
            })
        };

        let rpc = Arc::new(self.rpc);
        let invoke = post(move |body: Bytes| async move {
            let (status, envelope) = rpc.dispatch(&body).await;
            (status, Json(envelope))
        });

        let mut app = Router::new()
            .route(&self.endpoint.health_path, health)
            .route(&self.endpoint.invoke_path, invoke);
        for (path, method_router) in self.routes {
            app = app.route(&path, method_router);
        }
        let app = app
            .fallback(not_found)
            .layer(TraceLayer::new_for_http());

        let bind_addr = format!("{}:{}", self.endpoint.host, self.endpoint.port);
        let listener = tokio::net::TcpListener::bind(&bind_addr)
            .await
            .map_err(|e| PluginError::Startup(format!("failed to bind {bind_addr}: {e}")))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| PluginError::Startup(format!("failed to read bound address: {e}")))?;

        info!(
            channel_id = %channel_id,
            addr = %local_addr,
            "plugin server listening"
        );

        let serve_cancel = cancel.clone();
        let serve_task = tokio::spawn(async move {
            let shutdown = serve_cancel.clone();
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await;
            if let Err(e) = result {
                warn!(error = %e, "plugin server exited with error");
            }
        });

        let signal_task = if self.capture_signals {
            Some(spawn_signal_listener(cancel.clone()))
        } else {
            None
        };

        Ok(PluginServer {
            channel_id,
            local_addr,
            cancel,
            serve_task: Mutex::new(Some(serve_task)),
            signal_task: Mutex::new(signal_task),
        })
    }
}

/// A running plugin HTTP server.
///
/// Handlers run concurrently on the tokio runtime; [`shutdown`] stops
/// accepting new connections and returns once in-flight handlers finish.
///
/// [`shutdown`]: PluginServer::shutdown
pub struct PluginServer {
    channel_id: String,
    local_addr: SocketAddr,
    cancel: CancellationToken,
    serve_task: Mutex<Option<JoinHandle<()>>>,
    signal_task: Mutex<Option<JoinHandle<()>>>,
}

impl PluginServer {
    /// Start building a server for a channel endpoint.
    pub fn builder(channel_id: impl Into<String>, endpoint: ChannelEndpoint) -> PluginServerBuilder {
        PluginServerBuilder {
            channel_id: channel_id.into(),
            endpoint,
            rpc: RpcRegistry::new(),
            routes: Vec::new(),
            capture_signals: true,
            cancel: None,
        }
    }

    /// The channel this server belongs to.
    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    /// The address the listener actually bound (useful with port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Token cancelled when shutdown is requested, by whichever path
    /// (signal, RPC, explicit [`shutdown`](PluginServer::shutdown)).
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait until shutdown has been requested.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }

    /// Stop accepting connections, wait for in-flight handlers, and
    /// release signal handlers. Idempotent.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        if let Some(handle) = self.serve_task.lock().await.take() {
            let _ = handle.await;
        }
        if let Some(handle) = self.signal_task.lock().await.take() {
            handle.abort();
        }
        debug!(channel_id = %self.channel_id, "plugin server stopped");
    }
}

/// Spawn a task that cancels `token` on SIGINT or SIGTERM.
pub fn spawn_signal_listener(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            let mut term = match signal(SignalKind::terminate()) {
                Ok(term) => term,
                Err(e) => {
                    warn!(error = %e, "failed to install SIGTERM handler");
                    return;
                }
            };
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("received SIGINT"),
                _ = term.recv() => info!("received SIGTERM"),
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
            info!("received ctrl-c");
        }
        token.cancel();
    })
}

async fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"ok": false, "error": "not found"})),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{Map, Value};

    fn test_endpoint() -> ChannelEndpoint {
        ChannelEndpoint {
            host: "127.0.0.1".into(),
            port: 0,
            health_path: "/healthz".into(),
            invoke_path: "/rpc".into(),
            startup_timeout_ms: 5000,
        }
    }

    struct Ping;

    #[async_trait]
    impl RpcHandler for Ping {
        async fn handle(&self, _params: Option<Map<String, Value>>) -> Result<Value, PluginError> {
            Ok(json!("pong"))
        }
    }

    async fn start_test_server() -> PluginServer {
        PluginServer::builder("test-channel", test_endpoint())
            .capture_signals(false)
            .rpc_method("ping", Arc::new(Ping))
            .route("/hook", post(|| async { "hooked" }))
            .start()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn health_route_reports_channel() {
        let server = start_test_server().await;
        let url = format!("http://{}/healthz", server.local_addr());

        let body: Value = reqwest::get(&url).await.unwrap().json().await.unwrap();
        assert_eq!(body["ok"], true);
        assert_eq!(body["data"]["channelId"], "test-channel");
        assert_eq!(body["data"]["status"], "ok");
        assert!(body["data"]["uptimeMs"].is_u64());

        server.shutdown().await;
    }

    #[tokio::test]
    async fn health_route_rejects_post() {
        let server = start_test_server().await;
        let url = format!("http://{}/healthz", server.local_addr());

        let resp = reqwest::Client::new().post(&url).send().await.unwrap();
        assert_eq!(resp.status(), 405);

        server.shutdown().await;
    }

    #[tokio::test]
    async fn rpc_route_dispatches() {
        let server = start_test_server().await;
        let url = format!("http://{}/rpc", server.local_addr());

        let resp = reqwest::Client::new()
            .post(&url)
            .json(&json!({"method": "ping"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["ok"], true);
        assert_eq!(body["result"], "pong");

        server.shutdown().await;
    }

    #[tokio::test]
    async fn rpc_unknown_method_is_404() {
        let server = start_test_server().await;
        let url = format!("http://{}/rpc", server.local_addr());

        let resp = reqwest::Client::new()
            .post(&url)
            .json(&json!({"method": "nope"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);

        server.shutdown().await;
    }

    #[tokio::test]
    async fn extension_route_is_served() {
        let server = start_test_server().await;
        let url = format!("http://{}/hook", server.local_addr());

        let resp = reqwest::Client::new().post(&url).send().await.unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.text().await.unwrap(), "hooked");

        server.shutdown().await;
    }

    #[tokio::test]
    async fn unmatched_path_is_envelope_404() {
        let server = start_test_server().await;
        let url = format!("http://{}/no/such/path", server.local_addr());

        let resp = reqwest::get(&url).await.unwrap();
        assert_eq!(resp.status(), 404);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["ok"], false);

        server.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_stops_accepting() {
        let server = start_test_server().await;
        let addr = server.local_addr();
        server.shutdown().await;

        let result = reqwest::Client::new()
            .get(format!("http://{addr}/healthz"))
            .send()
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn shutdown_is_idempotent() {
        let server = start_test_server().await;
        server.shutdown().await;
        server.shutdown().await;
    }

    #[tokio::test]
    async fn rpc_shutdown_handler_can_cancel_server() {
        let server = start_test_server().await;
        let token = server.cancel_token();
        token.cancel();
        // cancelled() resolves and shutdown still completes cleanly.
        server.cancelled().await;
        server.shutdown().await;
    }
}
