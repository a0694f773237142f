//! HTTP channel plugin executable.
//!
//! Spawned by the gateway manager with the `ATOM_MESSAGE_GATEWAY_*`
//! environment variables set. Exits 0 on graceful shutdown, non-zero on
//! initialization failure.

use tracing::error;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    if let Err(e) = atom_gateway_channels::http::run().await {
        error!(error = %e, "http channel failed");
        std::process::exit(1);
    }
}
