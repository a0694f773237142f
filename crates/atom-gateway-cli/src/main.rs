//! `atom-gateway` -- host binary embedding the gateway manager.
//!
//! Starts the selected channel plugins, prints the supervision status,
//! and keeps them running until SIGINT/SIGTERM triggers the stop
//! sequence.
//!
//! ```text
//! atom-gateway --server-url http://127.0.0.1:4000 --message-gateway all
//! atom-gateway --server-url http://127.0.0.1:4000 --message-gateway 'tg-main,!hooks' \
//!     --workspace /srv/atom --config alt_gateway.json
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use atom_gateway_manager::{ChannelSelector, GatewayManager};

/// atom message gateway host.
#[derive(Parser)]
#[command(name = "atom-gateway", about = "atom message gateway host", version)]
struct Cli {
    /// Channel selector: `all`, or a CSV of channel ids with optional
    /// `!id` exclusions. Without this flag no channel starts.
    #[arg(long, value_name = "SELECTOR")]
    message_gateway: Option<String>,

    /// Workspace directory holding the gateway config and logs.
    #[arg(long, value_name = "PATH", default_value = ".")]
    workspace: PathBuf,

    /// Base URL of the task runtime (absolute URL).
    #[arg(long, value_name = "URL")]
    server_url: String,

    /// Config file path, relative to the workspace unless absolute.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Enable verbose (debug-level) logging.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    reqwest::Url::parse(&cli.server_url)
        .with_context(|| format!("--server-url is not a valid absolute URL: {}", cli.server_url))?;

    let Some(selector_raw) = cli.message_gateway.as_deref() else {
        info!("no --message-gateway selector given, no channels start");
        return Ok(());
    };
    let selector = ChannelSelector::parse(selector_raw)?;

    let mut manager = GatewayManager::create(&cli.workspace, cli.config.as_deref())
        .context("failed to load gateway config")?;
    manager.set_server_url(cli.server_url.clone());

    manager.start(&selector).await?;
    let status = manager.status().await;
    println!("{}", serde_json::to_string_pretty(&status)?);

    wait_for_shutdown_signal().await;
    manager.stop().await;
    Ok(())
}

/// Block until SIGINT or SIGTERM.
async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut term = match signal(SignalKind::terminate()) {
            Ok(term) => term,
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("received SIGINT, stopping"),
            _ = term.recv() => info!("received SIGTERM, stopping"),
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("received ctrl-c, stopping");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_flag_set() {
        let cli = Cli::parse_from([
            "atom-gateway",
            "--server-url",
            "http://127.0.0.1:4000",
            "--message-gateway",
            "tg-main,!hooks",
            "--workspace",
            "/srv/atom",
            "--config",
            "alt.json",
            "--verbose",
        ]);
        assert_eq!(cli.server_url, "http://127.0.0.1:4000");
        assert_eq!(cli.message_gateway.as_deref(), Some("tg-main,!hooks"));
        assert_eq!(cli.workspace, PathBuf::from("/srv/atom"));
        assert_eq!(cli.config, Some(PathBuf::from("alt.json")));
        assert!(cli.verbose);
    }

    #[test]
    fn selector_is_optional() {
        let cli = Cli::parse_from(["atom-gateway", "--server-url", "http://x"]);
        assert!(cli.message_gateway.is_none());
        assert_eq!(cli.workspace, PathBuf::from("."));
    }

    #[test]
    fn server_url_is_required() {
        assert!(Cli::try_parse_from(["atom-gateway"]).is_err());
    }
}
