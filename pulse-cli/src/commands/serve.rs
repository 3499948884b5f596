//! Run the metrics feed server in the foreground

use anyhow::{Context, Result};
use clap::Args;
use pulse_server::FeedServer;
use tracing::info;

use crate::config::ConfigLoader;

/// Arguments for the serve command
#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Host to bind to [default: from config, else 127.0.0.1]
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on [default: from config, else 8000]
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Milliseconds between samples [default: from config, else 1000]
    #[arg(long)]
    pub interval_ms: Option<u64>,
}

/// Run the serve command until Ctrl-C
pub async fn run(args: ServeArgs) -> Result<()> {
    let mut section = ConfigLoader::load()?.server;
    if let Some(host) = args.host {
        section.host = host;
    }
    if let Some(port) = args.port {
        section.port = port;
    }
    if let Some(interval_ms) = args.interval_ms {
        section.interval_ms = interval_ms;
    }

    let server = FeedServer::new(section.to_server_config());
    let listener = server.bind().await?;
    info!(
        "Starting pulse feed on {} (one sample every {} ms)",
        server.config().addr(),
        section.interval_ms
    );

    server
        .run_with_shutdown(listener, async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("Feed server failed")
}
