//! Send one chat payload through a session

use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Args;
use pulse_core::SessionManager;
use serde_json::json;
use tracing::info;

use crate::config::ConfigLoader;

#[derive(Debug, Args)]
pub struct SendArgs {
    /// Feed endpoint [default: from config]
    #[arg(long)]
    pub url: Option<String>,

    /// Chat text to send
    #[arg(long, default_value = "Ping!")]
    pub text: String,

    /// Seconds to wait for the connection to open
    #[arg(long, default_value_t = 5)]
    pub timeout_secs: u64,
}

pub async fn run(args: SendArgs) -> Result<()> {
    let section = ConfigLoader::load()?.session;
    let url = args.url.unwrap_or_else(|| section.url.clone());
    let mut options = section.options();
    options.auto_connect = true;

    let session = SessionManager::websocket();
    let mut status = session.subscribe_status();
    session.start(url.clone(), options);

    let opened = tokio::time::timeout(
        Duration::from_secs(args.timeout_secs),
        status.wait_for(|status| status.is_open()),
    )
    .await
    .map(|waited| waited.is_ok());
    let result = match opened {
        Ok(true) => deliver(&session, &args.text),
        Ok(false) => Err(anyhow::anyhow!("Session ended before opening")),
        Err(_) => Err(anyhow::anyhow!(
            "Could not connect to {} within {}s",
            url,
            args.timeout_secs
        )),
    };

    session.stop();
    result.with_context(|| format!("Failed to send to {}", url))
}

fn deliver(session: &SessionManager, text: &str) -> Result<()> {
    let payload = json!({ "text": text });
    if !session.send(&payload) {
        bail!("Session is {}", session.status());
    }
    info!("Sent {}", payload);
    println!("Sent: {}", payload);
    Ok(())
}
