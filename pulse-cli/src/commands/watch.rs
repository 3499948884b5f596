//! Watch the metrics feed through a self-healing session

use std::time::Duration;

use anyhow::Result;
use clap::Args;
use pulse_core::{MetricSample, MetricsWindow, SessionEvent, SessionManager};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use crate::config::ConfigLoader;

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Feed endpoint [default: from config]
    #[arg(long)]
    pub url: Option<String>,

    /// Wait for Enter before connecting
    #[arg(long)]
    pub no_auto_connect: bool,

    /// Delay before the first connection attempt, in milliseconds
    #[arg(long)]
    pub delay_ms: Option<u64>,

    /// Number of samples the rolling average covers
    #[arg(long, default_value_t = pulse_core::metrics::DEFAULT_WINDOW)]
    pub window: usize,
}

pub async fn run(args: WatchArgs) -> Result<()> {
    let section = ConfigLoader::load()?.session;
    let url = args.url.unwrap_or_else(|| section.url.clone());
    let mut options = section.options();
    if args.no_auto_connect {
        options.auto_connect = false;
    }
    if let Some(delay_ms) = args.delay_ms {
        options.initial_delay = Duration::from_millis(delay_ms);
    }

    let session = SessionManager::websocket();
    let mut window = MetricsWindow::new(args.window);
    session.on_json(move |sample: MetricSample| {
        window.push(sample);
        println!("{}", format_sample(&sample, &window));
        Ok(())
    });

    let mut events = session.subscribe();
    session.start(url.clone(), options);
    info!("Watching {}", url);
    if options.auto_connect {
        println!("Press Enter to reconnect immediately, Ctrl-C to quit");
    } else {
        println!("Press Enter to connect, Ctrl-C to quit");
    }

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = stdin.next_line(), if stdin_open => match line {
                Ok(Some(_)) => {
                    if !session.connect() {
                        println!("Already {}", session.status());
                    }
                }
                Ok(None) | Err(_) => stdin_open = false,
            },
            event = events.recv() => match event {
                Ok(event) => {
                    if let Some(line) = describe(&event) {
                        println!("{}", line);
                    }
                }
                Err(RecvError::Lagged(count)) => warn!("Missed {} session events", count),
                Err(RecvError::Closed) => break,
            },
        }
    }

    session.stop();
    Ok(())
}

/// One line per sample: the reading plus the rolling averages
fn format_sample(sample: &MetricSample, window: &MetricsWindow) -> String {
    format!(
        "t={:>6}s  cpu {:>5.1}%  mem {:>5.2} GB  | avg cpu {:>5.1}%  mem {:>5.2} GB over {}",
        sample.timestamp,
        sample.cpu,
        sample.memory,
        window.average_cpu().unwrap_or(sample.cpu),
        window.average_memory().unwrap_or(sample.memory),
        window.len(),
    )
}

fn describe(event: &SessionEvent) -> Option<String> {
    match event {
        SessionEvent::StatusChanged { status } => Some(format!("status: {}", status)),
        SessionEvent::Reconnecting { attempt, delay_ms } => Some(format!(
            "reconnecting in {} ms (attempt {})",
            delay_ms, attempt
        )),
        SessionEvent::ParseFailure { error } => Some(format!("unreadable payload: {}", error)),
        SessionEvent::HandlerFailed { .. } | SessionEvent::Stopped => None,
    }
}
