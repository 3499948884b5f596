//! pulse-server - metrics feed server
//!
//! Accepts WebSocket clients on `/ws` and broadcasts one simulated
//! [`MetricSample`](pulse_core::MetricSample) per interval to every connected
//! client. Clients may send anything, including the `"ping"` keep-alive probe.

mod error;
pub mod generator;
pub mod http;
mod state;
pub mod ws;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval_at};

pub use error::ServerError;
pub use generator::MetricsGenerator;
pub use http::{HealthResponse, create_router, cors_layer};
pub use state::FeedState;

/// Default port the feed listens on
pub const DEFAULT_PORT: u16 = 8000;

/// The metrics feed server
pub struct FeedServer {
    config: ServerConfig,
    state: Arc<FeedState>,
}

impl FeedServer {
    /// Create a new server with default state
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            state: Arc::new(FeedState::new()),
        }
    }

    /// Create a server with custom state (for testing)
    pub fn with_state(config: ServerConfig, state: Arc<FeedState>) -> Self {
        Self { config, state }
    }

    /// Get the server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Get the shared state
    pub fn state(&self) -> Arc<FeedState> {
        Arc::clone(&self.state)
    }

    /// Run the server, binding to the configured address
    pub async fn run(self) -> Result<(), ServerError> {
        let listener = self.bind().await?;
        self.run_with_listener(listener).await
    }

    /// Run the server on an already bound listener
    pub async fn run_with_listener(self, listener: TcpListener) -> Result<(), ServerError> {
        self.run_with_shutdown(listener, std::future::pending()).await
    }

    /// Run the server until `shutdown` resolves, then close every client
    pub async fn run_with_shutdown<F>(
        self,
        listener: TcpListener,
        shutdown: F,
    ) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let router = create_router(Arc::clone(&self.state))
            .layer(cors_layer(&self.config.allowed_origin)?);

        if let Ok(addr) = listener.local_addr() {
            tracing::info!("pulse feed listening on {}", addr);
        }

        let feed = self.start_feed();
        let state = Arc::clone(&self.state);
        let result = axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown.await;
                tracing::info!("Shutting down feed server");
                state.close_clients();
            })
            .await
            .map_err(|e| ServerError::Internal(e.to_string()));
        feed.abort();
        result
    }

    /// Bind the configured address
    pub async fn bind(&self) -> Result<TcpListener, ServerError> {
        let addr = self.config.addr();
        TcpListener::bind(&addr)
            .await
            .map_err(|e| ServerError::Bind { addr, source: e })
    }

    /// Start the background task publishing one sample per interval
    fn start_feed(&self) -> JoinHandle<()> {
        let state = Arc::clone(&self.state);
        let period = self.config.interval;
        let mut generator = match self.config.seed {
            Some(seed) => MetricsGenerator::with_seed(seed),
            None => MetricsGenerator::new(),
        };

        tokio::spawn(async move {
            let mut ticker = interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let sample = generator.next_sample();
                let count = state.publish(&sample);
                tracing::trace!("Broadcast sample to {} clients", count);
            }
        })
    }
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Time between broadcast samples
    pub interval: Duration,
    /// Browser origin admitted by CORS
    pub allowed_origin: String,
    /// Seed for the sample generator
    pub seed: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            interval: Duration::from_secs(1),
            allowed_origin: "http://localhost:3000".to_string(),
            seed: None,
        }
    }
}

impl ServerConfig {
    /// Create a new ServerConfig with the specified host and port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Returns the socket address string (e.g., "127.0.0.1:8000")
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
