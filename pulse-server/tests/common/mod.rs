//! Shared test utilities for pulse-server integration tests

pub mod client;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use pulse_server::{FeedServer, FeedState, ServerConfig};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// Sample interval used by the integration tests
pub const TEST_INTERVAL: Duration = Duration::from_millis(50);

/// A feed server running in the background
#[allow(dead_code)]
pub struct TestServer {
    pub state: Arc<FeedState>,
    pub addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Start a server on an ephemeral port
    #[allow(dead_code)]
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        Self::start_on(listener).await
    }

    /// Start a server on a specific address (used to restart on the same port)
    #[allow(dead_code)]
    pub async fn start_at(addr: SocketAddr) -> Self {
        let listener = TcpListener::bind(addr).await.unwrap();
        Self::start_on(listener).await
    }

    async fn start_on(listener: TcpListener) -> Self {
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(FeedState::new());
        let config = ServerConfig::new("127.0.0.1", addr.port()).with_interval(TEST_INTERVAL);
        let server = FeedServer::with_state(config, Arc::clone(&state));
        let (shutdown, signal) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let _ = server
                .run_with_shutdown(listener, async move {
                    let _ = signal.await;
                })
                .await;
        });

        // Brief delay to ensure server is accepting connections
        tokio::time::sleep(Duration::from_millis(10)).await;

        Self {
            state,
            addr,
            shutdown: Some(shutdown),
            task,
        }
    }

    #[allow(dead_code)]
    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    /// Close every client and wait for the server to exit
    #[allow(dead_code)]
    pub async fn shutdown(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        let _ = tokio::time::timeout(Duration::from_secs(5), &mut self.task).await;
    }
}

/// Poll until the server tracks `expected` clients or a couple of seconds pass
#[allow(dead_code)]
pub async fn wait_for_clients(state: &FeedState, expected: usize) -> bool {
    for _ in 0..200 {
        if state.client_count().await == expected {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
