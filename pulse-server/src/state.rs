//! Shared state for the feed server

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use pulse_core::MetricSample;
use tokio::sync::{RwLock, broadcast, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Capacity of the sample hub; slower clients skip ahead
const HUB_CAPACITY: usize = 64;

/// Shared state accessible by all handlers
pub struct FeedState {
    /// Connected clients and when they connected
    clients: RwLock<HashMap<Uuid, DateTime<Utc>>>,
    /// Outgoing samples, already encoded as JSON text
    hub: broadcast::Sender<String>,
    /// Flipped once when the server shuts down
    closing: watch::Sender<bool>,
    /// When the server started
    pub started_at: DateTime<Utc>,
}

impl FeedState {
    pub fn new() -> Self {
        let (hub, _) = broadcast::channel(HUB_CAPACITY);
        let (closing, _) = watch::channel(false);
        Self {
            clients: RwLock::new(HashMap::new()),
            hub,
            closing,
            started_at: Utc::now(),
        }
    }

    /// Record a new client connection, returning its id
    pub async fn register_client(&self) -> Uuid {
        let id = Uuid::new_v4();
        self.clients.write().await.insert(id, Utc::now());
        info!("New connection: {}", id);
        id
    }

    pub async fn unregister_client(&self, id: Uuid) {
        if self.clients.write().await.remove(&id).is_some() {
            info!("Disconnected: {}", id);
        }
    }

    pub async fn client_count(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Receiver for every sample published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.hub.subscribe()
    }

    /// Publish one sample to all connected clients.
    ///
    /// Returns the number of clients it was queued for.
    pub fn publish(&self, sample: &MetricSample) -> usize {
        let json = match serde_json::to_string(sample) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to encode sample: {}", e);
                return 0;
            }
        };
        debug!("Broadcast: {}", json);
        self.hub.send(json).unwrap_or(0)
    }

    /// Receiver that observes server shutdown
    pub fn closing(&self) -> watch::Receiver<bool> {
        self.closing.subscribe()
    }

    /// Ask every connection handler to close its client
    pub fn close_clients(&self) {
        self.closing.send_replace(true);
    }

    /// Returns how long the server has been running
    pub fn uptime_seconds(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }
}

impl Default for FeedState {
    fn default() -> Self {
        Self::new()
    }
}
