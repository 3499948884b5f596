//! Shared helpers for pulse-core session tests
//!
//! Note: Some helpers may appear unused because each test file compiles
//! this module separately.

use std::time::Duration;

use pulse_core::{ConnectionStatus, MockConnector, SessionEvent, SessionManager};
use tokio::sync::broadcast;

pub const ENDPOINT: &str = "ws://127.0.0.1:8000/ws";

/// Session backed by a scripted connector
#[allow(dead_code)]
pub fn mock_session() -> (SessionManager, MockConnector) {
    let connector = MockConnector::new();
    let session = SessionManager::new(connector.clone());
    (session, connector)
}

/// Session whose handles keep delivering events after close
#[allow(dead_code)]
pub fn leaky_session() -> (SessionManager, MockConnector) {
    let connector = MockConnector::leaky();
    let session = SessionManager::new(connector.clone());
    (session, connector)
}

/// Let the session event loop drain its queues without moving the clock
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

/// Move the paused clock forward by `ms` and let the session react
#[allow(dead_code)]
pub async fn advance(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    settle().await;
}

/// Collect every event received so far
#[allow(dead_code)]
pub fn drain(rx: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[allow(dead_code)]
pub fn statuses(events: &[SessionEvent]) -> Vec<ConnectionStatus> {
    events
        .iter()
        .filter_map(|event| match event {
            SessionEvent::StatusChanged { status } => Some(*status),
            _ => None,
        })
        .collect()
}

#[allow(dead_code)]
pub fn reconnect_delays(events: &[SessionEvent]) -> Vec<u64> {
    events
        .iter()
        .filter_map(|event| match event {
            SessionEvent::Reconnecting { delay_ms, .. } => Some(*delay_ms),
            _ => None,
        })
        .collect()
}
