//! Session lifecycle tests driven by the scripted connector
//!
//! Time is paused, so every delay below is exact.

mod common;

use std::time::Duration;

use common::{ENDPOINT, advance, drain, leaky_session, mock_session, settle, statuses};
use pulse_core::{ConnectionStatus, SessionEvent, SessionOptions, SessionPhase};
use serde_json::json;

#[tokio::test(start_paused = true)]
async fn open_reports_connecting_then_open_and_pings_after_one_second() {
    let (session, connector) = mock_session();
    let mut events = session.subscribe();

    assert!(session.start(ENDPOINT, SessionOptions::default()));
    assert_eq!(session.status(), ConnectionStatus::Connecting);
    assert_eq!(connector.connection_count(), 1);
    assert_eq!(connector.endpoint(0).as_deref(), Some(ENDPOINT));

    connector.open(0);
    settle().await;
    assert_eq!(session.status(), ConnectionStatus::Open);
    assert_eq!(
        statuses(&drain(&mut events)),
        vec![ConnectionStatus::Connecting, ConnectionStatus::Open]
    );

    advance(999).await;
    assert!(connector.sent(0).is_empty());

    advance(2).await;
    assert_eq!(connector.sent(0), vec!["ping".to_string()]);

    advance(1000).await;
    assert_eq!(connector.sent(0).len(), 2);

    session.stop();
}

#[tokio::test(start_paused = true)]
async fn status_is_closed_before_start() {
    let (session, _connector) = mock_session();
    assert_eq!(session.status(), ConnectionStatus::Closed);
    assert!(!session.is_started());
    assert_eq!(session.phase(), None);
    assert_eq!(session.endpoint(), None);
}

#[tokio::test(start_paused = true)]
async fn start_is_idempotent() {
    let (session, connector) = mock_session();

    assert!(session.start(ENDPOINT, SessionOptions::default()));
    assert!(!session.start("ws://elsewhere/ws", SessionOptions::default()));

    assert_eq!(connector.connection_count(), 1);
    assert_eq!(session.endpoint().as_deref(), Some(ENDPOINT));
    session.stop();
}

#[tokio::test(start_paused = true)]
async fn manual_session_waits_for_connect() {
    let (session, connector) = mock_session();

    assert!(session.start(ENDPOINT, SessionOptions::manual()));
    advance(10_000).await;
    assert_eq!(connector.connection_count(), 0);
    assert_eq!(session.phase(), Some(SessionPhase::Idle));
    assert_eq!(session.status(), ConnectionStatus::Closed);

    assert!(session.connect());
    assert_eq!(connector.connection_count(), 1);
    assert_eq!(session.status(), ConnectionStatus::Connecting);

    // Already connecting
    assert!(!session.connect());
    assert_eq!(connector.connection_count(), 1);
    session.stop();
}

#[tokio::test(start_paused = true)]
async fn connect_without_start_does_nothing() {
    let (session, connector) = mock_session();
    assert!(!session.connect());
    assert_eq!(connector.connection_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn initial_delay_applies_only_to_first_attempt() {
    let (session, connector) = mock_session();
    let options = SessionOptions::default().with_initial_delay(Duration::from_millis(500));

    session.start(ENDPOINT, options);
    assert_eq!(connector.connection_count(), 0);
    assert_eq!(session.phase(), Some(SessionPhase::Delaying));
    assert_eq!(session.status(), ConnectionStatus::Connecting);

    advance(499).await;
    assert_eq!(connector.connection_count(), 0);
    advance(2).await;
    assert_eq!(connector.connection_count(), 1);

    connector.drop_connection(0);
    settle().await;

    // Reconnect uses the backoff schedule, not the initial delay
    advance(999).await;
    assert_eq!(connector.connection_count(), 1);
    advance(2).await;
    assert_eq!(connector.connection_count(), 2);
    session.stop();
}

#[tokio::test(start_paused = true)]
async fn connect_skips_initial_delay() {
    let (session, connector) = mock_session();
    let options = SessionOptions::default().with_initial_delay(Duration::from_secs(5));

    session.start(ENDPOINT, options);
    assert!(session.connect());
    assert_eq!(connector.connection_count(), 1);
    assert_eq!(session.armed_timers(), 0);

    advance(10_000).await;
    assert_eq!(connector.connection_count(), 1);
    session.stop();
}

#[tokio::test(start_paused = true)]
async fn stop_is_idempotent_and_releases_everything() {
    let (session, connector) = mock_session();

    // Before any start
    session.stop();
    session.stop();

    session.start(ENDPOINT, SessionOptions::default());
    connector.open(0);
    settle().await;
    assert_eq!(session.armed_timers(), 1);

    session.stop();
    session.stop();

    assert_eq!(session.armed_timers(), 0);
    assert_eq!(connector.live_connections(), 0);
    assert!(connector.closed_by_client(0));
    assert_eq!(session.status(), ConnectionStatus::Closed);
    assert!(!session.is_started());

    advance(60_000).await;
    assert_eq!(connector.connection_count(), 1);
    assert!(connector.sent(0).is_empty());
}

#[tokio::test(start_paused = true)]
async fn stop_during_initial_delay_prevents_connection() {
    let (session, connector) = mock_session();
    let options = SessionOptions::default().with_initial_delay(Duration::from_millis(500));

    session.start(ENDPOINT, options);
    session.stop();

    advance(5_000).await;
    assert_eq!(connector.connection_count(), 0);
    assert_eq!(session.status(), ConnectionStatus::Closed);
}

#[tokio::test(start_paused = true)]
async fn client_close_does_not_schedule_reconnect() {
    let (session, connector) = mock_session();
    let mut events = session.subscribe();

    session.start(ENDPOINT, SessionOptions::default());
    connector.open(0);
    settle().await;
    session.stop();
    settle().await;

    let events = drain(&mut events);
    assert!(events.contains(&SessionEvent::Stopped));
    assert!(
        !events
            .iter()
            .any(|event| matches!(event, SessionEvent::Reconnecting { .. }))
    );

    advance(60_000).await;
    assert_eq!(connector.connection_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn stop_cancels_pending_reconnect() {
    let (session, connector) = mock_session();

    session.start(ENDPOINT, SessionOptions::default());
    connector.open(0);
    settle().await;
    connector.drop_connection(0);
    settle().await;

    assert_eq!(session.phase(), Some(SessionPhase::Backoff));
    assert_eq!(session.armed_timers(), 1);

    session.stop();
    assert_eq!(session.armed_timers(), 0);

    advance(60_000).await;
    assert_eq!(connector.connection_count(), 1);
    assert_eq!(session.status(), ConnectionStatus::Closed);
}

#[tokio::test(start_paused = true)]
async fn restart_after_stop_uses_new_endpoint() {
    let (session, connector) = mock_session();

    session.start(ENDPOINT, SessionOptions::default());
    session.stop();

    assert!(session.start("ws://other:9000/ws", SessionOptions::default()));
    assert_eq!(connector.connection_count(), 2);
    assert_eq!(connector.endpoint(1).as_deref(), Some("ws://other:9000/ws"));

    connector.open(1);
    settle().await;
    assert_eq!(session.status(), ConnectionStatus::Open);
    session.stop();
}

#[tokio::test(start_paused = true)]
async fn close_queued_before_restart_does_not_touch_new_session() {
    let (session, connector) = mock_session();
    let mut events = session.subscribe();

    let restarter = session.clone();
    session.on_message(move |raw| {
        if raw == "restart" {
            restarter.stop();
            restarter.start(ENDPOINT, SessionOptions::default());
        }
        Ok(())
    });
    session.start(ENDPOINT, SessionOptions::default());
    connector.open(0);
    settle().await;
    drain(&mut events);

    // Both events sit in the first cycle's queue when the handler restarts
    connector.deliver(0, "restart");
    connector.drop_connection(0);
    settle().await;

    assert_eq!(connector.connection_count(), 2);
    assert!(!connector.closed_by_client(1));
    assert_eq!(connector.live_connections(), 1);
    assert_eq!(session.phase(), Some(SessionPhase::Connecting));
    assert_eq!(session.status(), ConnectionStatus::Connecting);
    assert!(
        !drain(&mut events)
            .iter()
            .any(|event| matches!(event, SessionEvent::Reconnecting { .. }))
    );

    connector.open(1);
    settle().await;
    assert_eq!(session.status(), ConnectionStatus::Open);
    assert_eq!(connector.connection_count(), 2);
    session.stop();
}

#[tokio::test(start_paused = true)]
async fn send_is_silent_noop_unless_open() {
    let (session, connector) = mock_session();
    let message = json!({"text": "Ping!"});

    assert!(!session.send(&message));

    session.start(ENDPOINT, SessionOptions::default());
    assert!(!session.send(&message));
    assert!(connector.sent(0).is_empty());

    connector.open(0);
    settle().await;
    assert!(session.send(&message));
    assert_eq!(connector.sent(0), vec![r#"{"text":"Ping!"}"#.to_string()]);

    session.stop();
    assert!(!session.send(&message));
    assert_eq!(connector.sent(0).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_write_reports_false_and_keeps_session_open() {
    let (session, connector) = mock_session();

    session.start(ENDPOINT, SessionOptions::default());
    connector.open(0);
    settle().await;
    connector.fail_sends(0, true);

    assert!(!session.send(&json!({"text": "lost"})));

    // Failed pings are ignored too
    advance(3_500).await;
    assert_eq!(session.status(), ConnectionStatus::Open);
    assert_eq!(session.phase(), Some(SessionPhase::Open));
    assert!(connector.sent(0).is_empty());
    session.stop();
}

#[tokio::test(start_paused = true)]
async fn error_event_reports_handle_state_and_stops_pinging() {
    let (session, connector) = mock_session();
    let mut events = session.subscribe();

    session.start(ENDPOINT, SessionOptions::default());
    connector.open(0);
    settle().await;

    connector.fail(0, "connection reset", ConnectionStatus::Closing);
    settle().await;
    assert_eq!(session.status(), ConnectionStatus::Closing);

    advance(2_500).await;
    assert!(connector.sent(0).is_empty());
    assert_eq!(connector.connection_count(), 1);

    connector.drop_connection(0);
    settle().await;
    assert_eq!(session.status(), ConnectionStatus::Closed);
    assert_eq!(
        statuses(&drain(&mut events)),
        vec![
            ConnectionStatus::Connecting,
            ConnectionStatus::Open,
            ConnectionStatus::Closing,
            ConnectionStatus::Closed,
        ]
    );
    session.stop();
}

#[tokio::test(start_paused = true)]
async fn error_before_open_keeps_connecting() {
    let (session, connector) = mock_session();

    session.start(ENDPOINT, SessionOptions::default());
    connector.fail(0, "handshake failed", ConnectionStatus::Connecting);
    settle().await;

    assert_eq!(session.status(), ConnectionStatus::Connecting);
    assert_eq!(session.armed_timers(), 0);
    session.stop();
}

#[tokio::test(start_paused = true)]
async fn connect_during_backoff_reconnects_immediately() {
    let (session, connector) = mock_session();

    session.start(ENDPOINT, SessionOptions::default());
    connector.drop_connection(0);
    settle().await;
    assert_eq!(session.phase(), Some(SessionPhase::Backoff));

    assert!(session.connect());
    assert_eq!(connector.connection_count(), 2);
    assert_eq!(session.armed_timers(), 0);

    advance(5_000).await;
    assert_eq!(connector.connection_count(), 2);
    session.stop();
}

#[tokio::test(start_paused = true)]
async fn stale_handle_events_never_change_status() {
    let (session, connector) = leaky_session();
    let mut events = session.subscribe();

    session.start(ENDPOINT, SessionOptions::default());
    connector.open(0);
    settle().await;
    connector.drop_connection(0);
    settle().await;
    advance(1_001).await;
    assert_eq!(connector.connection_count(), 2);

    connector.open(1);
    settle().await;
    drain(&mut events);

    // The first handle keeps talking after it was superseded
    connector.open(0);
    connector.fail(0, "late error", ConnectionStatus::Closing);
    connector.drop_connection(0);
    settle().await;

    assert_eq!(session.status(), ConnectionStatus::Open);
    assert_eq!(session.phase(), Some(SessionPhase::Open));
    assert!(drain(&mut events).is_empty());

    advance(60_000).await;
    assert_eq!(connector.connection_count(), 2);
    session.stop();
}

#[tokio::test(start_paused = true)]
async fn repeated_close_from_same_handle_schedules_once() {
    let (session, connector) = mock_session();
    let mut events = session.subscribe();

    session.start(ENDPOINT, SessionOptions::default());
    connector.drop_connection(0);
    connector.drop_connection(0);
    settle().await;

    let reconnects = drain(&mut events)
        .into_iter()
        .filter(|event| matches!(event, SessionEvent::Reconnecting { .. }))
        .count();
    assert_eq!(reconnects, 1);
    session.stop();
}

#[tokio::test(start_paused = true)]
async fn events_after_stop_are_ignored() {
    let (session, connector) = leaky_session();

    session.start(ENDPOINT, SessionOptions::default());
    connector.open(0);
    settle().await;
    session.stop();

    connector.open(0);
    connector.drop_connection(0);
    settle().await;

    assert_eq!(session.status(), ConnectionStatus::Closed);
    advance(60_000).await;
    assert_eq!(connector.connection_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn status_watch_follows_transitions() {
    let (session, connector) = mock_session();
    let mut status = session.subscribe_status();

    session.start(ENDPOINT, SessionOptions::default());
    assert!(status.has_changed().unwrap());
    assert_eq!(*status.borrow_and_update(), ConnectionStatus::Connecting);

    connector.open(0);
    settle().await;
    assert_eq!(*status.borrow_and_update(), ConnectionStatus::Open);

    session.stop();
    assert_eq!(*status.borrow_and_update(), ConnectionStatus::Closed);
}

#[tokio::test(start_paused = true)]
async fn clones_share_one_session() {
    let (session, connector) = mock_session();
    let other = session.clone();

    session.start(ENDPOINT, SessionOptions::default());
    connector.open(0);
    settle().await;

    assert_eq!(other.status(), ConnectionStatus::Open);
    other.stop();
    assert!(!session.is_started());
}
