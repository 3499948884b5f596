//! Session state machine
//!
//! `SessionCore` owns the live handle, the timers and the reconnect counter of
//! one start cycle. Every transition goes through the methods below, called
//! with the session lock held.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use super::options::SessionOptions;
use super::state::{ConnectionStatus, SessionEvent, SessionPhase};
use crate::keepalive::Keepalive;
use crate::reconnect::ReconnectScheduler;
use crate::timer::{TimerFired, TimerKind, TimerSet};
use crate::transport::{Connector, EventSink, HandleEvent, SocketHandle, TransportEvent};

/// Publishes status changes and session events to collaborators
pub(crate) struct Notifier {
    pub(crate) status: watch::Sender<ConnectionStatus>,
    pub(crate) events: broadcast::Sender<SessionEvent>,
}

impl Notifier {
    pub(crate) fn new() -> Self {
        let (status, _) = watch::channel(ConnectionStatus::Closed);
        let (events, _) = broadcast::channel(256);
        Self { status, events }
    }

    pub(crate) fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    pub(crate) fn set_status(&self, status: ConnectionStatus) {
        let changed = self.status.send_if_modified(|current| {
            if *current == status {
                return false;
            }
            debug!("Session status: {} -> {}", current, status);
            *current = status;
            true
        });
        if changed {
            self.emit(SessionEvent::StatusChanged { status });
        }
    }

    pub(crate) fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }
}

pub(crate) struct SessionCore {
    cycle: u64,
    endpoint: String,
    options: SessionOptions,
    connector: Arc<dyn Connector>,
    phase: SessionPhase,
    generation: u64,
    handle: Option<Box<dyn SocketHandle>>,
    timers: TimerSet,
    reconnect: ReconnectScheduler,
    keepalive: Keepalive,
    transport_tx: mpsc::UnboundedSender<TransportEvent>,
    event_loop: Option<JoinHandle<()>>,
}

impl SessionCore {
    pub(crate) fn new(
        cycle: u64,
        endpoint: String,
        options: SessionOptions,
        connector: Arc<dyn Connector>,
    ) -> (
        Self,
        mpsc::UnboundedReceiver<TransportEvent>,
        mpsc::UnboundedReceiver<TimerFired>,
    ) {
        let (transport_tx, transport_rx) = mpsc::unbounded_channel();
        let (timers, timer_rx) = TimerSet::new();
        let core = Self {
            cycle,
            endpoint,
            options,
            connector,
            phase: SessionPhase::Idle,
            generation: 0,
            handle: None,
            timers,
            reconnect: ReconnectScheduler::new(options.reconnect),
            keepalive: Keepalive::new(options.keepalive),
            transport_tx,
            event_loop: None,
        };
        (core, transport_rx, timer_rx)
    }

    pub(crate) fn attach_event_loop(&mut self, task: JoinHandle<()>) {
        self.event_loop = Some(task);
    }

    /// Start cycle this core belongs to
    pub(crate) fn cycle(&self) -> u64 {
        self.cycle
    }

    pub(crate) fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub(crate) fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub(crate) fn attempt(&self) -> u32 {
        self.reconnect.attempt()
    }

    pub(crate) fn armed_timers(&self) -> usize {
        self.timers.armed_count()
    }

    /// First automatic connection of the cycle, honouring the initial delay
    pub(crate) fn begin(&mut self, notifier: &Notifier) {
        let delay = self.options.initial_delay;
        if delay.is_zero() {
            self.open_handle(notifier);
            return;
        }
        debug!("Delaying first connection by {:?}", delay);
        self.phase = SessionPhase::Delaying;
        self.timers.schedule(TimerKind::ConnectDelay, delay);
        notifier.set_status(ConnectionStatus::Connecting);
    }

    /// Connect immediately if no handle is live or pending
    pub(crate) fn connect_now(&mut self, notifier: &Notifier) -> bool {
        match self.phase {
            SessionPhase::Idle | SessionPhase::Delaying | SessionPhase::Backoff => {
                self.timers.cancel(TimerKind::ConnectDelay);
                self.timers.cancel(TimerKind::Reconnect);
                self.open_handle(notifier);
                true
            }
            SessionPhase::Connecting
            | SessionPhase::Open
            | SessionPhase::Closing
            | SessionPhase::Stopped => false,
        }
    }

    /// Apply one handle event, returning an inbound payload to deliver
    pub(crate) fn handle_transport(
        &mut self,
        event: TransportEvent,
        notifier: &Notifier,
    ) -> Option<String> {
        if event.generation != self.generation || self.phase == SessionPhase::Stopped {
            trace!(
                "Ignoring {:?} from stale handle #{} (current #{})",
                event.event, event.generation, self.generation
            );
            return None;
        }

        match event.event {
            HandleEvent::Open => {
                info!("Connected to {}", self.endpoint);
                self.reconnect.reset();
                self.phase = SessionPhase::Open;
                notifier.set_status(ConnectionStatus::Open);
                self.keepalive.start(&mut self.timers);
                None
            }
            HandleEvent::Message(payload) => Some(payload),
            HandleEvent::Error(message) => {
                warn!("Socket error on {}: {}", self.endpoint, message);
                let status = self
                    .reported_state()
                    .unwrap_or(ConnectionStatus::Connecting);
                self.apply_reported_status(status, notifier);
                None
            }
            HandleEvent::Close { code, reason } => {
                info!("Closed, code: {}, reason: {:?}", code, reason);
                self.keepalive.stop(&mut self.timers);
                let status = self
                    .reported_state()
                    .filter(|status| !status.is_open())
                    .unwrap_or(ConnectionStatus::Closed);
                notifier.set_status(status);
                // A closed handle gets no further say, even if it keeps talking
                self.handle = None;
                self.generation += 1;
                self.schedule_reconnect(notifier);
                None
            }
        }
    }

    /// Apply one timer firing
    pub(crate) fn handle_timer(&mut self, fired: TimerFired, notifier: &Notifier) {
        if self.phase == SessionPhase::Stopped || !self.timers.acknowledge(&fired) {
            trace!("Ignoring stale {:?} timer", fired.kind);
            return;
        }

        match fired.kind {
            TimerKind::Ping => {
                if !notifier.status().is_open() {
                    return;
                }
                if let Some(handle) = self.handle.as_deref() {
                    self.keepalive.probe(handle);
                }
            }
            TimerKind::Reconnect => {
                let attempt = self.reconnect.advance();
                info!("Reconnecting to {} (attempt {})", self.endpoint, attempt);
                self.open_handle(notifier);
            }
            TimerKind::ConnectDelay => self.open_handle(notifier),
        }
    }

    /// Serialize and write `payload` if the session is open
    pub(crate) fn send<T: Serialize + ?Sized>(&self, payload: &T, notifier: &Notifier) -> bool {
        if !notifier.status().is_open() {
            debug!("Dropping outbound payload: session is {}", notifier.status());
            return false;
        }
        let Some(handle) = self.handle.as_deref() else {
            return false;
        };
        let json = match serde_json::to_string(payload) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize message: {}", e);
                return false;
            }
        };
        debug!("Sending: {}", json);
        match handle.send_raw(json) {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to send message: {}", e);
                false
            }
        }
    }

    /// Tear the cycle down: no timer or handle event has any effect afterwards
    pub(crate) fn shutdown(&mut self, notifier: &Notifier) {
        self.phase = SessionPhase::Stopped;
        self.generation += 1;
        self.timers.cancel_all();
        if let Some(mut handle) = self.handle.take() {
            handle.close();
        }
        if let Some(task) = self.event_loop.take() {
            task.abort();
        }
        notifier.set_status(ConnectionStatus::Closed);
        notifier.emit(SessionEvent::Stopped);
    }

    fn open_handle(&mut self, notifier: &Notifier) {
        self.retire_handle();
        self.generation += 1;
        debug!("Connecting to {} (handle #{})", self.endpoint, self.generation);
        let sink = EventSink::new(self.generation, self.transport_tx.clone());
        self.handle = Some(self.connector.connect(&self.endpoint, sink));
        self.phase = SessionPhase::Connecting;
        notifier.set_status(ConnectionStatus::Connecting);
    }

    /// Close a still-installed handle; its late events become stale
    fn retire_handle(&mut self) {
        self.keepalive.stop(&mut self.timers);
        if let Some(mut handle) = self.handle.take() {
            self.generation += 1;
            debug!("Replacing live handle for {}", self.endpoint);
            handle.close();
        }
    }

    fn schedule_reconnect(&mut self, notifier: &Notifier) {
        let delay = self.reconnect.next_delay();
        let attempt = self.reconnect.attempt().saturating_add(1);
        info!("Reconnect attempt {} in {:?}", attempt, delay);
        self.phase = SessionPhase::Backoff;
        self.timers.schedule(TimerKind::Reconnect, delay);
        notifier.emit(SessionEvent::Reconnecting {
            attempt,
            delay_ms: u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
        });
    }

    fn reported_state(&self) -> Option<ConnectionStatus> {
        self.handle.as_ref().and_then(|handle| handle.ready_state())
    }

    fn apply_reported_status(&mut self, status: ConnectionStatus, notifier: &Notifier) {
        self.phase = match status {
            ConnectionStatus::Open => SessionPhase::Open,
            ConnectionStatus::Connecting => SessionPhase::Connecting,
            ConnectionStatus::Closing | ConnectionStatus::Closed => SessionPhase::Closing,
        };
        if !status.is_open() {
            self.keepalive.stop(&mut self.timers);
        }
        notifier.set_status(status);
    }
}
