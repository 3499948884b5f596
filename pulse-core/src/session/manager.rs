//! Connection session manager
//!
//! [`SessionManager`] is the facade collaborators hold. It owns at most one
//! running session core and one event-loop task per start cycle; the loop
//! is the single consumer of handle events and timer firings.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, error, info, trace, warn};

use super::machine::{Notifier, SessionCore};
use super::options::SessionOptions;
use super::state::{ConnectionStatus, SessionEvent, SessionPhase};
use crate::error::{HandlerError, PayloadError};
use crate::timer::TimerFired;
use crate::transport::{Connector, TransportEvent, WsConnector};

/// Callback invoked once per inbound payload
pub type InboundHandler = Box<dyn FnMut(&str) -> Result<(), HandlerError> + Send>;

/// Manages one logical persistent connection across reconnects.
///
/// Cloning yields another handle to the same session.
///
/// # Example
///
/// ```no_run
/// use pulse_core::{MetricSample, SessionManager, SessionOptions};
///
/// # async fn example() {
/// let session = SessionManager::websocket();
/// session.on_json(|sample: MetricSample| {
///     println!("cpu {:.1}%", sample.cpu);
///     Ok(())
/// });
/// session.start("ws://localhost:8000/ws", SessionOptions::default());
/// // ...
/// session.stop();
/// # }
/// ```
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

struct Inner {
    connector: Arc<dyn Connector>,
    /// Id of the current start cycle; bumped by every start and stop
    cycle: AtomicU64,
    core: Mutex<Option<SessionCore>>,
    handler: Mutex<Option<InboundHandler>>,
    notifier: Notifier,
}

enum LoopInput {
    Transport(TransportEvent),
    Timer(TimerFired),
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    /// Create a manager that opens connections through `connector`
    pub fn new(connector: impl Connector) -> Self {
        Self::with_connector(Arc::new(connector))
    }

    pub fn with_connector(connector: Arc<dyn Connector>) -> Self {
        Self {
            inner: Arc::new(Inner {
                connector,
                cycle: AtomicU64::new(0),
                core: Mutex::new(None),
                handler: Mutex::new(None),
                notifier: Notifier::new(),
            }),
        }
    }

    /// Create a manager that opens real WebSocket connections
    pub fn websocket() -> Self {
        Self::new(WsConnector::new())
    }

    /// Start a session for `endpoint`.
    ///
    /// Returns false without doing anything if a session is already running.
    /// Must be called from within a tokio runtime.
    pub fn start(&self, endpoint: impl Into<String>, options: SessionOptions) -> bool {
        let mut guard = self.inner.lock_core();
        if guard.is_some() {
            debug!("Session already started, ignoring start");
            return false;
        }

        let endpoint = endpoint.into();
        let cycle = self.inner.cycle.fetch_add(1, Ordering::SeqCst) + 1;
        info!("Starting session for {} (cycle {})", endpoint, cycle);
        let (mut core, transport_rx, timer_rx) = SessionCore::new(
            cycle,
            endpoint,
            options,
            Arc::clone(&self.inner.connector),
        );
        let task = tokio::spawn(run_event_loop(
            Arc::downgrade(&self.inner),
            cycle,
            transport_rx,
            timer_rx,
        ));
        core.attach_event_loop(task);

        if options.auto_connect {
            core.begin(&self.inner.notifier);
        } else {
            debug!("Auto-connect disabled, waiting for connect()");
        }
        *guard = Some(core);
        true
    }

    /// Connect now if the session is idle or waiting to reconnect.
    ///
    /// Returns false when not started or already connecting or open.
    pub fn connect(&self) -> bool {
        let mut guard = self.inner.lock_core();
        match guard.as_mut() {
            Some(core) => core.connect_now(&self.inner.notifier),
            None => false,
        }
    }

    /// Stop the session: cancel every timer and close the live handle.
    ///
    /// Safe to call any number of times, including before any connection.
    pub fn stop(&self) {
        let core = {
            let mut guard = self.inner.lock_core();
            self.inner.cycle.fetch_add(1, Ordering::SeqCst);
            guard.take()
        };
        match core {
            Some(mut core) => {
                core.shutdown(&self.inner.notifier);
                info!("Session for {} stopped", core.endpoint());
            }
            None => debug!("Session not running, ignoring stop"),
        }
    }

    /// Serialize `payload` as JSON and send it if the session is open.
    ///
    /// Best effort and at most once: returns false, without queueing or
    /// erroring, when the payload could not be written.
    pub fn send<T: Serialize + ?Sized>(&self, payload: &T) -> bool {
        let guard = self.inner.lock_core();
        match guard.as_ref() {
            Some(core) => core.send(payload, &self.inner.notifier),
            None => false,
        }
    }

    /// Current connection status
    pub fn status(&self) -> ConnectionStatus {
        self.inner.notifier.status()
    }

    /// Receiver notified on every status change
    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.inner.notifier.status.subscribe()
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.notifier.events.subscribe()
    }

    /// Lifecycle phase of the running session, if any
    pub fn phase(&self) -> Option<SessionPhase> {
        self.inner.lock_core().as_ref().map(SessionCore::phase)
    }

    /// Current reconnect attempt counter (0 when not running)
    pub fn attempt(&self) -> u32 {
        self.inner
            .lock_core()
            .as_ref()
            .map_or(0, SessionCore::attempt)
    }

    /// Endpoint of the running session
    pub fn endpoint(&self) -> Option<String> {
        self.inner
            .lock_core()
            .as_ref()
            .map(|core| core.endpoint().to_string())
    }

    pub fn is_started(&self) -> bool {
        self.inner.lock_core().is_some()
    }

    /// Number of armed timers (0 when not running)
    pub fn armed_timers(&self) -> usize {
        self.inner
            .lock_core()
            .as_ref()
            .map_or(0, SessionCore::armed_timers)
    }

    /// Register the handler for raw inbound payloads, replacing any previous one.
    ///
    /// Errors returned by the handler, and panics inside it, are logged and
    /// reported as [`SessionEvent::HandlerFailed`]; they never affect the
    /// connection. The handler must not register a new handler itself.
    pub fn on_message<F>(&self, handler: F)
    where
        F: FnMut(&str) -> Result<(), HandlerError> + Send + 'static,
    {
        *self.inner.lock_handler() = Some(Box::new(handler));
    }

    /// Register a handler receiving each inbound payload decoded from JSON.
    ///
    /// Payloads that do not decode into `T` are logged and reported as
    /// [`SessionEvent::ParseFailure`] and are otherwise dropped.
    pub fn on_json<T, F>(&self, mut handler: F)
    where
        T: DeserializeOwned + 'static,
        F: FnMut(T) -> Result<(), HandlerError> + Send + 'static,
    {
        let events = self.inner.notifier.events.clone();
        self.on_message(move |raw| match serde_json::from_str::<T>(raw) {
            Ok(value) => handler(value),
            Err(e) => {
                let error = PayloadError::from(e);
                warn!("Failed to parse inbound payload: {}", error);
                let _ = events.send(SessionEvent::ParseFailure {
                    error: error.to_string(),
                });
                Ok(())
            }
        });
    }
}

impl Inner {
    fn lock_core(&self) -> MutexGuard<'_, Option<SessionCore>> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_handler(&self) -> MutexGuard<'_, Option<InboundHandler>> {
        self.handler.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_current(&self, cycle: u64) -> bool {
        self.cycle.load(Ordering::SeqCst) == cycle
    }

    fn dispatch(&self, cycle: u64, input: LoopInput) {
        let payload = {
            let mut guard = self.lock_core();
            let Some(core) = guard.as_mut() else {
                return;
            };
            // A restart may have installed a newer core before this loop saw its abort
            if core.cycle() != cycle {
                trace!("Ignoring input from finished cycle {}", cycle);
                return;
            }
            match input {
                LoopInput::Transport(event) => core.handle_transport(event, &self.notifier),
                LoopInput::Timer(fired) => {
                    core.handle_timer(fired, &self.notifier);
                    None
                }
            }
        };

        if let Some(payload) = payload {
            self.deliver(cycle, &payload);
        }
    }

    /// Hand a payload to the inbound handler, isolating its failures
    fn deliver(&self, cycle: u64, payload: &str) {
        let mut guard = self.lock_handler();
        if !self.is_current(cycle) {
            debug!("Session stopped before delivery, dropping payload");
            return;
        }
        let Some(handler) = guard.as_mut() else {
            debug!("No inbound handler registered, dropping payload");
            return;
        };

        let failure = match catch_unwind(AssertUnwindSafe(|| handler(payload))) {
            Ok(Ok(())) => return,
            Ok(Err(e)) => e.to_string(),
            Err(panic) => panic_message(panic.as_ref()),
        };
        error!("Error in inbound message handler: {}", failure);
        self.notifier
            .emit(SessionEvent::HandlerFailed { error: failure });
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("handler panicked: {}", message)
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("handler panicked: {}", message)
    } else {
        "handler panicked".to_string()
    }
}

/// Single consumer of one start cycle's handle events and timer firings
async fn run_event_loop(
    inner: Weak<Inner>,
    cycle: u64,
    mut transport_rx: mpsc::UnboundedReceiver<TransportEvent>,
    mut timer_rx: mpsc::UnboundedReceiver<TimerFired>,
) {
    loop {
        let input = tokio::select! {
            Some(event) = transport_rx.recv() => LoopInput::Transport(event),
            Some(fired) = timer_rx.recv() => LoopInput::Timer(fired),
            else => break,
        };
        let Some(session) = inner.upgrade() else {
            break;
        };
        session.dispatch(cycle, input);
    }
    debug!("Session event loop finished");
}
