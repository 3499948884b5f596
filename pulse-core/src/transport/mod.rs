//! Socket handle adapter
//!
//! A [`Connector`] creates one [`SocketHandle`] per connection attempt. The
//! handle reports `open`, `message`, `error` and `close` through an
//! [`EventSink`] stamped with the generation of the attempt, so the session
//! can tell events of a superseded handle apart from the live one.

pub mod mock;
mod ws;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;
use tracing::trace;

use crate::error::TransportError;
use crate::session::ConnectionStatus;

pub use mock::MockConnector;
pub use ws::WsConnector;

/// Close code used when the transport went away without a close frame
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Events produced by a socket handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleEvent {
    Open,
    Message(String),
    Error(String),
    Close { code: u16, reason: String },
}

/// A handle event tagged with the generation of the handle that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportEvent {
    pub generation: u64,
    pub event: HandleEvent,
}

/// Sending half a handle uses to report its events.
///
/// Once silenced, the sink drops everything it is given.
#[derive(Debug, Clone)]
pub struct EventSink {
    generation: u64,
    tx: mpsc::UnboundedSender<TransportEvent>,
    silenced: Arc<AtomicBool>,
}

impl EventSink {
    pub fn new(generation: u64, tx: mpsc::UnboundedSender<TransportEvent>) -> Self {
        Self {
            generation,
            tx,
            silenced: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn open(&self) {
        self.emit(HandleEvent::Open);
    }

    pub fn message(&self, payload: impl Into<String>) {
        self.emit(HandleEvent::Message(payload.into()));
    }

    pub fn error(&self, message: impl Into<String>) {
        self.emit(HandleEvent::Error(message.into()));
    }

    pub fn close(&self, code: u16, reason: impl Into<String>) {
        self.emit(HandleEvent::Close {
            code,
            reason: reason.into(),
        });
    }

    /// Stop delivering events from this sink and all of its clones
    pub fn silence(&self) {
        self.silenced.store(true, Ordering::Release);
    }

    pub fn is_silenced(&self) -> bool {
        self.silenced.load(Ordering::Acquire)
    }

    fn emit(&self, event: HandleEvent) {
        if self.is_silenced() {
            trace!("Dropping {:?} from closed handle #{}", event, self.generation);
            return;
        }
        let _ = self.tx.send(TransportEvent {
            generation: self.generation,
            event,
        });
    }
}

/// One underlying transport connection.
///
/// Implementations must never block and must stop delivering events once
/// [`SocketHandle::close`] has been called.
pub trait SocketHandle: Send {
    /// Transmit a text frame
    fn send_raw(&self, text: String) -> Result<(), TransportError>;

    /// Begin closing the connection
    fn close(&mut self);

    /// The handle's own view of its state, if it can report one
    fn ready_state(&self) -> Option<ConnectionStatus>;
}

/// Creates socket handles bound to an endpoint
pub trait Connector: Send + Sync + 'static {
    /// Start connecting to `endpoint`, reporting events through `sink`
    fn connect(&self, endpoint: &str, sink: EventSink) -> Box<dyn SocketHandle>;
}
