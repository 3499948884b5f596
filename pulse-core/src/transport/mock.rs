//! Scripted in-memory connector for testing
//!
//! Every `connect` call records a connection that tests drive by index:
//! open it, deliver messages, report errors, or drop it from the remote side.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{ABNORMAL_CLOSURE, Connector, EventSink, SocketHandle};
use crate::error::TransportError;
use crate::session::ConnectionStatus;

#[derive(Debug)]
struct MockSocketState {
    status: ConnectionStatus,
    sent: Vec<String>,
    closed_by_client: bool,
    fail_sends: bool,
}

#[derive(Debug)]
struct MockSocket {
    endpoint: String,
    sink: EventSink,
    state: Arc<Mutex<MockSocketState>>,
}

/// Connector whose connections are driven by the test
#[derive(Debug, Clone, Default)]
pub struct MockConnector {
    sockets: Arc<Mutex<Vec<MockSocket>>>,
    leaky: bool,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connector whose handles keep delivering events after `close()`
    pub fn leaky() -> Self {
        Self {
            sockets: Arc::default(),
            leaky: true,
        }
    }

    /// Number of connections created so far
    pub fn connection_count(&self) -> usize {
        self.sockets().len()
    }

    /// Number of connections neither closed by the client nor by the remote
    pub fn live_connections(&self) -> usize {
        self.sockets()
            .iter()
            .filter(|socket| {
                let state = lock(&socket.state);
                !state.closed_by_client && state.status != ConnectionStatus::Closed
            })
            .count()
    }

    /// Endpoint connection `index` was created for
    pub fn endpoint(&self, index: usize) -> Option<String> {
        self.sockets()
            .get(index)
            .map(|socket| socket.endpoint.clone())
    }

    /// Complete the handshake of connection `index`
    pub fn open(&self, index: usize) {
        self.with_socket(index, |socket| {
            lock(&socket.state).status = ConnectionStatus::Open;
            socket.sink.open();
        });
    }

    /// Deliver an inbound text payload on connection `index`
    pub fn deliver(&self, index: usize, payload: &str) {
        self.with_socket(index, |socket| socket.sink.message(payload));
    }

    /// Report a transport error on connection `index`, leaving it in `status`
    pub fn fail(&self, index: usize, message: &str, status: ConnectionStatus) {
        self.with_socket(index, |socket| {
            lock(&socket.state).status = status;
            socket.sink.error(message);
        });
    }

    /// Close connection `index` from the remote side
    pub fn drop_connection(&self, index: usize) {
        self.with_socket(index, |socket| {
            lock(&socket.state).status = ConnectionStatus::Closed;
            socket.sink.close(ABNORMAL_CLOSURE, "connection lost");
        });
    }

    /// Make writes on connection `index` fail
    pub fn fail_sends(&self, index: usize, fail: bool) {
        self.with_socket(index, |socket| lock(&socket.state).fail_sends = fail);
    }

    /// Text frames written on connection `index`
    pub fn sent(&self, index: usize) -> Vec<String> {
        self.sockets()
            .get(index)
            .map(|socket| lock(&socket.state).sent.clone())
            .unwrap_or_default()
    }

    /// Whether the client closed connection `index`
    pub fn closed_by_client(&self, index: usize) -> bool {
        self.sockets()
            .get(index)
            .is_some_and(|socket| lock(&socket.state).closed_by_client)
    }

    fn sockets(&self) -> MutexGuard<'_, Vec<MockSocket>> {
        lock(&self.sockets)
    }

    fn with_socket(&self, index: usize, f: impl FnOnce(&MockSocket)) {
        let sockets = self.sockets();
        if let Some(socket) = sockets.get(index) {
            f(socket);
        }
    }
}

impl Connector for MockConnector {
    fn connect(&self, endpoint: &str, sink: EventSink) -> Box<dyn SocketHandle> {
        let state = Arc::new(Mutex::new(MockSocketState {
            status: ConnectionStatus::Connecting,
            sent: Vec::new(),
            closed_by_client: false,
            fail_sends: false,
        }));
        self.sockets().push(MockSocket {
            endpoint: endpoint.to_string(),
            sink: sink.clone(),
            state: Arc::clone(&state),
        });
        Box::new(MockHandle {
            state,
            sink,
            leaky: self.leaky,
        })
    }
}

struct MockHandle {
    state: Arc<Mutex<MockSocketState>>,
    sink: EventSink,
    leaky: bool,
}

impl SocketHandle for MockHandle {
    fn send_raw(&self, text: String) -> Result<(), TransportError> {
        let mut state = lock(&self.state);
        if state.status != ConnectionStatus::Open {
            return Err(TransportError::NotOpen);
        }
        if state.fail_sends {
            return Err(TransportError::SendFailed("mock send failure".to_string()));
        }
        state.sent.push(text);
        Ok(())
    }

    fn close(&mut self) {
        let mut state = lock(&self.state);
        state.closed_by_client = true;
        state.status = ConnectionStatus::Closed;
        if !self.leaky {
            self.sink.silence();
        }
    }

    fn ready_state(&self) -> Option<ConnectionStatus> {
        Some(lock(&self.state).status)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
