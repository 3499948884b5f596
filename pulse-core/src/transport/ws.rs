//! WebSocket transport built on tokio-tungstenite

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tracing::{debug, info, warn};

use super::{ABNORMAL_CLOSURE, Connector, EventSink, SocketHandle};
use crate::error::TransportError;
use crate::session::ConnectionStatus;

/// Connector that opens real WebSocket connections
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl WsConnector {
    pub fn new() -> Self {
        Self
    }
}

impl Connector for WsConnector {
    fn connect(&self, endpoint: &str, sink: EventSink) -> Box<dyn SocketHandle> {
        let state = Arc::new(AtomicU8::new(ConnectionStatus::Connecting.ready_state()));
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel::<Message>();

        tokio::spawn(socket_task(
            endpoint.to_string(),
            sink.clone(),
            Arc::clone(&state),
            outgoing_rx,
        ));

        Box::new(WsHandle {
            state,
            outgoing: outgoing_tx,
            sink,
        })
    }
}

/// Handle to one WebSocket connection driven by a background task
struct WsHandle {
    state: Arc<AtomicU8>,
    outgoing: mpsc::UnboundedSender<Message>,
    sink: EventSink,
}

impl WsHandle {
    fn status(&self) -> ConnectionStatus {
        ConnectionStatus::from_ready_state(self.state.load(Ordering::Acquire))
            .unwrap_or(ConnectionStatus::Closed)
    }
}

impl SocketHandle for WsHandle {
    fn send_raw(&self, text: String) -> Result<(), TransportError> {
        match self.status() {
            ConnectionStatus::Open => self
                .outgoing
                .send(Message::text(text))
                .map_err(|_| TransportError::Closed),
            ConnectionStatus::Closed => Err(TransportError::Closed),
            _ => Err(TransportError::NotOpen),
        }
    }

    fn close(&mut self) {
        self.sink.silence();
        if self.status() != ConnectionStatus::Closed {
            set_state(&self.state, ConnectionStatus::Closing);
        }
        // The task may already be gone; nothing to report in that case.
        let _ = self.outgoing.send(Message::Close(None));
    }

    fn ready_state(&self) -> Option<ConnectionStatus> {
        Some(self.status())
    }
}

impl Drop for WsHandle {
    fn drop(&mut self) {
        self.sink.silence();
    }
}

fn set_state(state: &AtomicU8, status: ConnectionStatus) {
    state.store(status.ready_state(), Ordering::Release);
}

/// Drives one connection: connect, then pump frames both ways until closed
async fn socket_task(
    url: String,
    sink: EventSink,
    state: Arc<AtomicU8>,
    mut outgoing: mpsc::UnboundedReceiver<Message>,
) {
    debug!("Connecting to {} (handle #{})", url, sink.generation());

    let connected = tokio::select! {
        result = connect_async(url.as_str()) => result,
        _ = wait_for_close_request(&mut outgoing) => {
            debug!("Handle #{} closed while connecting", sink.generation());
            set_state(&state, ConnectionStatus::Closed);
            return;
        }
    };

    let ws_stream = match connected {
        Ok((ws_stream, _response)) => ws_stream,
        Err(e) => {
            warn!("Failed to connect to {}: {}", url, e);
            set_state(&state, ConnectionStatus::Closed);
            sink.error(e.to_string());
            sink.close(ABNORMAL_CLOSURE, "");
            return;
        }
    };

    info!("Connected to {}", url);
    set_state(&state, ConnectionStatus::Open);
    sink.open();

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let (code, reason) = loop {
        tokio::select! {
            outbound = outgoing.recv() => match outbound {
                Some(Message::Close(frame)) => {
                    let _ = ws_sender.send(Message::Close(frame)).await;
                    let _ = ws_sender.close().await;
                    break (1000, "closed by client".to_string());
                }
                Some(msg) => {
                    if let Err(e) = ws_sender.send(msg).await {
                        warn!("Failed to send WebSocket message: {}", e);
                        sink.error(e.to_string());
                        break (ABNORMAL_CLOSURE, e.to_string());
                    }
                }
                None => {
                    debug!("Handle #{} dropped, closing socket", sink.generation());
                    let _ = ws_sender.close().await;
                    break (1000, "handle dropped".to_string());
                }
            },
            inbound = ws_receiver.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    let text_str: &str = &text;
                    debug!("Received: {}", text_str);
                    sink.message(text_str);
                }
                Some(Ok(Message::Binary(data))) => match String::from_utf8(data.to_vec()) {
                    Ok(text) => sink.message(text),
                    Err(_) => debug!("Ignoring non UTF-8 binary message"),
                },
                Some(Ok(Message::Close(frame))) => {
                    debug!("Received close message");
                    break close_details(frame);
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {
                    // Pong replies are sent by tungstenite
                }
                Some(Err(e)) => {
                    warn!("WebSocket error: {}", e);
                    sink.error(e.to_string());
                    break (ABNORMAL_CLOSURE, e.to_string());
                }
                None => break (ABNORMAL_CLOSURE, String::new()),
            },
        }
    };

    set_state(&state, ConnectionStatus::Closed);
    info!("WebSocket connection closed (code {})", code);
    sink.close(code, reason);
}

/// Resolves once the handle asked to close or went away
async fn wait_for_close_request(outgoing: &mut mpsc::UnboundedReceiver<Message>) {
    loop {
        match outgoing.recv().await {
            Some(Message::Close(_)) | None => return,
            // Sends are refused before open, so nothing else should arrive
            Some(_) => continue,
        }
    }
}

fn close_details(frame: Option<CloseFrame>) -> (u16, String) {
    match frame {
        Some(frame) => (u16::from(frame.code), frame.reason.as_str().to_string()),
        None => (1005, String::new()),
    }
}
