//! WebSocket test client
//!
//! Note: Some methods may appear unused because they're only used in specific
//! test files and clippy checks each test independently.

use std::net::SocketAddr;
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use pulse_core::MetricSample;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Low-level WebSocket connection
pub struct WsConnection {
    sink: SplitSink<WsStream, Message>,
    stream: SplitStream<WsStream>,
}

impl WsConnection {
    /// Connect to the feed endpoint
    pub async fn connect(addr: SocketAddr) -> Self {
        let url = format!("ws://{}/ws", addr);
        let (ws, _) = tokio_tungstenite::connect_async(&url)
            .await
            .expect("Failed to connect");
        let (sink, stream) = ws.split();
        Self { sink, stream }
    }

    /// Send raw text message
    #[allow(dead_code)]
    pub async fn send_raw(&mut self, msg: &str) {
        self.sink
            .send(Message::Text(msg.to_string().into()))
            .await
            .unwrap();
    }

    /// Receive raw text message, None once the server closed the socket
    pub async fn recv_raw(&mut self) -> Option<String> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Some(text.to_string()),
                Some(Ok(Message::Close(_))) | None => return None,
                Some(Ok(_)) => continue,
                Some(Err(e)) => panic!("WebSocket error: {}", e),
            }
        }
    }

    /// Receive the next sample, failing the test after two seconds
    #[allow(dead_code)]
    pub async fn recv_sample(&mut self) -> MetricSample {
        let text = tokio::time::timeout(Duration::from_secs(2), self.recv_raw())
            .await
            .expect("Timed out waiting for a sample")
            .expect("WebSocket closed");
        MetricSample::parse(&text).expect("Failed to parse sample")
    }

    /// Close the connection from the client side
    #[allow(dead_code)]
    pub async fn close(mut self) {
        let _ = self.sink.send(Message::Close(None)).await;
    }
}
