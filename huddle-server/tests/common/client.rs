//! WebSocket test client for protocol testing
//!
//! Provides both low-level WsConnection and high-level TestClient.
//!
//! Note: Some methods may appear unused because they're only used in specific
//! test files and clippy checks each test independently.

use std::net::SocketAddr;
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use huddle_server::ws::Envelope;
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
    /// Connect to the WebSocket endpoint, optionally with a display name
    pub async fn connect(addr: SocketAddr, name: Option<&str>) -> Self {
        let url = match name {
            Some(name) => format!("ws://{}/ws?name={}", addr, name),
            None => format!("ws://{}/ws", addr),
        };
        let (ws, _) = tokio_tungstenite::connect_async(&url)
            .await
            .expect("Failed to connect");
        let (sink, stream) = ws.split();
        Self { sink, stream }
    }

    /// Send raw text message
    pub async fn send_raw(&mut self, msg: &str) {
        self.sink
            .send(Message::Text(msg.to_string().into()))
            .await
            .unwrap();
    }

    /// Receive raw text message, or None once the server closes
    pub async fn try_recv_raw(&mut self) -> Option<String> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Some(text.to_string()),
                Some(Ok(Message::Close(_))) | None => return None,
                Some(Ok(_)) => continue,
                Some(Err(e)) => panic!("WebSocket error: {}", e),
            }
        }
    }

    /// Receive raw text message
    pub async fn recv_raw(&mut self) -> String {
        self.try_recv_raw().await.expect("WebSocket closed")
    }

    /// Receive with timeout, returns None if timeout
    pub async fn recv_timeout(&mut self, duration: Duration) -> Option<String> {
        tokio::time::timeout(duration, self.recv_raw()).await.ok()
    }

    /// Close the connection with a close frame
    pub async fn close(mut self) {
        let _ = self.sink.send(Message::Close(None)).await;
        let _ = self.sink.close().await;
    }
}

/// High-level test client speaking envelopes
pub struct TestClient {
    pub conn: WsConnection,
}

impl TestClient {
    /// Connect to server with a display name
    #[allow(dead_code)]
    pub async fn connect(addr: SocketAddr, name: &str) -> Self {
        Self {
            conn: WsConnection::connect(addr, Some(name)).await,
        }
    }

    /// Send an envelope
    #[allow(dead_code)]
    pub async fn send(&mut self, envelope: &Envelope) {
        let text = envelope.encode().unwrap();
        self.conn.send_raw(&text).await;
    }

    /// Receive next envelope
    #[allow(dead_code)]
    pub async fn recv(&mut self) -> Envelope {
        let text = tokio::time::timeout(Duration::from_secs(5), self.conn.recv_raw())
            .await
            .expect("Timed out waiting for envelope");
        Envelope::decode(&text).expect("Server sent malformed envelope")
    }

    /// Assert no message received within duration
    #[allow(dead_code)]
    pub async fn expect_no_message(&mut self, duration: Duration) {
        let received = self.conn.recv_timeout(duration).await;
        assert!(
            received.is_none(),
            "Expected no message but received: {:?}",
            received
        );
    }

    /// Close the connection
    #[allow(dead_code)]
    pub async fn close(self) {
        self.conn.close().await;
    }
}
