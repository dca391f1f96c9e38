//! WebSocketTransport - the relay's native transport.
//!
//! Each frame is one JSON text message. Binary frames are skipped; pings are
//! answered by tungstenite while the read half is polled.

use super::{Transport, TransportError};
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Configuration for WebSocketTransport.
#[derive(Clone, Debug)]
pub struct WebSocketTransportConfig {
    /// Connection (TCP + upgrade) timeout.
    pub connect_timeout: Duration,
}

impl Default for WebSocketTransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// WebSocketTransport implements the Transport trait over `tokio-tungstenite`.
///
/// The socket is split so a task blocked in `recv` does not stall `send`.
#[derive(Clone)]
pub struct WebSocketTransport {
    sink: Arc<Mutex<Option<SplitSink<WsStream, Message>>>>,
    stream: Arc<Mutex<Option<SplitStream<WsStream>>>>,
    connected: Arc<AtomicBool>,
    config: WebSocketTransportConfig,
}

impl std::fmt::Debug for WebSocketTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketTransport")
            .field("connected", &self.is_connected())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl WebSocketTransport {
    /// Create a new, unconnected transport.
    pub fn new() -> Self {
        Self::with_config(WebSocketTransportConfig::default())
    }

    /// Create a new transport with custom configuration.
    pub fn with_config(config: WebSocketTransportConfig) -> Self {
        Self {
            sink: Arc::new(Mutex::new(None)),
            stream: Arc::new(Mutex::new(None)),
            connected: Arc::new(AtomicBool::new(false)),
            config,
        }
    }
}

impl Default for WebSocketTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn connect(&self, address: &str) -> Result<(), TransportError> {
        let (socket, _response) = tokio::time::timeout(
            self.config.connect_timeout,
            tokio_tungstenite::connect_async(address),
        )
        .await
        .map_err(|_| TransportError::Timeout)?
        .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        let (sink, stream) = socket.split();
        *self.sink.lock().await = Some(sink);
        *self.stream.lock().await = Some(stream);
        self.connected.store(true, Ordering::SeqCst);

        tracing::debug!("Connected to relay at {}", address);
        Ok(())
    }

    async fn send(&self, frame: &str) -> Result<(), TransportError> {
        let mut guard = self.sink.lock().await;
        let sink = guard.as_mut().ok_or(TransportError::NotConnected)?;

        sink.send(Message::Text(frame.to_string()))
            .await
            .map_err(|e| {
                self.connected.store(false, Ordering::SeqCst);
                TransportError::SendFailed(e.to_string())
            })
    }

    async fn recv(&self) -> Result<String, TransportError> {
        let mut guard = self.stream.lock().await;
        let stream = guard.as_mut().ok_or(TransportError::NotConnected)?;

        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(text),
                Some(Ok(Message::Close(frame))) => {
                    tracing::debug!("Relay closed connection: {:?}", frame);
                    self.connected.store(false, Ordering::SeqCst);
                    return Err(TransportError::ConnectionClosed);
                }
                Some(Ok(Message::Binary(data))) => {
                    tracing::debug!("Skipping {} byte binary frame", data.len());
                }
                Some(Ok(_)) => {} // ping/pong/raw frames
                Some(Err(e)) => {
                    self.connected.store(false, Ordering::SeqCst);
                    return Err(TransportError::ReceiveFailed(e.to_string()));
                }
                None => {
                    self.connected.store(false, Ordering::SeqCst);
                    return Err(TransportError::ConnectionClosed);
                }
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.connected.store(false, Ordering::SeqCst);
        if let Some(mut sink) = self.sink.lock().await.take() {
            // Peer may already be gone; closing is best effort
            let _ = sink.send(Message::Close(None)).await;
            let _ = sink.close().await;
        }
        // Dropping a stream a concurrent recv holds would deadlock; try only.
        if let Ok(mut stream) = self.stream.try_lock() {
            stream.take();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::ws::{Message as AxumMessage, WebSocket, WebSocketUpgrade};
    use axum::response::Response;
    use axum::routing::get;
    use axum::Router;

    /// Echo server: sends a binary frame first, then echoes text frames.
    async fn echo(ws: WebSocketUpgrade) -> Response {
        ws.on_upgrade(|mut socket: WebSocket| async move {
            let _ = socket.send(AxumMessage::Binary(vec![0, 1, 2])).await;
            while let Some(Ok(msg)) = socket.recv().await {
                if let AxumMessage::Text(text) = msg {
                    if socket.send(AxumMessage::Text(text)).await.is_err() {
                        break;
                    }
                }
            }
        })
    }

    async fn start_echo_server() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new().route("/ws", get(echo));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("ws://{addr}/ws")
    }

    #[tokio::test]
    async fn send_recv_roundtrip_skips_binary() {
        let url = start_echo_server().await;
        let transport = WebSocketTransport::new();
        transport.connect(&url).await.unwrap();
        assert!(transport.is_connected());

        transport.send(r#"{"type":"x"}"#).await.unwrap();
        assert_eq!(transport.recv().await.unwrap(), r#"{"type":"x"}"#);

        transport.close().await.unwrap();
        assert!(!transport.is_connected());
    }

    #[tokio::test]
    async fn send_without_connect_fails() {
        let transport = WebSocketTransport::new();
        assert!(matches!(
            transport.send("x").await,
            Err(TransportError::NotConnected)
        ));
        assert!(matches!(
            transport.recv().await,
            Err(TransportError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn connect_to_closed_port_fails() {
        // Bind then drop to get a port with nothing listening
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = WebSocketTransport::new();
        let result = transport.connect(&format!("ws://{addr}/ws")).await;
        assert!(matches!(result, Err(TransportError::ConnectionFailed(_))));
        assert!(!transport.is_connected());
    }
}
