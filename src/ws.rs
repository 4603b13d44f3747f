//! WebSocket [`Connector`] backed by tokio-tungstenite.
//!
//! Only text frames are delivered upward. Binary, ping and pong frames are
//! skipped (tungstenite answers pings itself); a close frame ends the link.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::transport::{Connector, FrameLink, TransportError};

/// Connects to `ws://` and `wss://` endpoints.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, address: &str) -> Result<Box<dyn FrameLink>, TransportError> {
        let (stream, response) = tokio_tungstenite::connect_async(address)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        log::debug!("[ws] handshake complete: HTTP {}", response.status());
        Ok(Box::new(WsLink { stream }))
    }
}

struct WsLink {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl FrameLink for WsLink {
    async fn next_frame(&mut self) -> Option<Result<String, TransportError>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text)),
                Ok(Message::Close(frame)) => {
                    if let Some(frame) = frame {
                        log::debug!("[ws] close frame: {} {}", frame.code, frame.reason);
                    }
                    return None;
                }
                Ok(Message::Binary(bytes)) => {
                    log::debug!("[ws] ignoring {}-byte binary frame", bytes.len());
                }
                Ok(_) => {}
                Err(e) => return Some(Err(TransportError::Lost(e.to_string()))),
            }
        }
    }

    async fn send_frame(&mut self, frame: String) -> Result<(), TransportError> {
        self.stream
            .send(Message::Text(frame))
            .await
            .map_err(|e| TransportError::Lost(e.to_string()))
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            log::debug!("[ws] close failed: {}", e);
        }
    }
}
