//! Client side of the sync protocol: a WebSocket connection with
//! bounded reconnect and typed frame helpers.

use std::time::Duration;

use codraft_store::DocumentId;
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite, MaybeTlsStream, WebSocketStream};

use crate::proto::{ClientMessage, ServerMessage};

/// Connection attempts before giving up; beyond this budget the
/// caller must re-establish manually.
pub const RECONNECT_ATTEMPTS: u32 = 5;

/// Fixed backoff between attempts.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(1);

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("connection failed after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },

    #[error("transport error: {0}")]
    Transport(#[from] tungstenite::Error),

    #[error("malformed server frame: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("connection closed")]
    Closed,
}

#[derive(Debug)]
pub struct Connection {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl Connection {
    /// Connect with the default retry budget.
    pub async fn connect(url: &str) -> Result<Self, ClientError> {
        Self::connect_with_retry(url, RECONNECT_ATTEMPTS, RECONNECT_DELAY).await
    }

    /// Connect with bounded retries and fixed backoff. The last
    /// transport error is surfaced once the budget is spent.
    pub async fn connect_with_retry(
        url: &str,
        attempts: u32,
        delay: Duration,
    ) -> Result<Self, ClientError> {
        let attempts = attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match connect_async(url).await {
                Ok((ws, _response)) => {
                    tracing::debug!(attempt, "connected to {url}");
                    return Ok(Self { ws });
                }
                Err(e) => {
                    tracing::debug!(attempt, error = %e, "connect attempt failed");
                    last_error = e.to_string();
                    if attempt < attempts {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Err(ClientError::Exhausted {
            attempts,
            last_error,
        })
    }

    pub async fn join(&mut self, document_id: DocumentId) -> Result<(), ClientError> {
        self.send(&ClientMessage::Join { document_id }).await
    }

    pub async fn update(
        &mut self,
        document_id: DocumentId,
        content: serde_json::Value,
    ) -> Result<(), ClientError> {
        self.send(&ClientMessage::Update {
            id: document_id,
            content,
        })
        .await
    }

    pub async fn leave(&mut self) -> Result<(), ClientError> {
        self.send(&ClientMessage::Leave).await
    }

    /// Next protocol frame from the server, skipping transport noise.
    pub async fn next_event(&mut self) -> Result<ServerMessage, ClientError> {
        while let Some(frame) = self.ws.next().await {
            match frame? {
                tungstenite::Message::Text(text) => return Ok(serde_json::from_str(&text)?),
                tungstenite::Message::Close(_) => return Err(ClientError::Closed),
                _ => continue,
            }
        }
        Err(ClientError::Closed)
    }

    pub async fn close(mut self) -> Result<(), ClientError> {
        self.ws.close(None).await?;
        Ok(())
    }

    async fn send(&mut self, message: &ClientMessage) -> Result<(), ClientError> {
        let text = serde_json::to_string(message)?;
        self.ws.send(tungstenite::Message::Text(text)).await?;
        Ok(())
    }
}
