use crate::error::{Error, Result};
use crate::source::{parse_transaction, SourceEvent, SourceStream};
use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

pub const DEFAULT_WS_URL: &str = "ws://localhost:3000/ws/transactions";

/// One push connection. Once it fails or closes it stays that way, a new
/// instance has to be created to reconnect.
pub struct LiveStream {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
    url: String,
    finished: bool,
    token: CancellationToken,
}

impl LiveStream {
    pub async fn connect(url: String, token: CancellationToken) -> Result<Self> {
        let (socket, _) = connect_async(url.as_str()).await?;
        log::info!("Connected to {}", url);
        Ok(Self { socket, url, finished: false, token })
    }

    /// Closes the connection with a close handshake. The stream is finished
    /// afterwards.
    pub async fn close(&mut self) {
        self.finished = true;
        if let Err(error) = self.socket.close(None).await {
            log::debug!("Close of {} failed: {}", self.url, error);
        }
    }

    fn decode(&self, payload: &str) -> Option<SourceEvent> {
        match parse_transaction(payload) {
            Ok(transaction) => {
                log::debug!("Transaction: {} Block: {}", transaction.id, transaction.block_id);
                Some(SourceEvent::Next(transaction))
            }
            Err(error) => {
                log::warn!("Skip message from {}: {}", self.url, error);
                None
            }
        }
    }
}

impl SourceStream for LiveStream {
    async fn next(&mut self) -> SourceEvent {
        loop {
            if self.finished {
                return SourceEvent::EndOfStream;
            }
            let message = tokio::select! {
                _ = self.token.cancelled() => {
                    log::debug!("next() interrupted");
                    self.close().await;
                    return SourceEvent::Failure(Error::Shutdown);
                }
                message = self.socket.next() => message,
            };
            match message {
                Some(Ok(Message::Text(text))) => {
                    if let Some(event) = self.decode(&text) {
                        return event;
                    }
                }
                Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                    Ok(text) => {
                        if let Some(event) = self.decode(text) {
                            return event;
                        }
                    }
                    Err(error) => log::warn!("Skip binary message from {}: {}", self.url, error),
                },
                Some(Ok(Message::Close(_))) | None => {
                    log::debug!("Connection to {} closed", self.url);
                    self.finished = true;
                    return SourceEvent::EndOfStream;
                }
                Some(Ok(_)) => continue,
                Some(Err(error)) => {
                    log::error!("Connection to {} failed: {}", self.url, error);
                    self.finished = true;
                    return SourceEvent::Failure(Error::Transport(error));
                }
            }
        }
    }
}
