use std::{
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use log::{debug, warn};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use super::endpoint::validate_endpoint;
use crate::error::TransportError;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// An open duplex channel. `inbound` yields text payloads until the channel
/// closes (`recv()` returns `None`); dropping `outbound` closes it from our side.
pub struct Connection {
    pub outbound: mpsc::UnboundedSender<String>,
    pub inbound: mpsc::UnboundedReceiver<String>,
}

/// Far side of an in-memory [`Connection`].
pub struct RemoteEnd {
    pub to_client: mpsc::UnboundedSender<String>,
    pub from_client: mpsc::UnboundedReceiver<String>,
}

impl Connection {
    /// Loopback pair, for embedding a local source or driving the client in tests.
    pub fn in_memory() -> (Connection, RemoteEnd) {
        let (to_client, inbound) = mpsc::unbounded_channel();
        let (outbound, from_client) = mpsc::unbounded_channel();
        (
            Connection { outbound, inbound },
            RemoteEnd {
                to_client,
                from_client,
            },
        )
    }
}

/// Opens channels to the telemetry source. Does not retry; that is the
/// supervisor's job.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn open(&self, url: &str) -> Result<Connection, TransportError>;
}

pub struct WebSocketTransport {
    connect_timeout: Duration,
}

impl WebSocketTransport {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for WebSocketTransport {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_TIMEOUT)
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn open(&self, url: &str) -> Result<Connection, TransportError> {
        validate_endpoint(url)?;
        let (stream, _) = tokio::time::timeout(self.connect_timeout, connect_async(url))
            .await
            .map_err(|_| TransportError::Timeout {
                url: url.to_string(),
                timeout: self.connect_timeout,
            })?
            .map_err(|err| TransportError::ConnectFailed {
                url: url.to_string(),
                reason: err.to_string(),
            })?;

        let (mut write, mut read) = stream.split();
        let (inbound_tx, inbound) = mpsc::unbounded_channel::<String>();
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        let peer = url.to_string();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    frame = read.next() => match frame {
                        Some(Ok(Message::Text(text))) => {
                            if inbound_tx.send(text).is_err() {
                                break;
                            }
                        }
                        Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                            Ok(text) => {
                                if inbound_tx.send(text).is_err() {
                                    break;
                                }
                            }
                            Err(_) => warn!("Dropping non-UTF-8 binary frame from {peer}"),
                        },
                        Some(Ok(Message::Close(frame))) => {
                            debug!("{peer} closed the channel: {frame:?}");
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(err)) => {
                            warn!("Receive error on {peer}: {err}");
                            break;
                        }
                        None => break,
                    },
                    payload = outbound_rx.recv() => match payload {
                        Some(payload) => {
                            if let Err(err) = write.send(Message::Text(payload)).await {
                                warn!("Send error on {peer}: {err}");
                                break;
                            }
                        }
                        None => {
                            let _ = write.send(Message::Close(None)).await;
                            break;
                        }
                    },
                }
            }
            // Dropping `inbound_tx` here is what signals the close upstream.
        });

        Ok(Connection { outbound, inbound })
    }
}

/// Outbound half of whichever connection is currently open. Sends while
/// nothing is attached are dropped and reported as `false`.
#[derive(Clone, Default)]
pub struct Outbox {
    sender: Arc<Mutex<Option<mpsc::UnboundedSender<String>>>>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, sender: mpsc::UnboundedSender<String>) {
        *self.lock() = Some(sender);
    }

    pub fn detach(&self) {
        self.lock().take();
    }

    pub fn is_attached(&self) -> bool {
        self.lock().as_ref().is_some_and(|tx| !tx.is_closed())
    }

    pub fn send(&self, payload: String) -> bool {
        match self.lock().as_ref() {
            Some(tx) => tx.send(payload).is_ok(),
            None => false,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<mpsc::UnboundedSender<String>>> {
        match self.sender.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outbox_drops_sends_while_detached() {
        let outbox = Outbox::new();
        assert!(!outbox.is_attached());
        assert!(!outbox.send("ignored".into()));
    }

    #[tokio::test]
    async fn outbox_forwards_to_attached_connection() {
        let outbox = Outbox::new();
        let (connection, mut remote) = Connection::in_memory();
        outbox.attach(connection.outbound);

        assert!(outbox.send("hello".into()));
        assert_eq!(remote.from_client.recv().await.as_deref(), Some("hello"));

        outbox.detach();
        assert!(!outbox.send("late".into()));
    }

    #[tokio::test]
    async fn outbox_reports_closed_peer() {
        let outbox = Outbox::new();
        let (connection, remote) = Connection::in_memory();
        outbox.attach(connection.outbound);
        drop(remote);

        assert!(!outbox.is_attached());
        assert!(!outbox.send("nobody listening".into()));
    }

    #[tokio::test]
    async fn websocket_open_fails_for_unreachable_host() {
        let transport = WebSocketTransport::new(Duration::from_secs(2));
        let result = transport.open("ws://127.0.0.1:1/ws").await;
        assert!(matches!(
            result,
            Err(TransportError::ConnectFailed { .. }) | Err(TransportError::Timeout { .. })
        ));
    }

    #[tokio::test]
    async fn websocket_open_rejects_malformed_url() {
        let transport = WebSocketTransport::default();
        for url in ["not a url", "localhost", "http://localhost:8000/ws"] {
            assert!(matches!(
                transport.open(url).await,
                Err(TransportError::InvalidUrl { .. })
            ));
        }
    }
}
