//! Bidirectional text transport.
//!
//! The client only needs ordered, reliable delivery of text frames. The
//! [`Transport`] trait captures that; [`WsTransport`] implements it over a
//! WebSocket.

use crate::error::TransportError;
use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex as TokioMutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::instrument::WithSubscriber;
use tracing::{debug, error, info, warn};

/// Something that happened on the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Open,
    Close,
    Error(String),
    Message(String),
}

/// Where a transport reports its events. Handed over on every connect.
pub type EventSink = mpsc::UnboundedSender<TransportEvent>;

/// Trait for a text-frame transport.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Opens the connection to `url`. Inbound frames and state changes for
    /// this connection are reported to `events`.
    async fn connect(&self, url: &str, events: EventSink) -> Result<(), TransportError>;

    /// Sends one text frame.
    async fn send(&self, text: String) -> Result<(), TransportError>;

    /// Closes the connection. Closing a closed transport is not an error.
    async fn close(&self) -> Result<(), TransportError>;

    fn is_connected(&self) -> bool;
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket transport backed by `tokio-tungstenite`.
#[derive(Default, derive_more::Debug)]
pub struct WsTransport {
    #[debug(skip)]
    sink: TokioMutex<Option<SplitSink<WsStream, Message>>>,
    connected: Arc<AtomicBool>,
    #[debug(skip)]
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl WsTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn connect(&self, url: &str, events: EventSink) -> Result<(), TransportError> {
        debug!("Connecting to {}", url);
        let (stream, _response) = connect_async(url)
            .await
            .map_err(|e| TransportError::connect(e.to_string()))?;
        let (sink, stream) = stream.split();

        *self.sink.lock().await = Some(sink);
        self.connected.store(true, Ordering::Release);
        info!("WebSocket connected to {}", url);
        let _ = events.send(TransportEvent::Open);

        let reader = tokio::spawn(
            read_frames(stream, events, self.connected.clone()).with_current_subscriber(),
        );
        if let Some(previous) = self.reader.lock().replace(reader) {
            previous.abort();
        }
        Ok(())
    }

    async fn send(&self, text: String) -> Result<(), TransportError> {
        let mut sink = self.sink.lock().await;
        let sink = sink.as_mut().ok_or(TransportError::NotConnected)?;
        debug!("Sending frame: {}", text);
        sink.send(Message::Text(text.into())).await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.connected.store(false, Ordering::Release);
        let sink = self.sink.lock().await.take();
        if let Some(mut sink) = sink {
            debug!("Closing WebSocket");
            if let Err(e) = sink.close().await {
                return Err(TransportError::Close {
                    message: e.to_string(),
                });
            }
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}

async fn read_frames(mut stream: SplitStream<WsStream>, events: EventSink, connected: Arc<AtomicBool>) {
    while let Some(msg) = stream.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                debug!("Received frame: {}", text.as_str());
                if events.send(TransportEvent::Message(text.as_str().to_owned())).is_err() {
                    warn!("Event sink dropped, stopping reader");
                    break;
                }
            }
            Ok(Message::Close(frame)) => {
                info!("Received close frame: {:?}", frame);
                break;
            }
            Ok(other) => debug!("Ignoring non-text frame: {:?}", other),
            Err(e) => {
                error!("Error receiving frame: {}", e);
                let _ = events.send(TransportEvent::Error(e.to_string()));
                break;
            }
        }
    }
    connected.store(false, Ordering::Release);
    let _ = events.send(TransportEvent::Close);
}
