//! Host-facing client.
//!
//! `Client` bundles a [`Socket`] with its [`Heartbeat`] and is the surface a
//! host application (a game loop, a UI) owns: it starts the connection,
//! calls [`Client::update`] from its own thread on every tick, and shuts the
//! client down when it exits.

use crate::backoff::ReconnectStrategy;
use crate::config::ClientConfig;
use crate::events::Listener;
use crate::heartbeat::Heartbeat;
use crate::models::{Handshake, SocketIoEvent};
use crate::socket::Socket;
use crate::transport::{Transport, WsTransport};
use parking_lot::Mutex;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tracing::instrument::WithSubscriber;
use tracing::{debug, info, Dispatch};

/// Socket.IO client with host-driven event delivery.
#[derive(derive_more::Debug)]
pub struct Client<T: Transport = WsTransport> {
    socket: Socket<T>,
    #[debug(skip)]
    heartbeat: Mutex<Option<Heartbeat<T>>>,
    #[debug(skip)]
    dispatch: Option<Dispatch>,
}

impl Client<WsTransport> {
    /// Creates a client over a WebSocket transport.
    pub fn websocket(config: ClientConfig) -> Self {
        Client::new(WsTransport::new(), config)
    }
}

impl<T: Transport> Client<T> {
    pub fn new(transport: T, config: ClientConfig) -> Self {
        Client {
            socket: Socket::new(transport, config),
            heartbeat: Mutex::new(None),
            dispatch: None,
        }
    }

    /// Routes every log line of this client, including those from its
    /// background tasks, to `dispatch` instead of the global subscriber.
    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = Some(dispatch);
        self
    }

    pub fn with_reconnect_strategy(self, strategy: Arc<dyn ReconnectStrategy>) -> Self {
        self.socket.set_reconnect_strategy(strategy);
        self
    }

    pub fn socket(&self) -> &Socket<T> {
        &self.socket
    }

    pub fn config(&self) -> &ClientConfig {
        self.socket.config()
    }

    pub fn is_connected(&self) -> bool {
        self.socket.is_connected()
    }

    /// Session id of the current session, `None` while disconnected.
    pub fn sid(&self) -> Option<String> {
        self.socket.handshake().map(|handshake| handshake.sid)
    }

    pub fn handshake(&self) -> Option<Handshake> {
        self.socket.handshake()
    }

    fn traced<R>(&self, f: impl FnOnce() -> R) -> R {
        match &self.dispatch {
            Some(dispatch) => tracing::dispatcher::with_default(dispatch, f),
            None => f(),
        }
    }

    async fn traced_async<F: Future>(&self, fut: F) -> F::Output {
        match &self.dispatch {
            Some(dispatch) => fut.with_subscriber(dispatch.clone()).await,
            None => fut.await,
        }
    }

    /// Starts connecting to `url`, and the heartbeat if enabled.
    pub async fn start(&self, url: &str) {
        self.traced_async(async {
            self.socket.start(url).await;
            if self.config().heartbeat {
                let mut heartbeat = self.heartbeat.lock();
                if heartbeat.as_ref().map_or(true, |h| !h.is_running()) {
                    debug!("Starting heartbeat");
                    *heartbeat = Some(Heartbeat::start(self.socket.clone()));
                }
            }
        })
        .await
    }

    /// Starts connecting to the configured URL.
    pub async fn start_default(&self) {
        let url = self.config().url.clone();
        self.start(&url).await
    }

    /// Host tick. Notices a dropped transport, runs ack callbacks, then
    /// delivers queued events, all on the calling thread.
    pub fn update(&self) -> usize {
        self.traced(|| self.socket.update())
    }

    pub fn on<F>(&self, name: impl Into<String>, callback: F) -> Listener
    where
        F: Fn(&SocketIoEvent) + Send + Sync + 'static,
    {
        self.traced(|| self.socket.on(name, callback))
    }

    pub fn off(&self, name: &str, listener: &Listener) -> bool {
        self.traced(|| self.socket.off(name, listener))
    }

    pub async fn emit(&self, name: &str) {
        self.traced_async(self.socket.emit(name)).await
    }

    pub async fn emit_with(&self, name: &str, payload: Value) {
        self.traced_async(self.socket.emit_with(name, payload)).await
    }

    pub async fn emit_with_ack<F>(&self, name: &str, callback: F) -> u64
    where
        F: FnOnce(Value) + Send + 'static,
    {
        self.traced_async(self.socket.emit_with_ack(name, callback))
            .await
    }

    pub async fn emit_with_payload_and_ack<F>(&self, name: &str, payload: Value, callback: F) -> u64
    where
        F: FnOnce(Value) + Send + 'static,
    {
        self.traced_async(self.socket.emit_with_payload_and_ack(name, payload, callback))
            .await
    }

    /// Sends DISCONNECT and CLOSE, then stops the heartbeat and the
    /// connection loop. The client stays down until started again.
    pub async fn disconnect(&self) {
        self.traced_async(async {
            if let Some(heartbeat) = self.heartbeat.lock().take() {
                heartbeat.stop();
            }
            self.socket.disconnect().await;
        })
        .await
    }

    /// Graceful teardown: stops both loops and waits up to the configured
    /// grace period for each, closing the transport.
    pub async fn shutdown(&self) {
        self.traced_async(async {
            info!("Shutting down client");
            let heartbeat = self.heartbeat.lock().take();
            if let Some(heartbeat) = heartbeat {
                heartbeat.shutdown(self.config().shutdown_grace).await;
            }
            self.socket.shutdown().await;
        })
        .await
    }

    /// Forced teardown for when the host cannot wait. Tasks are cancelled at
    /// their next await point and the transport is left unclosed.
    pub fn abort(&self) {
        self.traced(|| {
            if let Some(mut heartbeat) = self.heartbeat.lock().take() {
                heartbeat.abort();
            }
            self.socket.abort();
        })
    }
}

impl<T: Transport> Drop for Client<T> {
    fn drop(&mut self) {
        if let Some(heartbeat) = self.heartbeat.get_mut().take() {
            heartbeat.stop();
        }
        self.socket.stop();
    }
}
