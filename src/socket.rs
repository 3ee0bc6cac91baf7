//! Connection management and packet dispatch.
//!
//! A [`Socket`] owns the transport, keeps it connected from a background
//! loop, and routes every inbound frame into the event bus or the ack
//! registry. Application callbacks never run on the receiving task except for
//! lifecycle events; everything else waits for [`Socket::update`].

use crate::ack::AckRegistry;
use crate::backoff::{FixedDelay, ReconnectStrategy};
use crate::codec;
use crate::config::ClientConfig;
use crate::events::{EventBus, Listener};
use crate::models::{
    lifecycle, EnginePacketType, Handshake, Packet, SocketIoEvent, SocketPacketType,
};
use crate::runner::BackgroundLoop;
use crate::transport::{EventSink, Transport, TransportEvent};
use futures::FutureExt;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::instrument::WithSubscriber;
use tracing::{debug, error, info, warn};

struct Shared<T: Transport> {
    transport: Arc<T>,
    config: ClientConfig,
    reconnect: Mutex<Arc<dyn ReconnectStrategy>>,
    bus: EventBus,
    acks: AckRegistry,
    connected: AtomicBool,
    next_id: AtomicU64,
    attempts: AtomicU32,
    handshake: Mutex<Option<Handshake>>,
    url: Mutex<Option<String>>,
    events_tx: Mutex<Option<EventSink>>,
    inbound: Mutex<Option<JoinHandle<()>>>,
    connection: Mutex<Option<BackgroundLoop>>,
}

/// A Socket.IO connection. Cloning yields another handle to the same
/// connection.
pub struct Socket<T: Transport> {
    shared: Arc<Shared<T>>,
}

impl<T: Transport> Clone for Socket<T> {
    fn clone(&self) -> Self {
        Socket {
            shared: self.shared.clone(),
        }
    }
}

impl<T: Transport> std::fmt::Debug for Socket<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Socket")
            .field("connected", &self.is_connected())
            .field("url", &*self.shared.url.lock())
            .field("acks", &self.shared.acks)
            .finish_non_exhaustive()
    }
}

impl<T: Transport> Socket<T> {
    pub fn new(transport: T, config: ClientConfig) -> Self {
        let reconnect: Arc<dyn ReconnectStrategy> = Arc::new(FixedDelay(config.reconnect_delay));
        Socket {
            shared: Arc::new(Shared {
                transport: Arc::new(transport),
                acks: AckRegistry::new(config.ack_expiration),
                config,
                reconnect: Mutex::new(reconnect),
                bus: EventBus::new(),
                connected: AtomicBool::new(false),
                next_id: AtomicU64::new(0),
                attempts: AtomicU32::new(0),
                handshake: Mutex::new(None),
                url: Mutex::new(None),
                events_tx: Mutex::new(None),
                inbound: Mutex::new(None),
                connection: Mutex::new(None),
            }),
        }
    }

    /// Replaces the delay policy used after failed connects.
    pub fn set_reconnect_strategy(&self, strategy: Arc<dyn ReconnectStrategy>) {
        *self.shared.reconnect.lock() = strategy;
    }

    pub fn transport(&self) -> &T {
        &self.shared.transport
    }

    pub fn config(&self) -> &ClientConfig {
        &self.shared.config
    }

    pub fn bus(&self) -> &EventBus {
        &self.shared.bus
    }

    pub fn acks(&self) -> &AckRegistry {
        &self.shared.acks
    }

    /// Handshake of the current session, once the server has sent OPEN.
    /// Cleared when the socket disconnects.
    pub fn handshake(&self) -> Option<Handshake> {
        self.shared.handshake.lock().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }

    /// Records the connection state. Only an actual change raises
    /// `connect` or `disconnect`, exactly once per transition.
    pub fn set_connected(&self, connected: bool) {
        if self.shared.connected.swap(connected, Ordering::AcqRel) == connected {
            return;
        }
        if connected {
            info!("Socket connected");
            self.shared.bus.raise_named(lifecycle::CONNECT);
        } else {
            info!("Socket disconnected");
            self.shared.handshake.lock().take();
            self.shared.bus.raise_named(lifecycle::DISCONNECT);
        }
    }

    pub fn on<F>(&self, name: impl Into<String>, callback: F) -> Listener
    where
        F: Fn(&SocketIoEvent) + Send + Sync + 'static,
    {
        self.shared.bus.on(name, callback)
    }

    pub fn off(&self, name: &str, listener: &Listener) -> bool {
        self.shared.bus.off(name, listener)
    }

    /// Starts the connection loop for `url`. Does nothing if a loop is
    /// already running. A previously stopped loop is allowed to finish its
    /// exit action first.
    pub async fn start(&self, url: &str) {
        let previous = {
            let mut connection = self.shared.connection.lock();
            if connection.as_ref().is_some_and(BackgroundLoop::is_running) {
                warn!("Socket already started, ignoring start({})", url);
                return;
            }
            connection.take()
        };
        if let Some(previous) = previous {
            previous.shutdown(self.shared.config.shutdown_grace).await;
        }
        info!("Starting socket for {}", url);
        *self.shared.url.lock() = Some(url.to_string());
        self.ensure_inbound();
        self.spawn_connection_loop(url.to_string());
    }

    /// Stops the current connection loop, waits for it to close the
    /// transport, then starts a fresh one for the last URL.
    pub async fn restart_connection(&self) {
        let previous = self.shared.connection.lock().take();
        if let Some(previous) = previous {
            previous.shutdown(self.shared.config.shutdown_grace).await;
        }
        let url = self.shared.url.lock().clone();
        match url {
            Some(url) => {
                info!("Restarting connection to {}", url);
                self.ensure_inbound();
                self.spawn_connection_loop(url);
            }
            None => debug!("Socket never started, nothing to restart"),
        }
    }

    fn ensure_inbound(&self) {
        let mut events_tx = self.shared.events_tx.lock();
        if events_tx.is_some() {
            return;
        }
        let (tx, rx) = mpsc::unbounded_channel();
        *events_tx = Some(tx);
        let task = tokio::spawn(
            dispatch_inbound(Arc::downgrade(&self.shared), rx).with_current_subscriber(),
        );
        *self.shared.inbound.lock() = Some(task);
    }

    fn spawn_connection_loop(&self, url: String) {
        let socket = self.clone();
        let transport = self.shared.transport.clone();
        let runner = BackgroundLoop::start(
            "connection",
            move || {
                let socket = socket.clone();
                let url = url.clone();
                async move { socket.connection_step(&url).await }
            },
            Some(
                async move {
                    debug!("Closing transport");
                    if let Err(e) = transport.close().await {
                        error!("Failed to close transport: {}", e);
                    }
                }
                .boxed(),
            ),
        );
        if let Some(previous) = self.shared.connection.lock().replace(runner) {
            previous.stop();
        }
    }

    async fn connection_step(&self, url: &str) {
        let shared = &self.shared;
        if shared.transport.is_connected() {
            tokio::time::sleep(shared.config.reconnect_delay).await;
            return;
        }

        let events = shared.events_tx.lock().clone();
        let Some(events) = events else {
            warn!("No inbound channel, delaying connect");
            tokio::time::sleep(shared.config.reconnect_delay).await;
            return;
        };

        debug!("Connecting to {}", url);
        match shared.transport.connect(url, events).await {
            Ok(()) => {
                shared.attempts.store(0, Ordering::Relaxed);
                debug!("Transport connected to {}", url);
            }
            Err(e) => {
                let attempt = shared.attempts.fetch_add(1, Ordering::Relaxed);
                error!("Connect to {} failed (attempt {}): {}", url, attempt + 1, e);
                let delay = shared.reconnect.lock().next_delay(attempt);
                tokio::time::sleep(delay).await;
            }
        }
    }

    /// Routes one transport event.
    pub(crate) async fn handle_transport_event(&self, event: TransportEvent) {
        match event {
            TransportEvent::Open => debug!("Transport open"),
            TransportEvent::Close => {
                info!("Transport closed");
                self.set_connected(false);
                self.shared.bus.raise_named(lifecycle::CLOSE);
            }
            TransportEvent::Error(message) => {
                error!("Transport error: {}", message);
                self.shared.bus.raise(&SocketIoEvent::with_payload(
                    lifecycle::ERROR,
                    Some(Value::String(message)),
                ));
            }
            TransportEvent::Message(text) => self.handle_frame(&text).await,
        }
    }

    /// Decodes a raw frame and dispatches it. Malformed frames are dropped.
    pub(crate) async fn handle_frame(&self, text: &str) {
        debug!("Raw message: {}", text);
        match codec::decode(text) {
            Ok(packet) => self.handle_packet(packet).await,
            Err(e) => warn!("Dropping malformed frame {:?}: {}", text, e),
        }
    }

    async fn handle_packet(&self, packet: Packet) {
        let bus = &self.shared.bus;
        match packet.engine_type {
            EnginePacketType::Open => {
                match packet
                    .payload
                    .clone()
                    .map(serde_json::from_value::<Handshake>)
                {
                    Some(Ok(handshake)) => {
                        info!("Session opened, sid: {}", handshake.sid);
                        *self.shared.handshake.lock() = Some(handshake);
                    }
                    Some(Err(e)) => warn!("Unreadable handshake: {}", e),
                    None => warn!("OPEN packet without handshake"),
                }
                if self.shared.config.connect_namespace {
                    let namespace = self.shared.config.namespace.clone();
                    self.emit_packet(&Packet::message(SocketPacketType::Connect, namespace, None, None))
                        .await;
                }
                bus.raise(&SocketIoEvent::with_payload(lifecycle::OPEN, packet.payload));
                self.set_connected(true);
            }
            EnginePacketType::Close => {
                self.set_connected(false);
                bus.raise_named(lifecycle::CLOSE);
            }
            EnginePacketType::Ping => {
                self.emit_packet(&Packet::pong()).await;
                bus.raise_named(lifecycle::PING);
            }
            EnginePacketType::Pong => bus.raise_named(lifecycle::PONG),
            EnginePacketType::Message => self.handle_message(packet),
            other => warn!("Unknown engine packet: {:?}", other),
        }
    }

    fn handle_message(&self, packet: Packet) {
        match packet.socket_type {
            Some(SocketPacketType::Ack) => {
                self.shared.acks.match_and_queue(packet);
            }
            Some(SocketPacketType::Event) => {
                if packet.payload.is_none() {
                    warn!("Null event message");
                    return;
                }
                match codec::parse_event(packet.payload.as_ref()) {
                    Ok(event) => self.shared.bus.enqueue(event),
                    Err(e) => error!("Invalid event payload {:?}: {}", packet.payload, e),
                }
            }
            Some(SocketPacketType::Error) => {
                warn!("Server error on {}: {:?}", packet.namespace, packet.payload);
                self.shared
                    .bus
                    .raise(&SocketIoEvent::with_payload(lifecycle::ERROR, packet.payload));
            }
            other => debug!("Ignoring {:?} packet on {}", other, packet.namespace),
        }
    }

    /// Fire-and-forget emit of a payload-less event.
    pub async fn emit(&self, name: &str) {
        self.emit_event(name, None, None).await;
    }

    /// Fire-and-forget emit with a payload.
    pub async fn emit_with(&self, name: &str, payload: Value) {
        self.emit_event(name, Some(payload), None).await;
    }

    /// Emits and calls `callback` with the server's acknowledgement, during
    /// a later [`update`](Self::update). Returns the packet id.
    pub async fn emit_with_ack<F>(&self, name: &str, callback: F) -> u64
    where
        F: FnOnce(Value) + Send + 'static,
    {
        self.emit_event(name, None, Some(Box::new(callback)))
            .await
            .unwrap_or_default()
    }

    /// Emits a payload and waits for an acknowledgement. Returns the packet id.
    pub async fn emit_with_payload_and_ack<F>(&self, name: &str, payload: Value, callback: F) -> u64
    where
        F: FnOnce(Value) + Send + 'static,
    {
        self.emit_event(name, Some(payload), Some(Box::new(callback)))
            .await
            .unwrap_or_default()
    }

    async fn emit_event(
        &self,
        name: &str,
        payload: Option<Value>,
        callback: Option<crate::ack::AckCallback>,
    ) -> Option<u64> {
        // Registered before sending so a fast reply always finds its ack.
        let id = callback.map(|callback| {
            let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed) + 1;
            self.shared.acks.register(id, callback);
            id
        });
        let packet = Packet::message(
            SocketPacketType::Event,
            self.shared.config.namespace.clone(),
            id,
            Some(codec::event_payload(name, payload)),
        );
        self.emit_packet(&packet).await;
        id
    }

    /// Encodes and sends a packet. Send failures are logged, never returned.
    pub async fn emit_packet(&self, packet: &Packet) {
        let frame = codec::encode(packet);
        info!("Emitting packet: {}", frame);
        if let Err(e) = self.shared.transport.send(frame).await {
            error!("Failed to emit packet: {}", e);
        }
    }

    /// Sends DISCONNECT and CLOSE, then stops the connection loop. The loop
    /// closes the transport once its current iteration ends.
    pub async fn disconnect(&self) {
        info!("Disconnecting");
        let namespace = self.shared.config.namespace.clone();
        self.emit_packet(&Packet::message(SocketPacketType::Disconnect, namespace, None, None))
            .await;
        self.emit_packet(&Packet::close()).await;
        self.stop();
    }

    /// Stops the connection loop cooperatively.
    pub fn stop(&self) {
        if let Some(runner) = self.shared.connection.lock().as_ref() {
            runner.stop();
        }
    }

    /// Host tick: notices a transport that went down, runs matched ack
    /// callbacks, then delivers queued events. Returns the number of
    /// callbacks and events delivered.
    ///
    /// The transport read-back can only lower the connected flag. Raising it
    /// is left to the engine OPEN so `open` always precedes `connect`.
    pub fn update(&self) -> usize {
        if !self.shared.transport.is_connected() {
            self.set_connected(false);
        }
        let acks = self.shared.acks.drain();
        let events = self.shared.bus.process_events();
        acks + events
    }

    /// Stops the connection loop and waits up to the configured grace period
    /// for it to close the transport.
    pub async fn shutdown(&self) {
        let runner = self.shared.connection.lock().take();
        if let Some(runner) = runner {
            runner.shutdown(self.shared.config.shutdown_grace).await;
        }
        self.stop_inbound();
    }

    /// Cancels every task without waiting. The transport is not closed.
    pub fn abort(&self) {
        if let Some(mut runner) = self.shared.connection.lock().take() {
            runner.abort();
        }
        self.stop_inbound();
    }

    fn stop_inbound(&self) {
        self.shared.events_tx.lock().take();
        if let Some(task) = self.shared.inbound.lock().take() {
            task.abort();
        }
    }
}

async fn dispatch_inbound<T: Transport>(
    shared: Weak<Shared<T>>,
    mut rx: mpsc::UnboundedReceiver<TransportEvent>,
) {
    while let Some(event) = rx.recv().await {
        let Some(shared) = shared.upgrade() else {
            break;
        };
        Socket { shared }.handle_transport_event(event).await;
    }
    debug!("Inbound dispatch ended");
}
