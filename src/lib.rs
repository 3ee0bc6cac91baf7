//! # Socket.IO Client
//!
//! This library provides an Engine.IO / Socket.IO v4 client for hosts that
//! need control over *where* application callbacks run, such as game loops
//! and UI toolkits that forbid cross-thread calls.
//! It's built on top of Tokio and tokio-tungstenite.
//!
//! ## Features
//!
//! - Persistent connection with automatic reconnection
//! - Publish/Subscribe style event listeners
//! - Acknowledgement callbacks correlated by packet id, with expiry
//! - Client heartbeat watchdog that recovers from stalled servers
//! - Events delivered only when the host calls `update()`
//!
//! ## Main Components
//!
//! - `Client`: The host-facing surface bundling the socket and its heartbeat.
//! - `Socket`: Owns the transport, runs the connection loop and dispatches packets.
//! - `EventBus`: Listener registry plus the queue of events awaiting delivery.
//! - `AckRegistry`: Outstanding acknowledgement callbacks.
//! - `Heartbeat`: Ping/pong watchdog.
//! - `BackgroundLoop`: The repeat-until-stopped task behind the socket and the heartbeat.
//! - `codec`: Text frame encoding and decoding.
//! - `Transport`: The text-frame transport seam, implemented by `WsTransport`.
//! - `Config`: Client configuration.
//!
//! ## Getting Started
//!
//! ```no_run
//! use socketio_client::{Client, ClientConfig};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = Client::websocket(ClientConfig::default());
//!
//!     client.on("connect", |_| println!("connected"));
//!     client.on("chat", |event| println!("chat: {:?}", event.payload));
//!
//!     client.start("ws://127.0.0.1:3000/socket.io/?EIO=4&transport=websocket").await;
//!
//!     client
//!         .emit_with_payload_and_ack("join", json!({"room": "lobby"}), |reply| {
//!             println!("joined: {reply}");
//!         })
//!         .await;
//!
//!     // Host tick: callbacks for acks and events run here, on this task.
//!     loop {
//!         client.update();
//!         tokio::time::sleep(std::time::Duration::from_millis(16)).await;
//!     }
//! }
//! ```
//!
//! ## Threading Model
//!
//! Frames are decoded on an internal task and queued. Event and ack callbacks
//! only run inside `update()`. The lifecycle events `connect`, `disconnect`,
//! `open`, `close`, `error`, `ping` and `pong` are the exception: they are
//! raised immediately on whichever internal task observed them.
//!
//! ## Logging
//!
//! Everything is logged through `tracing`. Without a subscriber nothing is
//! emitted. `Client::with_dispatch` scopes the client to a dedicated
//! dispatcher.

mod ack;
mod backoff;
mod client;
pub mod codec;
mod config;
mod error;
mod events;
mod heartbeat;
mod models;
mod runner;
mod socket;
mod transport;
mod utils;

pub use ack::*;
pub use backoff::*;
pub use client::*;
pub use config::*;
pub use error::*;
pub use events::*;
pub use heartbeat::*;
pub use models::*;
pub use runner::*;
pub use socket::*;
pub use transport::*;

#[cfg(test)]
#[path = "tests/mock_transport.rs"]
mod mock_transport;

#[cfg(test)]
#[path = "tests/test_codec.rs"]
mod test_codec;

#[cfg(test)]
#[path = "tests/test_events.rs"]
mod test_events;

#[cfg(test)]
#[path = "tests/test_acks.rs"]
mod test_acks;

#[cfg(test)]
#[path = "tests/test_backoff.rs"]
mod test_backoff;

#[cfg(test)]
#[path = "tests/test_runner.rs"]
mod test_runner;

#[cfg(test)]
#[path = "tests/test_socket.rs"]
mod test_socket;

#[cfg(test)]
#[path = "tests/test_heartbeat.rs"]
mod test_heartbeat;

#[cfg(test)]
#[path = "tests/test_websocket.rs"]
mod test_websocket;

#[cfg(test)]
#[path = "tests/test_client.rs"]
mod test_client;
