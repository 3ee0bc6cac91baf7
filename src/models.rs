//! Data models for the Socket.IO client.
//!
//! This module defines the packet types exchanged with the server, the
//! `Packet` struct itself, the `SocketIoEvent` handed to subscribers and the
//! `Handshake` carried by the engine OPEN packet.

use serde::Deserialize;
use serde_json::Value;

/// Engine.IO packet types, the outermost layer of every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnginePacketType {
    /// Sent by the server once the transport is up; carries the handshake.
    Open,
    /// Either side is closing the session.
    Close,
    /// Liveness probe.
    Ping,
    /// Reply to a `Ping`.
    Pong,
    /// Carries a Socket.IO packet.
    Message,
    /// Transport upgrade. Reserved, never produced by this client.
    Upgrade,
    /// No-op. Reserved, never produced by this client.
    Noop,
}

impl EnginePacketType {
    /// Wire digit for this packet type.
    pub fn code(self) -> char {
        match self {
            EnginePacketType::Open => '0',
            EnginePacketType::Close => '1',
            EnginePacketType::Ping => '2',
            EnginePacketType::Pong => '3',
            EnginePacketType::Message => '4',
            EnginePacketType::Upgrade => '5',
            EnginePacketType::Noop => '6',
        }
    }

    /// Parses a wire digit.
    pub fn from_code(code: char) -> Option<Self> {
        match code {
            '0' => Some(EnginePacketType::Open),
            '1' => Some(EnginePacketType::Close),
            '2' => Some(EnginePacketType::Ping),
            '3' => Some(EnginePacketType::Pong),
            '4' => Some(EnginePacketType::Message),
            '5' => Some(EnginePacketType::Upgrade),
            '6' => Some(EnginePacketType::Noop),
            _ => None,
        }
    }
}

/// Socket.IO packet types, only meaningful inside an engine `Message`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketPacketType {
    Connect,
    Disconnect,
    Event,
    Ack,
    Error,
}

impl SocketPacketType {
    /// Wire digit for this packet type.
    pub fn code(self) -> char {
        match self {
            SocketPacketType::Connect => '0',
            SocketPacketType::Disconnect => '1',
            SocketPacketType::Event => '2',
            SocketPacketType::Ack => '3',
            SocketPacketType::Error => '4',
        }
    }

    /// Parses a wire digit. Binary event/ack digits are not accepted here.
    pub fn from_code(code: char) -> Option<Self> {
        match code {
            '0' => Some(SocketPacketType::Connect),
            '1' => Some(SocketPacketType::Disconnect),
            '2' => Some(SocketPacketType::Event),
            '3' => Some(SocketPacketType::Ack),
            '4' => Some(SocketPacketType::Error),
            _ => None,
        }
    }
}

/// Represents a decoded protocol packet.
///
/// `socket_type` is `Some` exactly when `engine_type` is `Message`. `id` is
/// `None` for fire-and-forget emissions and set when an acknowledgement is
/// requested or being answered.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    /// The Engine.IO layer type.
    pub engine_type: EnginePacketType,
    /// The Socket.IO layer type.
    pub socket_type: Option<SocketPacketType>,
    /// Namespace the packet belongs to, `/` for the root namespace.
    pub namespace: String,
    /// Acknowledgement correlation id.
    pub id: Option<u64>,
    /// JSON payload, if any.
    pub payload: Option<Value>,
}

impl Packet {
    /// Creates a bare engine packet with no payload.
    pub fn engine(engine_type: EnginePacketType) -> Self {
        Packet {
            engine_type,
            socket_type: None,
            namespace: "/".to_string(),
            id: None,
            payload: None,
        }
    }

    /// Creates a Socket.IO packet wrapped in an engine `Message`.
    pub fn message(
        socket_type: SocketPacketType,
        namespace: impl Into<String>,
        id: Option<u64>,
        payload: Option<Value>,
    ) -> Self {
        Packet {
            engine_type: EnginePacketType::Message,
            socket_type: Some(socket_type),
            namespace: namespace.into(),
            id,
            payload,
        }
    }

    pub fn ping() -> Self {
        Packet::engine(EnginePacketType::Ping)
    }

    pub fn pong() -> Self {
        Packet::engine(EnginePacketType::Pong)
    }

    pub fn close() -> Self {
        Packet::engine(EnginePacketType::Close)
    }
}

/// An application-level event decoded from an EVENT packet, or a lifecycle
/// event raised by the client itself.
#[derive(Debug, Clone, PartialEq)]
pub struct SocketIoEvent {
    /// Event name, the first element of the EVENT array.
    pub name: String,
    /// Remaining arguments. A single argument is carried as-is, several are
    /// carried as an array.
    pub payload: Option<Value>,
}

impl SocketIoEvent {
    pub fn new(name: impl Into<String>) -> Self {
        SocketIoEvent {
            name: name.into(),
            payload: None,
        }
    }

    pub fn with_payload(name: impl Into<String>, payload: Option<Value>) -> Self {
        SocketIoEvent {
            name: name.into(),
            payload,
        }
    }
}

/// Session parameters sent by the server in the engine OPEN packet.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    /// Session id.
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    /// Server ping interval in milliseconds.
    #[serde(default)]
    pub ping_interval: Option<u64>,
    /// Server ping timeout in milliseconds.
    #[serde(default)]
    pub ping_timeout: Option<u64>,
    #[serde(default)]
    pub max_payload: Option<u64>,
}

/// Names of the lifecycle events the client raises synchronously.
pub mod lifecycle {
    pub const CONNECT: &str = "connect";
    pub const DISCONNECT: &str = "disconnect";
    pub const OPEN: &str = "open";
    pub const CLOSE: &str = "close";
    pub const ERROR: &str = "error";
    pub const PING: &str = "ping";
    pub const PONG: &str = "pong";
}
