//! Error types for the transport and the packet codec.

use thiserror::Error;

/// Errors raised by a [`Transport`](crate::Transport) implementation.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The connection attempt failed.
    #[error("connect failed: {message}")]
    Connect { message: String },

    /// A frame could not be written.
    #[error("send failed: {message}")]
    Send { message: String },

    /// Closing the connection failed.
    #[error("close failed: {message}")]
    Close { message: String },

    /// The operation needs an open connection.
    #[error("transport is not connected")]
    NotConnected,

    /// Underlying WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

impl TransportError {
    pub fn connect(message: impl Into<String>) -> Self {
        Self::Connect {
            message: message.into(),
        }
    }

    pub fn send(message: impl Into<String>) -> Self {
        Self::Send {
            message: message.into(),
        }
    }
}

/// Errors raised while decoding a text frame into a [`Packet`](crate::Packet).
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("empty frame")]
    Empty,

    #[error("unknown engine packet type {0:?}")]
    UnknownEngineType(char),

    #[error("message frame has no socket packet type")]
    MissingSocketType,

    #[error("unknown socket packet type {0:?}")]
    UnknownSocketType(char),

    #[error("binary packets are not supported (type {0:?})")]
    Binary(char),

    #[error("invalid packet id {0:?}")]
    InvalidId(String),

    #[error("malformed JSON payload: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised while turning an EVENT payload into a `SocketIoEvent`.
#[derive(Error, Debug, PartialEq)]
pub enum EventParseError {
    #[error("event payload is missing")]
    MissingPayload,

    #[error("event payload is not an array")]
    NotAnArray,

    #[error("event name is missing or not a string")]
    MissingName,
}
