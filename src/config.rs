//! Configuration module for the Socket.IO client.
//!
//! This module defines the `ClientConfig` struct. Every duration carries its
//! unit in the field's serialized name.

use serde::Deserialize;
use std::time::Duration;

/// Client configuration struct.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Endpoint used when `start` is called without an explicit URL.
    pub url: String,

    /// Namespace events are emitted on.
    pub namespace: String,

    /// Idle delay of the connection loop while connected, and the retry delay
    /// after a failed connect.
    #[serde(
        rename = "reconnect_delay_ms",
        deserialize_with = "crate::utils::deserialize_duration_millis"
    )]
    pub reconnect_delay: Duration,

    /// Interval between heartbeat pings.
    #[serde(
        rename = "ping_interval_secs",
        deserialize_with = "crate::utils::deserialize_duration"
    )]
    pub ping_interval: Duration,

    /// How long the heartbeat waits for a pong before forcing a disconnect.
    #[serde(
        rename = "ping_timeout_secs",
        deserialize_with = "crate::utils::deserialize_duration"
    )]
    pub ping_timeout: Duration,

    /// Poll step while waiting for a pong.
    #[serde(
        rename = "ping_poll_ms",
        deserialize_with = "crate::utils::deserialize_duration_millis"
    )]
    pub ping_poll: Duration,

    /// Heartbeat sleep while the socket is disconnected.
    #[serde(
        rename = "heartbeat_retry_delay_ms",
        deserialize_with = "crate::utils::deserialize_duration_millis"
    )]
    pub heartbeat_retry_delay: Duration,

    /// Age after which an unanswered ack is dropped.
    #[serde(
        rename = "ack_expiration_secs",
        deserialize_with = "crate::utils::deserialize_duration"
    )]
    pub ack_expiration: Duration,

    /// Whether `Client::start` also starts the heartbeat watchdog.
    pub heartbeat: bool,

    /// Send a Socket.IO CONNECT for `namespace` after the engine handshake.
    pub connect_namespace: bool,

    /// How long a cooperative shutdown may take before the task is aborted.
    #[serde(
        rename = "shutdown_grace_ms",
        deserialize_with = "crate::utils::deserialize_duration_millis"
    )]
    pub shutdown_grace: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            url: "ws://127.0.0.1:3000/socket.io/?EIO=4&transport=websocket".to_string(),
            namespace: "/".to_string(),
            reconnect_delay: Duration::from_millis(500),
            ping_interval: Duration::from_secs(25),
            ping_timeout: Duration::from_secs(60),
            ping_poll: Duration::from_millis(200),
            heartbeat_retry_delay: Duration::from_millis(5),
            ack_expiration: Duration::from_secs(1800),
            heartbeat: true,
            connect_namespace: true,
            shutdown_grace: Duration::from_secs(1),
        }
    }
}
