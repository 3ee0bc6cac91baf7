//! Client-side heartbeat watchdog.
//!
//! While the socket is connected the watchdog sends a PING, waits for a
//! `pong` (or a server `ping`) and forces a disconnect when neither arrives
//! within `ping_timeout`. The connection loop is then restarted so the
//! session recovers on its own.

use crate::events::Listener;
use crate::models::{lifecycle, Packet};
use crate::runner::BackgroundLoop;
use crate::socket::Socket;
use crate::transport::Transport;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

#[derive(Debug, Default)]
struct PingState {
    /// A ping is out and nothing has answered yet.
    pinging: AtomicBool,
    /// Something answered the last ping.
    answered: AtomicBool,
    /// Set once the watchdog is told to stop.
    stopped: AtomicBool,
}

impl PingState {
    fn mark_alive(&self) {
        self.answered.store(true, Ordering::Release);
        self.pinging.store(false, Ordering::Release);
    }
}

/// Heartbeat watchdog bound to one socket.
#[derive(derive_more::Debug)]
pub struct Heartbeat<T: Transport> {
    #[debug(skip)]
    socket: Socket<T>,
    runner: BackgroundLoop,
    state: Arc<PingState>,
    #[debug(skip)]
    listeners: Mutex<Vec<(&'static str, Listener)>>,
}

impl<T: Transport> Heartbeat<T> {
    /// Subscribes to the socket's liveness events and starts the watchdog
    /// loop with the socket's configured interval and timeout.
    pub fn start(socket: Socket<T>) -> Self {
        let state = Arc::new(PingState::default());

        let listeners: Vec<_> = [lifecycle::PONG, lifecycle::PING]
            .into_iter()
            .map(|name| {
                let state = state.clone();
                (name, socket.on(name, move |_| state.mark_alive()))
            })
            .collect();

        let beat_socket = socket.clone();
        let beat_state = state.clone();
        let runner = BackgroundLoop::start(
            "heartbeat",
            move || {
                let socket = beat_socket.clone();
                let state = beat_state.clone();
                async move { beat(&socket, &state).await }
            },
            None,
        );

        Heartbeat {
            socket,
            runner,
            state,
            listeners: Mutex::new(listeners),
        }
    }

    pub fn is_running(&self) -> bool {
        self.runner.is_running()
    }

    /// Stops the watchdog after its current iteration.
    pub fn stop(&self) {
        self.runner.stop();
        self.unsubscribe();
    }

    /// Cancels the watchdog immediately.
    pub fn abort(&mut self) {
        self.runner.abort();
        self.unsubscribe();
    }

    /// Stops the watchdog, waiting up to `grace` for the current iteration.
    pub async fn shutdown(self, grace: Duration) {
        self.unsubscribe();
        self.runner.shutdown(grace).await;
    }

    fn unsubscribe(&self) {
        self.state.stopped.store(true, Ordering::Release);
        let listeners = std::mem::take(&mut *self.listeners.lock());
        for (name, listener) in listeners {
            self.socket.off(name, &listener);
        }
    }
}

async fn beat<T: Transport>(socket: &Socket<T>, state: &PingState) {
    let config = socket.config();
    if !socket.is_connected() {
        sleep(config.heartbeat_retry_delay).await;
        return;
    }

    state.pinging.store(true, Ordering::Release);
    state.answered.store(false, Ordering::Release);
    socket.emit_packet(&Packet::ping()).await;
    let started = Instant::now();

    while socket.is_connected()
        && state.pinging.load(Ordering::Acquire)
        && started.elapsed() < config.ping_timeout
    {
        sleep(config.ping_poll).await;
    }

    if state.answered.load(Ordering::Acquire) {
        debug!("Heartbeat answered after {:?}", started.elapsed());
    } else if socket.is_connected() {
        warn!("Ping timeout after {:?}, disconnecting", config.ping_timeout);
        socket.disconnect().await;
        if state.stopped.load(Ordering::Acquire) {
            debug!("Heartbeat stopped, not restarting the connection");
        } else {
            socket.restart_connection().await;
        }
    } else {
        debug!("Connection dropped while waiting for pong");
    }

    sleep(config.ping_interval).await;
}
