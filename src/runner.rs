//! Repeat-until-stopped background execution.
//!
//! `BackgroundLoop` drives both the connection manager and the heartbeat
//! watchdog. The loop body runs on its own tokio task and is re-invoked
//! while the running flag is set.

use crate::utils::panic_message;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::instrument::WithSubscriber;
use tracing::{debug, error, warn};

/// A task that repeatedly runs a unit of work until stopped.
#[derive(derive_more::Debug)]
pub struct BackgroundLoop {
    name: &'static str,
    running: Arc<AtomicBool>,
    #[debug(skip)]
    handle: Option<JoinHandle<()>>,
}

impl BackgroundLoop {
    /// Spawns the loop.
    ///
    /// `work` is called again each time the future it returned completes, for
    /// as long as the loop is running. A panic inside one iteration is logged
    /// and the loop carries on. Once the loop is stopped, `on_exit` runs once
    /// before the task ends.
    ///
    /// The task logs through the subscriber that is current when `start` is
    /// called.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<W, F>(
        name: &'static str,
        mut work: W,
        on_exit: Option<BoxFuture<'static, ()>>,
    ) -> Self
    where
        W: FnMut() -> F + Send + 'static,
        F: Future<Output = ()> + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();

        let task = async move {
            debug!("{} loop started", name);
            while flag.load(Ordering::Acquire) {
                if let Err(panic) = AssertUnwindSafe(work()).catch_unwind().await {
                    error!(
                        "{} loop iteration panicked: {}",
                        name,
                        panic_message(panic.as_ref())
                    );
                    tokio::task::yield_now().await;
                }
            }
            if let Some(on_exit) = on_exit {
                debug!("Running {} loop exit action", name);
                on_exit.await;
            }
            debug!("{} loop exited", name);
        };

        BackgroundLoop {
            name,
            running,
            handle: Some(tokio::spawn(task.with_current_subscriber())),
        }
    }

    /// Clears the running flag. The current iteration finishes and the exit
    /// action runs afterwards; nothing is interrupted.
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::AcqRel) {
            debug!("Stopping {} loop", self.name);
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Returns `true` once the task has ended, whether stopped or aborted.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Stops the loop and cancels its task at the next await point without
    /// waiting for the current iteration.
    ///
    /// This is a last resort for host teardown: the exit action does not run,
    /// so whatever it would have released (the transport, for the connection
    /// loop) is left as is. Prefer [`shutdown`](Self::shutdown).
    pub fn abort(&mut self) {
        self.stop();
        if let Some(handle) = self.handle.take() {
            warn!("Aborting {} loop", self.name);
            handle.abort();
        }
    }

    /// Stops the loop and waits up to `grace` for the current iteration and
    /// the exit action to finish, aborting the task if they do not.
    pub async fn shutdown(mut self, grace: Duration) {
        self.stop();
        let Some(handle) = self.handle.take() else {
            return;
        };
        let abort = handle.abort_handle();
        match tokio::time::timeout(grace, handle).await {
            Ok(Ok(())) => debug!("{} loop shut down", self.name),
            Ok(Err(e)) => warn!("{} loop task failed: {}", self.name, e),
            Err(_) => {
                warn!(
                    "{} loop did not stop within {:?}, aborting",
                    self.name, grace
                );
                abort.abort();
            }
        }
    }
}
