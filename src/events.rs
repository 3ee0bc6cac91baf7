//! Event subscriptions and deferred delivery.
//!
//! Events decoded from the network are queued on whatever task received them
//! and only handed to subscribers when the host calls
//! [`EventBus::process_events`]. Lifecycle events bypass the queue and are
//! raised immediately on the task that produced them, so a subscriber may see
//! `connect` on a background task and a data event later on the host thread.

use crate::models::SocketIoEvent;
use crate::utils::panic_message;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Subscriber callback. Identity (the `Arc` pointer) is what `off` matches on.
pub type Listener = Arc<dyn Fn(&SocketIoEvent) + Send + Sync>;

/// Name-keyed subscriber registry plus the pending event queue.
#[derive(Default, derive_more::Debug)]
pub struct EventBus {
    #[debug(skip)]
    listeners: Mutex<HashMap<String, Vec<Listener>>>,
    queue: Mutex<VecDeque<SocketIoEvent>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback` for `name` and returns the handle to pass to
    /// [`off`](Self::off).
    pub fn on<F>(&self, name: impl Into<String>, callback: F) -> Listener
    where
        F: Fn(&SocketIoEvent) + Send + Sync + 'static,
    {
        let listener: Listener = Arc::new(callback);
        self.add_listener(name, listener.clone());
        listener
    }

    /// Appends an existing listener for `name`. The same listener may be
    /// registered more than once and is then invoked once per registration.
    pub fn add_listener(&self, name: impl Into<String>, listener: Listener) {
        let name = name.into();
        debug!("Adding listener for {}", name);
        self.listeners.lock().entry(name).or_default().push(listener);
    }

    /// Removes one registration of `listener` for `name`. Returns `false`
    /// with a warning when nothing matched.
    pub fn off(&self, name: &str, listener: &Listener) -> bool {
        let mut listeners = self.listeners.lock();
        let Some(registered) = listeners.get_mut(name) else {
            warn!("No callbacks registered for event: {}", name);
            return false;
        };
        let Some(index) = registered.iter().position(|l| Arc::ptr_eq(l, listener)) else {
            warn!("Couldn't remove callback for event: {}", name);
            return false;
        };
        registered.remove(index);
        if registered.is_empty() {
            listeners.remove(name);
        }
        debug!("Removed listener for {}", name);
        true
    }

    /// Number of listeners registered for `name`.
    pub fn listener_count(&self, name: &str) -> usize {
        self.listeners.lock().get(name).map_or(0, Vec::len)
    }

    /// Names with at least one listener.
    pub fn event_names(&self) -> Vec<String> {
        self.listeners.lock().keys().cloned().collect()
    }

    /// Invokes every listener for the event's name, in registration order, on
    /// the calling task. A panicking listener is logged and the rest still run.
    pub fn raise(&self, event: &SocketIoEvent) {
        // Snapshot so listeners can call on/off without deadlocking.
        let listeners = match self.listeners.lock().get(&event.name) {
            Some(listeners) => listeners.clone(),
            None => return,
        };
        for listener in listeners {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| listener(event))) {
                error!(
                    "Listener for {} panicked: {}",
                    event.name,
                    panic_message(panic.as_ref())
                );
            }
        }
    }

    /// Raises a payload-less event by name.
    pub fn raise_named(&self, name: &str) {
        self.raise(&SocketIoEvent::new(name));
    }

    /// Queues an event for the next [`process_events`](Self::process_events).
    pub fn enqueue(&self, event: SocketIoEvent) {
        debug!("Queueing event {}", event.name);
        self.queue.lock().push_back(event);
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Delivers every queued event in FIFO order. The queue lock is released
    /// before any listener runs. Returns the number of events delivered.
    pub fn process_events(&self) -> usize {
        let events = std::mem::take(&mut *self.queue.lock());
        let count = events.len();
        for event in events {
            self.raise(&event);
        }
        count
    }
}
