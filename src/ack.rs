//! Acknowledgement correlation.
//!
//! An emit that wants a reply registers a callback under its packet id.
//! Inbound ACK packets with a matching id are queued on the receiving task
//! and the callbacks run later, during [`AckRegistry::drain`] on the host
//! thread.

use crate::models::Packet;
use crate::utils::panic_message;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info};

/// Callback invoked with the ACK payload, or `Value::Null` when it had none.
pub type AckCallback = Box<dyn FnOnce(Value) + Send>;

/// An outstanding acknowledgement.
#[derive(derive_more::Debug)]
pub struct Ack {
    pub packet_id: u64,
    #[debug(skip)]
    callback: AckCallback,
    pub created_at: Instant,
}

/// Outstanding acks, oldest first, and the queue of matched ACK packets.
#[derive(derive_more::Debug)]
pub struct AckRegistry {
    acks: Mutex<VecDeque<Ack>>,
    queue: Mutex<VecDeque<Packet>>,
    expiration: Duration,
    unmatched: AtomicU64,
}

impl AckRegistry {
    pub fn new(expiration: Duration) -> Self {
        AckRegistry {
            acks: Mutex::new(VecDeque::new()),
            queue: Mutex::new(VecDeque::new()),
            expiration,
            unmatched: AtomicU64::new(0),
        }
    }

    /// Registers a callback for `packet_id`. Ids are handed out in increasing
    /// order, so the list stays sorted by creation time.
    pub fn register<F>(&self, packet_id: u64, callback: F)
    where
        F: FnOnce(Value) + Send + 'static,
    {
        self.register_at(packet_id, callback, Instant::now());
    }

    pub(crate) fn register_at<F>(&self, packet_id: u64, callback: F, created_at: Instant)
    where
        F: FnOnce(Value) + Send + 'static,
    {
        debug!("Registering ack {}", packet_id);
        self.acks.lock().push_back(Ack {
            packet_id,
            callback: Box::new(callback),
            created_at,
        });
    }

    /// Queues an inbound ACK packet if its id is outstanding. The ack stays
    /// registered until the queue is drained. Returns whether it matched.
    pub fn match_and_queue(&self, packet: Packet) -> bool {
        let Some(id) = packet.id else {
            debug!("Dropping ACK packet without id");
            self.unmatched.fetch_add(1, Ordering::Relaxed);
            return false;
        };
        let known = self.acks.lock().iter().any(|ack| ack.packet_id == id);
        if known {
            self.queue.lock().push_back(packet);
        } else {
            debug!("Dropping ACK {} with no registered callback", id);
            self.unmatched.fetch_add(1, Ordering::Relaxed);
        }
        known
    }

    /// Runs the callbacks of every queued ACK, then expires the oldest ack
    /// if it is past the expiration threshold. Returns the number of
    /// callbacks invoked.
    pub fn drain(&self) -> usize {
        self.drain_at(Instant::now())
    }

    pub(crate) fn drain_at(&self, now: Instant) -> usize {
        let packets = std::mem::take(&mut *self.queue.lock());
        let mut invoked = 0;
        for packet in packets {
            let Some(id) = packet.id else { continue };
            let ack = {
                let mut acks = self.acks.lock();
                acks.iter()
                    .position(|ack| ack.packet_id == id)
                    .and_then(|index| acks.remove(index))
            };
            // A duplicate ACK finds its entry already gone.
            let Some(ack) = ack else { continue };
            let payload = packet.payload.unwrap_or(Value::Null);
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| (ack.callback)(payload))) {
                error!(
                    "Ack callback {} panicked: {}",
                    id,
                    panic_message(panic.as_ref())
                );
            }
            invoked += 1;
        }

        // Only the head is checked; anything behind an unexpired head waits.
        let mut acks = self.acks.lock();
        if let Some(head) = acks.front() {
            if now.saturating_duration_since(head.created_at) >= self.expiration {
                info!("Ack {} expired without a reply", head.packet_id);
                acks.pop_front();
            }
        }
        invoked
    }

    /// Number of registered acks still waiting for a reply.
    pub fn outstanding(&self) -> usize {
        self.acks.lock().len()
    }

    pub fn is_outstanding(&self, packet_id: u64) -> bool {
        self.acks.lock().iter().any(|ack| ack.packet_id == packet_id)
    }

    /// Number of inbound ACK packets that matched no registered callback.
    pub fn unmatched(&self) -> u64 {
        self.unmatched.load(Ordering::Relaxed)
    }
}
