use crate::{EventSink, Transport, TransportError, TransportEvent};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Default)]
struct MockState {
    connected: AtomicBool,
    connects: AtomicUsize,
    closes: AtomicUsize,
    failures_left: AtomicUsize,
    sent: Mutex<Vec<String>>,
    urls: Mutex<Vec<String>>,
    events: Mutex<Option<EventSink>>,
}

/// Transport double. Clones share state so a test can keep one handle while
/// the socket owns another.
#[derive(Clone)]
pub(crate) struct MockTransport {
    state: Arc<MockState>,
    outgoing: mpsc::UnboundedSender<String>,
}

impl MockTransport {
    pub(crate) fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (outgoing, rx) = mpsc::unbounded_channel();
        (
            MockTransport {
                state: Arc::new(MockState::default()),
                outgoing,
            },
            rx,
        )
    }

    /// Makes the next `count` connect attempts fail.
    pub(crate) fn fail_next_connects(&self, count: usize) {
        self.state.failures_left.store(count, Ordering::SeqCst);
    }

    pub(crate) fn set_connected(&self, connected: bool) {
        self.state.connected.store(connected, Ordering::SeqCst);
    }

    pub(crate) fn is_connected_now(&self) -> bool {
        self.state.connected.load(Ordering::SeqCst)
    }

    pub(crate) fn connects(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    pub(crate) fn closes(&self) -> usize {
        self.state.closes.load(Ordering::SeqCst)
    }

    pub(crate) fn urls(&self) -> Vec<String> {
        self.state.urls.lock().clone()
    }

    pub(crate) fn sent_count(&self, frame: &str) -> usize {
        self.state.sent.lock().iter().filter(|f| *f == frame).count()
    }

    /// Delivers a frame as if the server had sent it. Returns `false` when
    /// the transport was never connected.
    pub(crate) fn server_send(&self, frame: &str) -> bool {
        match self.state.events.lock().as_ref() {
            Some(events) => events
                .send(TransportEvent::Message(frame.to_string()))
                .is_ok(),
            None => false,
        }
    }

    /// Simulates the server dropping the connection.
    pub(crate) fn drop_connection(&self) {
        self.state.connected.store(false, Ordering::SeqCst);
        if let Some(events) = self.state.events.lock().as_ref() {
            let _ = events.send(TransportEvent::Close);
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self, url: &str, events: EventSink) -> Result<(), TransportError> {
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        self.state.urls.lock().push(url.to_string());
        let failing = self
            .state
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(TransportError::connect("connection refused"));
        }
        self.state.connected.store(true, Ordering::SeqCst);
        let _ = events.send(TransportEvent::Open);
        *self.state.events.lock() = Some(events);
        Ok(())
    }

    async fn send(&self, text: String) -> Result<(), TransportError> {
        self.state.sent.lock().push(text.clone());
        let _ = self.outgoing.send(text);
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.state.closes.fetch_add(1, Ordering::SeqCst);
        if self.state.connected.swap(false, Ordering::SeqCst) {
            if let Some(events) = self.state.events.lock().as_ref() {
                let _ = events.send(TransportEvent::Close);
            }
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.state.connected.load(Ordering::SeqCst)
    }
}

/// Waits for the next frame the client sends and checks it.
pub(crate) async fn expect_sent(rx: &mut mpsc::UnboundedReceiver<String>, expected: &str) {
    match tokio::time::timeout(Duration::from_secs(5), rx.recv()).await {
        Ok(Some(actual)) => assert_eq!(expected, actual, "client sent an unexpected frame"),
        Ok(None) => panic!("outgoing channel closed unexpectedly"),
        Err(_) => panic!("timeout waiting for frame {}", expected),
    }
}

/// Polls `condition` until it holds, failing after a few seconds.
pub(crate) async fn wait_until(mut condition: impl FnMut() -> bool) {
    let waited = tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "condition not met in time");
}
