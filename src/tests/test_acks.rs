#[cfg(test)]
mod tests {
    use crate::{AckRegistry, Packet, SocketPacketType};
    use parking_lot::Mutex;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::Instant;

    const EXPIRY: Duration = Duration::from_secs(1800);

    fn ack_packet(id: u64, payload: Value) -> Packet {
        Packet::message(SocketPacketType::Ack, "/", Some(id), Some(payload))
    }

    fn recorder() -> (Arc<Mutex<Vec<Value>>>, impl Fn() -> Box<dyn FnOnce(Value) + Send>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        let make = move || -> Box<dyn FnOnce(Value) + Send> {
            let sink = sink.clone();
            Box::new(move |value| sink.lock().push(value))
        };
        (log, make)
    }

    #[test]
    fn test_matching_ack_invokes_callback_once() {
        let registry = AckRegistry::new(EXPIRY);
        let (log, make) = recorder();
        registry.register(7, make());

        assert!(registry.match_and_queue(ack_packet(7, json!(["ok"]))));
        // Queued, not invoked yet, and still registered until drained.
        assert!(log.lock().is_empty());
        assert!(registry.is_outstanding(7));

        assert_eq!(registry.drain(), 1);
        assert_eq!(*log.lock(), vec![json!(["ok"])]);
        assert!(!registry.is_outstanding(7));

        // A duplicate reply finds nothing left to call.
        assert!(!registry.match_and_queue(ack_packet(7, json!(["again"]))));
        assert_eq!(registry.drain(), 0);
        assert_eq!(log.lock().len(), 1);
    }

    #[test]
    fn test_out_of_order_acks() {
        let registry = AckRegistry::new(EXPIRY);
        let (log, make) = recorder();
        registry.register(1, make());
        registry.register(2, make());
        registry.register(3, make());

        registry.match_and_queue(ack_packet(3, json!("third")));
        registry.match_and_queue(ack_packet(1, json!("first")));
        assert_eq!(registry.drain(), 2);

        assert_eq!(*log.lock(), vec![json!("third"), json!("first")]);
        assert_eq!(registry.outstanding(), 1);
        assert!(registry.is_outstanding(2));
    }

    #[test]
    fn test_unmatched_ack_is_counted_and_dropped() {
        let registry = AckRegistry::new(EXPIRY);
        let (log, make) = recorder();
        registry.register(1, make());

        assert!(!registry.match_and_queue(ack_packet(99, json!(null))));
        assert!(!registry.match_and_queue(Packet::message(SocketPacketType::Ack, "/", None, None)));
        assert_eq!(registry.unmatched(), 2);
        assert_eq!(registry.drain(), 0);
        assert!(log.lock().is_empty());
        assert_eq!(registry.outstanding(), 1);
    }

    #[test]
    fn test_missing_payload_is_null() {
        let registry = AckRegistry::new(EXPIRY);
        let (log, make) = recorder();
        registry.register(4, make());
        registry.match_and_queue(Packet::message(SocketPacketType::Ack, "/", Some(4), None));
        registry.drain();
        assert_eq!(*log.lock(), vec![Value::Null]);
    }

    #[test]
    fn test_expired_head_is_dropped_without_callback() {
        let registry = AckRegistry::new(EXPIRY);
        let (log, make) = recorder();
        let start = Instant::now();
        registry.register_at(1, make(), start);
        registry.register_at(2, make(), start + Duration::from_secs(60));

        // Not old enough yet.
        registry.drain_at(start + Duration::from_secs(10));
        assert_eq!(registry.outstanding(), 2);

        registry.drain_at(start + EXPIRY + Duration::from_secs(1));
        assert_eq!(registry.outstanding(), 1);
        assert!(!registry.is_outstanding(1));
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_expiry_checks_only_the_head() {
        let registry = AckRegistry::new(EXPIRY);
        let (_log, make) = recorder();
        let start = Instant::now();
        registry.register_at(1, make(), start);
        registry.register_at(2, make(), start);

        let late = start + EXPIRY * 2;
        registry.drain_at(late);
        assert_eq!(registry.outstanding(), 1);
        registry.drain_at(late);
        assert_eq!(registry.outstanding(), 0);
    }

    #[test]
    fn test_panicking_callback_does_not_block_others() {
        let registry = AckRegistry::new(EXPIRY);
        let (log, make) = recorder();
        registry.register(1, |_| panic!("ack failure"));
        registry.register(2, make());
        registry.match_and_queue(ack_packet(1, json!(1)));
        registry.match_and_queue(ack_packet(2, json!(2)));

        assert_eq!(registry.drain(), 2);
        assert_eq!(*log.lock(), vec![json!(2)]);
        assert_eq!(registry.outstanding(), 0);
    }
}
