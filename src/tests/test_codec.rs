#[cfg(test)]
mod tests {
    use crate::codec::{decode, encode, parse_event};
    use crate::{DecodeError, EnginePacketType, EventParseError, Packet, SocketPacketType};
    use serde_json::json;

    #[test]
    fn test_event_with_ack_round_trip() {
        let packet = Packet::message(
            SocketPacketType::Event,
            "/",
            Some(5),
            Some(json!(["foo", {"a": 1}])),
        );
        let frame = encode(&packet);
        assert_eq!(frame, "425[\"foo\",{\"a\":1}]");
        assert_eq!(decode(&frame).unwrap(), packet);
    }

    #[test]
    fn test_encode_engine_packets() {
        assert_eq!(encode(&Packet::ping()), "2");
        assert_eq!(encode(&Packet::pong()), "3");
        assert_eq!(encode(&Packet::close()), "1");
    }

    #[test]
    fn test_encode_fire_and_forget_event() {
        let packet = Packet::message(SocketPacketType::Event, "/", None, Some(json!(["hello"])));
        assert_eq!(encode(&packet), "42[\"hello\"]");
    }

    #[test]
    fn test_encode_connect_and_disconnect() {
        assert_eq!(
            encode(&Packet::message(SocketPacketType::Connect, "/", None, None)),
            "40"
        );
        assert_eq!(
            encode(&Packet::message(SocketPacketType::Disconnect, "/", None, None)),
            "41"
        );
        assert_eq!(
            encode(&Packet::message(SocketPacketType::Connect, "/admin", None, None)),
            "40/admin,"
        );
    }

    #[test]
    fn test_namespace_and_id() {
        let packet = decode("42/chat,17[\"msg\",\"hi\"]").unwrap();
        assert_eq!(packet.engine_type, EnginePacketType::Message);
        assert_eq!(packet.socket_type, Some(SocketPacketType::Event));
        assert_eq!(packet.namespace, "/chat");
        assert_eq!(packet.id, Some(17));
        assert_eq!(packet.payload, Some(json!(["msg", "hi"])));
        assert_eq!(encode(&packet), "42/chat,17[\"msg\",\"hi\"]");
    }

    #[test]
    fn test_decode_open_handshake() {
        let packet = decode(
            "0{\"sid\":\"abc\",\"upgrades\":[],\"pingInterval\":25000,\"pingTimeout\":20000}",
        )
        .unwrap();
        assert_eq!(packet.engine_type, EnginePacketType::Open);
        assert_eq!(packet.socket_type, None);
        assert_eq!(packet.payload.unwrap()["sid"], "abc");
    }

    #[test]
    fn test_decode_ping_probe() {
        let packet = decode("2probe").unwrap();
        assert_eq!(packet.engine_type, EnginePacketType::Ping);
        assert_eq!(packet.payload, Some(json!("probe")));
        assert_eq!(encode(&packet), "2probe");
    }

    #[test]
    fn test_decode_ack() {
        let packet = decode("433[\"ok\"]").unwrap();
        assert_eq!(packet.socket_type, Some(SocketPacketType::Ack));
        assert_eq!(packet.id, Some(3));
        assert_eq!(packet.payload, Some(json!(["ok"])));
    }

    #[test]
    fn test_decode_namespace_without_payload() {
        let packet = decode("40/admin").unwrap();
        assert_eq!(packet.namespace, "/admin");
        assert_eq!(packet.payload, None);
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(decode(""), Err(DecodeError::Empty)));
        assert!(matches!(decode("9"), Err(DecodeError::UnknownEngineType('9'))));
        assert!(matches!(decode("4"), Err(DecodeError::MissingSocketType)));
        assert!(matches!(decode("48"), Err(DecodeError::UnknownSocketType('8'))));
        assert!(matches!(decode("451-[\"a\"]"), Err(DecodeError::Binary('5'))));
        assert!(matches!(decode("42[\"unterminated"), Err(DecodeError::Json(_))));
        assert!(matches!(
            decode("4299999999999999999999[\"a\"]"),
            Err(DecodeError::InvalidId(_))
        ));
        assert!(matches!(decode("0{not json"), Err(DecodeError::Json(_))));
    }

    #[test]
    fn test_parse_event_arguments() {
        let bare = parse_event(Some(&json!(["tick"]))).unwrap();
        assert_eq!(bare.name, "tick");
        assert_eq!(bare.payload, None);

        let single = parse_event(Some(&json!(["chat", {"text": "hi"}]))).unwrap();
        assert_eq!(single.payload, Some(json!({"text": "hi"})));

        let many = parse_event(Some(&json!(["move", 1, 2]))).unwrap();
        assert_eq!(many.payload, Some(json!([1, 2])));
    }

    #[test]
    fn test_parse_event_rejects_bad_payloads() {
        assert_eq!(parse_event(None), Err(EventParseError::MissingPayload));
        assert_eq!(
            parse_event(Some(&json!({"name": "x"}))),
            Err(EventParseError::NotAnArray)
        );
        assert_eq!(parse_event(Some(&json!([]))), Err(EventParseError::MissingName));
        assert_eq!(parse_event(Some(&json!([42]))), Err(EventParseError::MissingName));
    }
}
