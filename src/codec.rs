//! Text frame codec for Engine.IO / Socket.IO v4.
//!
//! A frame is `<engine digit>[<socket digit>][<namespace>,][<id>][<payload>]`.
//! The socket digit, namespace and id only appear on engine `MESSAGE`
//! frames, and the root namespace `/` is left implicit.

use crate::error::{DecodeError, EventParseError};
use crate::models::{EnginePacketType, Packet, SocketIoEvent, SocketPacketType};
use serde_json::Value;

/// Encodes a packet into its wire representation.
pub fn encode(packet: &Packet) -> String {
    let mut frame = String::new();
    frame.push(packet.engine_type.code());

    if packet.engine_type == EnginePacketType::Message {
        if let Some(socket_type) = packet.socket_type {
            frame.push(socket_type.code());
        }
        if !packet.namespace.is_empty() && packet.namespace != "/" {
            frame.push_str(&packet.namespace);
            frame.push(',');
        }
        if let Some(id) = packet.id {
            frame.push_str(&id.to_string());
        }
        if let Some(payload) = &packet.payload {
            frame.push_str(&payload.to_string());
        }
    } else if let Some(payload) = &packet.payload {
        // Engine payloads such as "probe" travel as raw text.
        match payload {
            Value::String(text) => frame.push_str(text),
            other => frame.push_str(&other.to_string()),
        }
    }

    frame
}

/// Decodes a text frame into a packet.
pub fn decode(frame: &str) -> Result<Packet, DecodeError> {
    let first = frame.chars().next().ok_or(DecodeError::Empty)?;
    let engine_type =
        EnginePacketType::from_code(first).ok_or(DecodeError::UnknownEngineType(first))?;
    let rest = &frame[first.len_utf8()..];

    if engine_type != EnginePacketType::Message {
        let mut packet = Packet::engine(engine_type);
        packet.payload = decode_engine_payload(engine_type, rest)?;
        return Ok(packet);
    }

    let code = rest.chars().next().ok_or(DecodeError::MissingSocketType)?;
    if code == '5' || code == '6' {
        return Err(DecodeError::Binary(code));
    }
    let socket_type = SocketPacketType::from_code(code).ok_or(DecodeError::UnknownSocketType(code))?;
    let mut rest = &rest[code.len_utf8()..];

    let mut namespace = "/".to_string();
    if rest.starts_with('/') {
        match rest.find(',') {
            Some(end) => {
                namespace = rest[..end].to_string();
                rest = &rest[end + 1..];
            }
            None => {
                namespace = rest.to_string();
                rest = "";
            }
        }
    }

    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    let id = if digits > 0 {
        let raw = &rest[..digits];
        let id = raw
            .parse::<u64>()
            .map_err(|_| DecodeError::InvalidId(raw.to_string()))?;
        rest = &rest[digits..];
        Some(id)
    } else {
        None
    };

    let payload = if rest.is_empty() {
        None
    } else {
        Some(serde_json::from_str::<Value>(rest)?)
    };

    Ok(Packet {
        engine_type,
        socket_type: Some(socket_type),
        namespace,
        id,
        payload,
    })
}

fn decode_engine_payload(
    engine_type: EnginePacketType,
    rest: &str,
) -> Result<Option<Value>, DecodeError> {
    if rest.is_empty() {
        return Ok(None);
    }
    if engine_type == EnginePacketType::Open {
        return Ok(Some(serde_json::from_str(rest)?));
    }
    Ok(Some(
        serde_json::from_str(rest).unwrap_or_else(|_| Value::String(rest.to_string())),
    ))
}

/// Splits an EVENT payload `[name, args...]` into a [`SocketIoEvent`].
///
/// One argument is carried as-is, several are collected into an array and
/// none leaves the payload empty.
pub fn parse_event(payload: Option<&Value>) -> Result<SocketIoEvent, EventParseError> {
    let items = match payload {
        None => return Err(EventParseError::MissingPayload),
        Some(Value::Array(items)) => items,
        Some(_) => return Err(EventParseError::NotAnArray),
    };
    let name = items
        .first()
        .and_then(Value::as_str)
        .ok_or(EventParseError::MissingName)?;

    let payload = match &items[1..] {
        [] => None,
        [single] => Some(single.clone()),
        args => Some(Value::Array(args.to_vec())),
    };
    Ok(SocketIoEvent::with_payload(name, payload))
}

/// Builds the `[name]` or `[name, payload]` array sent by an emit.
pub(crate) fn event_payload(name: &str, payload: Option<Value>) -> Value {
    match payload {
        Some(payload) => Value::Array(vec![Value::String(name.to_string()), payload]),
        None => Value::Array(vec![Value::String(name.to_string())]),
    }
}
