use serde_json::Value;

use crate::constants::{EVENT_CONNECT, EVENT_CONNECT_ERROR, EVENT_DISCONNECT, DisconnectReason};

/// A named event received on a channel.
///
/// Lifecycle facts (`connect`, `disconnect`, `connect_error`) travel the same
/// way as server pushes so a single dispatch table can route all of them.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    pub name: String,
    pub payload: Value,
}

impl InboundEvent {
    pub fn new(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }

    pub fn connected() -> Self {
        Self::new(EVENT_CONNECT, Value::Null)
    }

    pub fn disconnected(reason: &DisconnectReason) -> Self {
        Self::new(EVENT_DISCONNECT, Value::String(reason.as_str().to_string()))
    }

    pub fn connect_error(message: impl Into<String>) -> Self {
        let mut map = serde_json::Map::new();
        map.insert("message".into(), Value::String(message.into()));
        Self::new(EVENT_CONNECT_ERROR, Value::Object(map))
    }
}

/// A named event to emit on a channel.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundEvent {
    pub name: String,
    pub payload: Value,
}

impl OutboundEvent {
    pub fn new(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }
}
