//! Engine.IO v4 / Socket.IO v5 text packet codec.
//!
//! Only the text encodings used over a WebSocket transport are supported.
//! Binary attachments (`5`/`6` socket packets) are rejected.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::ROOT_NAMESPACE;

/// Errors from decoding or encoding a packet.
#[derive(Debug, thiserror::Error)]
pub enum PacketError {
    #[error("empty packet")]
    Empty,

    #[error("unknown packet type {0:?}")]
    UnknownType(char),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed event: {0}")]
    InvalidEvent(&'static str),

    #[error("ack packet without id")]
    MissingAckId,

    #[error("unsupported packet: {0}")]
    Unsupported(&'static str),
}

/// Payload of the Engine.IO `open` packet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenHandshake {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    /// Milliseconds between server pings.
    pub ping_interval: u64,
    /// Milliseconds the server waits for a pong.
    pub ping_timeout: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_payload: Option<u64>,
}

/// Engine.IO transport-level packet.
#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    Open(OpenHandshake),
    Close,
    Ping(Option<String>),
    Pong(Option<String>),
    Message(SocketPacket),
    Upgrade,
    Noop,
}

/// Socket.IO packet carried inside an Engine.IO message.
#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect {
        namespace: String,
        data: Option<Value>,
    },
    Disconnect {
        namespace: String,
    },
    Event {
        namespace: String,
        ack_id: Option<u64>,
        name: String,
        args: Vec<Value>,
    },
    Ack {
        namespace: String,
        ack_id: u64,
        args: Vec<Value>,
    },
    ConnectError {
        namespace: String,
        data: Value,
    },
}

impl EnginePacket {
    pub fn decode(text: &str) -> Result<Self, PacketError> {
        let mut chars = text.chars();
        let kind = chars.next().ok_or(PacketError::Empty)?;
        let rest = chars.as_str();
        let opt = |s: &str| (!s.is_empty()).then(|| s.to_string());

        match kind {
            '0' => Ok(Self::Open(serde_json::from_str(rest)?)),
            '1' => Ok(Self::Close),
            '2' => Ok(Self::Ping(opt(rest))),
            '3' => Ok(Self::Pong(opt(rest))),
            '4' => Ok(Self::Message(SocketPacket::decode(rest)?)),
            '5' => Ok(Self::Upgrade),
            '6' => Ok(Self::Noop),
            other => Err(PacketError::UnknownType(other)),
        }
    }

    pub fn encode(&self) -> Result<String, PacketError> {
        Ok(match self {
            Self::Open(hs) => format!("0{}", serde_json::to_string(hs)?),
            Self::Close => "1".into(),
            Self::Ping(data) => format!("2{}", data.as_deref().unwrap_or_default()),
            Self::Pong(data) => format!("3{}", data.as_deref().unwrap_or_default()),
            Self::Message(packet) => format!("4{}", packet.encode()?),
            Self::Upgrade => "5".into(),
            Self::Noop => "6".into(),
        })
    }
}

impl SocketPacket {
    /// Event on the root namespace without an ack.
    pub fn event(name: impl Into<String>, payload: Value) -> Self {
        Self::Event {
            namespace: ROOT_NAMESPACE.into(),
            ack_id: None,
            name: name.into(),
            args: vec![payload],
        }
    }

    /// Namespace connect request for the root namespace.
    pub fn connect_root() -> Self {
        Self::Connect {
            namespace: ROOT_NAMESPACE.into(),
            data: None,
        }
    }

    pub fn disconnect_root() -> Self {
        Self::Disconnect {
            namespace: ROOT_NAMESPACE.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        match self {
            Self::Connect { namespace, .. }
            | Self::Disconnect { namespace }
            | Self::Event { namespace, .. }
            | Self::Ack { namespace, .. }
            | Self::ConnectError { namespace, .. } => namespace,
        }
    }

    pub fn decode(text: &str) -> Result<Self, PacketError> {
        let mut chars = text.chars();
        let kind = chars.next().ok_or(PacketError::Empty)?;
        let mut rest = chars.as_str();

        if matches!(kind, '5' | '6') {
            return Err(PacketError::Unsupported("binary attachments"));
        }

        let namespace = if rest.starts_with('/') {
            match rest.find(',') {
                Some(idx) => {
                    let ns = &rest[..idx];
                    rest = &rest[idx + 1..];
                    ns.to_string()
                }
                None => {
                    let ns = rest.to_string();
                    rest = "";
                    ns
                }
            }
        } else {
            ROOT_NAMESPACE.to_string()
        };

        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        let ack_id = if digits > 0 {
            let id = rest[..digits]
                .parse::<u64>()
                .map_err(|_| PacketError::InvalidEvent("ack id out of range"))?;
            rest = &rest[digits..];
            Some(id)
        } else {
            None
        };

        let data: Option<Value> = if rest.is_empty() {
            None
        } else {
            Some(serde_json::from_str(rest)?)
        };

        match kind {
            '0' => Ok(Self::Connect { namespace, data }),
            '1' => Ok(Self::Disconnect { namespace }),
            '2' => {
                let Some(Value::Array(mut items)) = data else {
                    return Err(PacketError::InvalidEvent("event data is not an array"));
                };
                if items.is_empty() {
                    return Err(PacketError::InvalidEvent("event without name"));
                }
                let Value::String(name) = items.remove(0) else {
                    return Err(PacketError::InvalidEvent("event name is not a string"));
                };
                Ok(Self::Event {
                    namespace,
                    ack_id,
                    name,
                    args: items,
                })
            }
            '3' => {
                let ack_id = ack_id.ok_or(PacketError::MissingAckId)?;
                let args = match data {
                    Some(Value::Array(items)) => items,
                    Some(other) => vec![other],
                    None => Vec::new(),
                };
                Ok(Self::Ack {
                    namespace,
                    ack_id,
                    args,
                })
            }
            '4' => Ok(Self::ConnectError {
                namespace,
                data: data.unwrap_or(Value::Null),
            }),
            other => Err(PacketError::UnknownType(other)),
        }
    }

    pub fn encode(&self) -> Result<String, PacketError> {
        let (kind, ack_id, data) = match self {
            Self::Connect { data, .. } => ('0', None, data.clone()),
            Self::Disconnect { .. } => ('1', None, None),
            Self::Event {
                ack_id, name, args, ..
            } => {
                let mut items = Vec::with_capacity(args.len() + 1);
                items.push(Value::String(name.clone()));
                items.extend(args.iter().cloned());
                ('2', *ack_id, Some(Value::Array(items)))
            }
            Self::Ack { ack_id, args, .. } => ('3', Some(*ack_id), Some(Value::Array(args.clone()))),
            Self::ConnectError { data, .. } => ('4', None, Some(data.clone())),
        };

        let mut out = String::new();
        out.push(kind);
        let ns = self.namespace();
        if ns != ROOT_NAMESPACE {
            out.push_str(ns);
            out.push(',');
        }
        if let Some(id) = ack_id {
            out.push_str(&id.to_string());
        }
        if let Some(data) = data {
            out.push_str(&serde_json::to_string(&data)?);
        }
        Ok(out)
    }

    /// Human-readable message carried by a `ConnectError` payload.
    ///
    /// Servers send either `{"message": "..."}` or a bare string.
    pub fn connect_error_message(data: &Value) -> String {
        match data {
            Value::String(s) => s.clone(),
            Value::Object(map) => map
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| data.to_string()),
            Value::Null => "connection refused".into(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decode_open_handshake() {
        let text = r#"0{"sid":"abc","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#;
        let EnginePacket::Open(hs) = EnginePacket::decode(text).unwrap() else {
            panic!("expected open packet");
        };
        assert_eq!(hs.sid, "abc");
        assert_eq!(hs.ping_interval, 25000);
        assert_eq!(hs.ping_timeout, 20000);
        assert_eq!(hs.max_payload, Some(1_000_000));
    }

    #[test]
    fn decode_ping_and_probe() {
        assert_eq!(EnginePacket::decode("2").unwrap(), EnginePacket::Ping(None));
        assert_eq!(
            EnginePacket::decode("2probe").unwrap(),
            EnginePacket::Ping(Some("probe".into()))
        );
        assert_eq!(EnginePacket::Pong(None).encode().unwrap(), "3");
    }

    #[test]
    fn decode_event_on_root_namespace() {
        let packet = EnginePacket::decode(r#"42["new-order",{"orderId":"O-1"}]"#).unwrap();
        let EnginePacket::Message(SocketPacket::Event {
            namespace,
            ack_id,
            name,
            args,
        }) = packet
        else {
            panic!("expected event");
        };
        assert_eq!(namespace, "/");
        assert_eq!(ack_id, None);
        assert_eq!(name, "new-order");
        assert_eq!(args, vec![json!({"orderId": "O-1"})]);
    }

    #[test]
    fn decode_event_with_namespace_and_ack() {
        let packet = SocketPacket::decode(r#"2/orders,12["status",{"online":true}]"#).unwrap();
        assert_eq!(
            packet,
            SocketPacket::Event {
                namespace: "/orders".into(),
                ack_id: Some(12),
                name: "status".into(),
                args: vec![json!({"online": true})],
            }
        );
    }

    #[test]
    fn decode_connect_ack_with_sid() {
        let packet = SocketPacket::decode(r#"0{"sid":"xyz"}"#).unwrap();
        assert_eq!(
            packet,
            SocketPacket::Connect {
                namespace: "/".into(),
                data: Some(json!({"sid": "xyz"})),
            }
        );
    }

    #[test]
    fn decode_namespace_without_payload() {
        let packet = SocketPacket::decode("1/admin").unwrap();
        assert_eq!(
            packet,
            SocketPacket::Disconnect {
                namespace: "/admin".into()
            }
        );
    }

    #[test]
    fn encode_join_event() {
        let packet = EnginePacket::Message(SocketPacket::event(
            "join-deliverer",
            json!({"delivererId": "courier-42"}),
        ));
        assert_eq!(
            packet.encode().unwrap(),
            r#"42["join-deliverer",{"delivererId":"courier-42"}]"#
        );
    }

    #[test]
    fn encode_connect_and_disconnect() {
        assert_eq!(
            EnginePacket::Message(SocketPacket::connect_root())
                .encode()
                .unwrap(),
            "40"
        );
        assert_eq!(
            EnginePacket::Message(SocketPacket::disconnect_root())
                .encode()
                .unwrap(),
            "41"
        );
    }

    #[test]
    fn encode_namespaced_ack() {
        let packet = SocketPacket::Ack {
            namespace: "/admin".into(),
            ack_id: 7,
            args: vec![json!("ok")],
        };
        assert_eq!(packet.encode().unwrap(), r#"3/admin,7["ok"]"#);
    }

    #[test]
    fn connect_error_message_variants() {
        assert_eq!(
            SocketPacket::connect_error_message(&json!({"message": "unauthorized"})),
            "unauthorized"
        );
        assert_eq!(
            SocketPacket::connect_error_message(&json!("nope")),
            "nope"
        );
        assert_eq!(
            SocketPacket::connect_error_message(&Value::Null),
            "connection refused"
        );
    }

    #[test]
    fn rejects_malformed_packets() {
        assert!(matches!(EnginePacket::decode(""), Err(PacketError::Empty)));
        assert!(matches!(
            EnginePacket::decode("9"),
            Err(PacketError::UnknownType('9'))
        ));
        assert!(matches!(
            SocketPacket::decode(r#"2{"not":"array"}"#),
            Err(PacketError::InvalidEvent(_))
        ));
        assert!(matches!(
            SocketPacket::decode("2[42]"),
            Err(PacketError::InvalidEvent(_))
        ));
        assert!(matches!(
            SocketPacket::decode(r#"51-["file",{"_placeholder":true,"num":0}]"#),
            Err(PacketError::Unsupported(_))
        ));
        assert!(matches!(
            SocketPacket::decode("3[]"),
            Err(PacketError::MissingAckId)
        ));
        assert!(matches!(
            SocketPacket::decode("2[\"x\""),
            Err(PacketError::Json(_))
        ));
    }
}
