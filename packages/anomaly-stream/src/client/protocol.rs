// Socket.IO (v5) over Engine.IO (v4) text framing
//
// Engine.IO frame:   <type digit><payload>
// Socket.IO packet:  <type digit>[<namespace>,][<ack id>][<json>]
//
// Only the text subset is implemented. Binary attachments (Socket.IO types
// 5 and 6) decode to `SocketPacket::Binary` so callers can log and drop them.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Namespace used when the endpoint URL carries no path
pub const DEFAULT_NAMESPACE: &str = "/";

#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    #[error("empty frame")]
    Empty,

    #[error("unknown engine packet type '{0}'")]
    UnknownEngineType(char),

    #[error("unknown socket packet type '{0}'")]
    UnknownSocketType(char),

    #[error("invalid handshake: {0}")]
    Handshake(String),

    #[error("invalid event payload: {0}")]
    EventPayload(String),
}

/// Engine.IO open handshake
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    #[serde(default)]
    pub ping_interval: u64,
    #[serde(default)]
    pub ping_timeout: u64,
    #[serde(default)]
    pub max_payload: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    Open(Handshake),
    Close,
    Ping(String),
    Pong(String),
    Message(String),
    Upgrade,
    Noop,
}

impl EnginePacket {
    pub fn decode(frame: &str) -> Result<Self, ProtocolError> {
        let mut chars = frame.chars();
        let kind = chars.next().ok_or(ProtocolError::Empty)?;
        let body = chars.as_str();

        match kind {
            '0' => serde_json::from_str(body)
                .map(EnginePacket::Open)
                .map_err(|e| ProtocolError::Handshake(e.to_string())),
            '1' => Ok(EnginePacket::Close),
            '2' => Ok(EnginePacket::Ping(body.to_string())),
            '3' => Ok(EnginePacket::Pong(body.to_string())),
            '4' => Ok(EnginePacket::Message(body.to_string())),
            '5' => Ok(EnginePacket::Upgrade),
            '6' => Ok(EnginePacket::Noop),
            other => Err(ProtocolError::UnknownEngineType(other)),
        }
    }

    pub fn encode(&self) -> String {
        match self {
            // Clients never send an open packet; encode it for completeness
            EnginePacket::Open(handshake) => format!("0{{\"sid\":\"{}\"}}", handshake.sid),
            EnginePacket::Close => "1".to_string(),
            EnginePacket::Ping(data) => format!("2{}", data),
            EnginePacket::Pong(data) => format!("3{}", data),
            EnginePacket::Message(data) => format!("4{}", data),
            EnginePacket::Upgrade => "5".to_string(),
            EnginePacket::Noop => "6".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect {
        namespace: String,
        payload: Option<Value>,
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
        ack_id: Option<u64>,
        args: Vec<Value>,
    },
    ConnectError {
        namespace: String,
        payload: Option<Value>,
    },
    Binary {
        namespace: String,
    },
}

impl SocketPacket {
    /// Decode the body of an Engine.IO message frame
    pub fn decode(message: &str) -> Result<Self, ProtocolError> {
        let mut chars = message.chars();
        let kind = chars.next().ok_or(ProtocolError::Empty)?;
        let mut rest = chars.as_str();

        // Binary packets carry an attachment count before the namespace
        if kind == '5' || kind == '6' {
            if let Some(dash) = rest.find('-') {
                rest = &rest[dash + 1..];
            }
        }

        let namespace = if rest.starts_with('/') {
            let end = rest.find(',').unwrap_or(rest.len());
            let nsp = rest[..end].to_string();
            rest = rest.get(end + 1..).unwrap_or("");
            nsp
        } else {
            DEFAULT_NAMESPACE.to_string()
        };

        let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
        let ack_id = if digits > 0 {
            rest[..digits].parse::<u64>().ok()
        } else {
            None
        };
        rest = &rest[digits..];

        let payload = if rest.is_empty() {
            None
        } else {
            Some(
                serde_json::from_str::<Value>(rest)
                    .map_err(|e| ProtocolError::EventPayload(e.to_string()))?,
            )
        };

        match kind {
            '0' => Ok(SocketPacket::Connect { namespace, payload }),
            '1' => Ok(SocketPacket::Disconnect { namespace }),
            '2' => {
                let mut args = match payload {
                    Some(Value::Array(items)) => items,
                    _ => {
                        return Err(ProtocolError::EventPayload(
                            "event payload is not an array".to_string(),
                        ))
                    }
                };
                if args.is_empty() {
                    return Err(ProtocolError::EventPayload("event has no name".to_string()));
                }
                let name = match args.remove(0) {
                    Value::String(name) => name,
                    other => {
                        return Err(ProtocolError::EventPayload(format!(
                            "event name is not a string: {}",
                            other
                        )))
                    }
                };
                Ok(SocketPacket::Event {
                    namespace,
                    ack_id,
                    name,
                    args,
                })
            }
            '3' => {
                let args = match payload {
                    Some(Value::Array(items)) => items,
                    Some(other) => vec![other],
                    None => Vec::new(),
                };
                Ok(SocketPacket::Ack {
                    namespace,
                    ack_id,
                    args,
                })
            }
            '4' => Ok(SocketPacket::ConnectError { namespace, payload }),
            '5' | '6' => Ok(SocketPacket::Binary { namespace }),
            other => Err(ProtocolError::UnknownSocketType(other)),
        }
    }

    /// Encode as a complete Engine.IO message frame (leading `4`)
    pub fn encode(&self) -> String {
        match self {
            SocketPacket::Connect { namespace, payload } => {
                let mut frame = format!("40{}", namespace_prefix(namespace));
                if let Some(payload) = payload {
                    frame.push_str(&payload.to_string());
                }
                frame
            }
            SocketPacket::Disconnect { namespace } => {
                format!("41{}", namespace_prefix(namespace))
            }
            SocketPacket::Event {
                namespace,
                ack_id,
                name,
                args,
            } => {
                let mut items = Vec::with_capacity(args.len() + 1);
                items.push(Value::String(name.clone()));
                items.extend(args.iter().cloned());
                format!(
                    "42{}{}{}",
                    namespace_prefix(namespace),
                    ack_id.map(|id| id.to_string()).unwrap_or_default(),
                    Value::Array(items)
                )
            }
            SocketPacket::Ack {
                namespace,
                ack_id,
                args,
            } => format!(
                "43{}{}{}",
                namespace_prefix(namespace),
                ack_id.map(|id| id.to_string()).unwrap_or_default(),
                Value::Array(args.clone())
            ),
            SocketPacket::ConnectError { namespace, payload } => {
                let mut frame = format!("44{}", namespace_prefix(namespace));
                if let Some(payload) = payload {
                    frame.push_str(&payload.to_string());
                }
                frame
            }
            SocketPacket::Binary { namespace } => format!("45{}", namespace_prefix(namespace)),
        }
    }

    pub fn namespace(&self) -> &str {
        match self {
            SocketPacket::Connect { namespace, .. }
            | SocketPacket::Disconnect { namespace }
            | SocketPacket::Event { namespace, .. }
            | SocketPacket::Ack { namespace, .. }
            | SocketPacket::ConnectError { namespace, .. }
            | SocketPacket::Binary { namespace } => namespace,
        }
    }
}

fn namespace_prefix(namespace: &str) -> String {
    if namespace == DEFAULT_NAMESPACE || namespace.is_empty() {
        String::new()
    } else {
        format!("{},", namespace)
    }
}

/// Build an event frame (`42[...]`) ready to go on the wire
pub fn event_frame(namespace: &str, name: &str, payload: Option<Value>) -> String {
    SocketPacket::Event {
        namespace: namespace.to_string(),
        ack_id: None,
        name: name.to_string(),
        args: payload.into_iter().collect(),
    }
    .encode()
}
