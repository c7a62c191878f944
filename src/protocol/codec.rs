//! Engine.IO v4 / Socket.IO v5 text framing
//!
//! Every WebSocket text frame starts with an Engine.IO packet type digit. Message
//! packets (`4`) carry a Socket.IO packet whose own type digit follows, so a server
//! event arrives as `42["name",{...}]`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::types::ProtocolError;

/// Engine.IO protocol revision negotiated in the endpoint query string
pub const ENGINE_IO_VERSION: u8 = 4;

/// Handshake sent by the server in the `open` packet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenHandshake {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    pub ping_interval: u64,
    pub ping_timeout: u64,
    #[serde(default)]
    pub max_payload: Option<u64>,
}

/// Engine.IO transport-level packet
#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    Open(OpenHandshake),
    Close,
    Ping(String),
    Pong(String),
    Message(String),
    Upgrade,
    Noop,
}

impl EnginePacket {
    pub fn decode(frame: &str) -> Result<Self, ProtocolError> {
        let (kind, body) = split_kind(frame)?;
        match kind {
            '0' => serde_json::from_str(body)
                .map(EnginePacket::Open)
                .map_err(|e| ProtocolError::MalformedFrame(format!("bad open packet: {}", e))),
            '1' => Ok(EnginePacket::Close),
            '2' => Ok(EnginePacket::Ping(body.to_string())),
            '3' => Ok(EnginePacket::Pong(body.to_string())),
            '4' => Ok(EnginePacket::Message(body.to_string())),
            '5' => Ok(EnginePacket::Upgrade),
            '6' => Ok(EnginePacket::Noop),
            other => Err(ProtocolError::MalformedFrame(format!(
                "unknown engine packet type '{}'",
                other
            ))),
        }
    }

    pub fn encode(&self) -> String {
        match self {
            EnginePacket::Open(handshake) => {
                format!("0{}", serde_json::to_string(handshake).unwrap_or_default())
            }
            EnginePacket::Close => "1".to_string(),
            EnginePacket::Ping(data) => format!("2{}", data),
            EnginePacket::Pong(data) => format!("3{}", data),
            EnginePacket::Message(body) => format!("4{}", body),
            EnginePacket::Upgrade => "5".to_string(),
            EnginePacket::Noop => "6".to_string(),
        }
    }
}

/// Socket.IO packet carried inside an Engine.IO message
#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect(Value),
    Disconnect,
    Event { name: String, payload: Value },
    Ack,
    ConnectError(Value),
}

impl SocketPacket {
    pub fn decode(body: &str) -> Result<Self, ProtocolError> {
        let (kind, rest) = split_kind(body)?;

        // Optional "/namespace," prefix, then an optional numeric ack id.
        // Only the default namespace is joined.
        let rest = match rest.strip_prefix('/') {
            Some(namespaced) => {
                let (name, tail) = namespaced.split_once(',').unwrap_or((namespaced, ""));
                if !name.is_empty() {
                    return Err(ProtocolError::ForeignNamespace(format!("/{}", name)));
                }
                tail
            }
            None => rest,
        };
        let rest = rest.trim_start_matches(|c: char| c.is_ascii_digit());

        match kind {
            '0' => parse_optional_json(rest).map(SocketPacket::Connect),
            '1' => Ok(SocketPacket::Disconnect),
            '2' => {
                let args: Vec<Value> = serde_json::from_str(rest).map_err(|e| {
                    ProtocolError::MalformedFrame(format!("bad event arguments: {}", e))
                })?;
                let mut args = args.into_iter();
                let name = match args.next() {
                    Some(Value::String(name)) => name,
                    _ => {
                        return Err(ProtocolError::MalformedFrame(
                            "event without a name".to_string(),
                        ));
                    }
                };
                Ok(SocketPacket::Event {
                    name,
                    payload: args.next().unwrap_or(Value::Null),
                })
            }
            '3' => Ok(SocketPacket::Ack),
            '4' => parse_optional_json(rest).map(SocketPacket::ConnectError),
            '5' | '6' => Err(ProtocolError::MalformedFrame(
                "binary packets are not supported".to_string(),
            )),
            other => Err(ProtocolError::MalformedFrame(format!(
                "unknown socket packet type '{}'",
                other
            ))),
        }
    }

    /// Socket.IO body, without the Engine.IO message prefix
    pub fn encode(&self) -> String {
        match self {
            SocketPacket::Connect(Value::Null) => "0".to_string(),
            SocketPacket::Connect(auth) => format!("0{}", auth),
            SocketPacket::Disconnect => "1".to_string(),
            SocketPacket::Event { name, payload } => {
                format!("2{}", Value::Array(vec![Value::String(name.clone()), payload.clone()]))
            }
            SocketPacket::Ack => "3[]".to_string(),
            SocketPacket::ConnectError(data) => format!("4{}", data),
        }
    }

    /// Complete WebSocket text frame for this packet
    pub fn frame(&self) -> String {
        EnginePacket::Message(self.encode()).encode()
    }
}

fn split_kind(frame: &str) -> Result<(char, &str), ProtocolError> {
    let kind = frame
        .chars()
        .next()
        .ok_or_else(|| ProtocolError::MalformedFrame("empty frame".to_string()))?;
    Ok((kind, &frame[kind.len_utf8()..]))
}

fn parse_optional_json(text: &str) -> Result<Value, ProtocolError> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(text)
        .map_err(|e| ProtocolError::MalformedFrame(format!("bad packet data: {}", e)))
}
