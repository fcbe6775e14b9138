//! Engine.IO v3/v4 and Socket.IO text frames, the subset a chat client needs.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("empty frame")]
    Empty,
    #[error("unknown packet type {0:?}")]
    UnknownType(String),
    #[error("invalid frame json: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("event frame has no event name")]
    MissingEventName,
}

/// Engine.IO protocol revision spoken by the server.
///
/// v3 servers expect the client to ping and join the default namespace on
/// their own; v4 servers ping the client and wait for an explicit connect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineVersion {
    #[default]
    V3,
    V4,
}

impl EngineVersion {
    /// Value of the `EIO` query parameter.
    pub fn query_value(self) -> u8 {
        match self {
            Self::V3 => 3,
            Self::V4 => 4,
        }
    }
}

/// Engine.IO open packet body.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,
    #[serde(default)]
    pub ping_interval: u64,
    #[serde(default)]
    pub ping_timeout: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Open(Handshake),
    Close,
    Ping,
    Pong,
    Noop,
    Connect,
    Disconnect,
    Event {
        name: String,
        payload: Option<String>,
    },
    ConnectError(String),
}

impl Frame {
    pub fn event(name: impl Into<String>, payload: impl Into<String>) -> Self {
        Self::Event {
            name: name.into(),
            payload: Some(payload.into()),
        }
    }

    pub fn parse(text: &str) -> Result<Self, FrameError> {
        let mut chars = text.chars();
        let engine_type = chars.next().ok_or(FrameError::Empty)?;
        let rest = chars.as_str();

        match engine_type {
            '0' => Ok(Self::Open(serde_json::from_str(rest)?)),
            '1' => Ok(Self::Close),
            // Ping payloads carry nothing we need.
            '2' => Ok(Self::Ping),
            '3' => Ok(Self::Pong),
            '6' => Ok(Self::Noop),
            '4' => parse_socket_packet(rest),
            other => Err(FrameError::UnknownType(other.to_string())),
        }
    }

    /// Encode a client-to-server frame.
    pub fn encode(&self) -> String {
        match self {
            Self::Close => "1".to_string(),
            Self::Ping => "2".to_string(),
            Self::Pong => "3".to_string(),
            Self::Noop => "6".to_string(),
            Self::Connect => "40".to_string(),
            Self::Disconnect => "41".to_string(),
            Self::Event { name, payload } => {
                let args = match payload {
                    Some(payload) => Value::Array(vec![
                        Value::String(name.clone()),
                        Value::String(payload.clone()),
                    ]),
                    None => Value::Array(vec![Value::String(name.clone())]),
                };
                format!("42{}", args)
            }
            Self::Open(handshake) => format!(
                "0{}",
                serde_json::json!({
                    "sid": handshake.sid,
                    "pingInterval": handshake.ping_interval,
                    "pingTimeout": handshake.ping_timeout,
                })
            ),
            Self::ConnectError(message) => {
                format!("44{}", serde_json::json!({ "message": message }))
            }
        }
    }
}

fn parse_socket_packet(body: &str) -> Result<Frame, FrameError> {
    let mut chars = body.chars();
    let socket_type = chars.next().ok_or(FrameError::Empty)?;
    let rest = skip_namespace(chars.as_str());

    match socket_type {
        '0' => Ok(Frame::Connect),
        '1' => Ok(Frame::Disconnect),
        '2' => parse_event(rest),
        '4' => {
            let value: Value = serde_json::from_str(rest)?;
            let message = match value.get("message").and_then(Value::as_str) {
                Some(message) => message.to_string(),
                None => value.to_string(),
            };
            Ok(Frame::ConnectError(message))
        }
        other => Err(FrameError::UnknownType(format!("4{}", other))),
    }
}

/// Drop a leading `/namespace,` if present.
fn skip_namespace(rest: &str) -> &str {
    if rest.starts_with('/') {
        match rest.find(',') {
            Some(comma) => &rest[comma + 1..],
            None => "",
        }
    } else {
        rest
    }
}

fn parse_event(rest: &str) -> Result<Frame, FrameError> {
    // Optional ack id before the argument array.
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_digit());
    let mut args: Vec<Value> = serde_json::from_str(rest)?;
    if args.is_empty() {
        return Err(FrameError::MissingEventName);
    }

    let name = match args.remove(0) {
        Value::String(name) => name,
        _ => return Err(FrameError::MissingEventName),
    };

    let payload = match args.into_iter().next() {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) => Some(text),
        Some(other) => Some(other.to_string()),
    };

    Ok(Frame::Event { name, payload })
}
