//! Hub wire protocol (JSON encoding)
//!
//! Every message is a JSON object terminated by the ASCII record separator
//! (`0x1E`). A connection starts with a handshake request/response pair, after
//! which messages are distinguished by their integer `type` field.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::HubError;

/// Frame terminator
pub const RECORD_SEPARATOR: char = '\u{1e}';

/// Protocol name sent in the handshake
pub const PROTOCOL_NAME: &str = "json";

/// Protocol version sent in the handshake
pub const PROTOCOL_VERSION: u32 = 1;

const TYPE_INVOCATION: u64 = 1;
const TYPE_COMPLETION: u64 = 3;
const TYPE_PING: u64 = 6;
const TYPE_CLOSE: u64 = 7;

/// First frame sent by the client after the transport opens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeRequest {
    pub protocol: String,
    pub version: u32,
}

impl Default for HandshakeRequest {
    fn default() -> Self {
        Self {
            protocol: PROTOCOL_NAME.to_string(),
            version: PROTOCOL_VERSION,
        }
    }
}

impl HandshakeRequest {
    /// Encode with the trailing record separator
    pub fn encode(&self) -> Result<String, HubError> {
        let json = serde_json::to_string(self).map_err(|e| HubError::Protocol(e.to_string()))?;
        Ok(format!("{}{}", json, RECORD_SEPARATOR))
    }
}

/// Server reply to the handshake; an `error` means the hub refused the session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HandshakeResponse {
    /// Parse a single handshake frame (without separator)
    pub fn parse(frame: &str) -> Result<Self, HubError> {
        serde_json::from_str(frame).map_err(|e| HubError::Protocol(format!("Bad handshake response: {}", e)))
    }
}

/// A decoded hub message
#[derive(Debug, Clone, PartialEq)]
pub enum HubMessage {
    /// Call a named method on the other side
    Invocation {
        target: String,
        arguments: Vec<Value>,
        invocation_id: Option<String>,
    },
    /// Result of an earlier invocation that carried an id
    Completion {
        invocation_id: String,
        error: Option<String>,
    },
    /// Keep-alive
    Ping,
    /// The hub is closing the connection
    Close {
        error: Option<String>,
        allow_reconnect: bool,
    },
    /// A message type this client does not act on (streaming, cancel)
    Other(u64),
}

impl HubMessage {
    /// Fire-and-forget invocation (no completion expected)
    pub fn invocation(target: &str, arguments: Vec<Value>) -> Self {
        HubMessage::Invocation {
            target: target.to_string(),
            arguments,
            invocation_id: None,
        }
    }

    /// Short name for logging
    pub fn kind(&self) -> &'static str {
        match self {
            HubMessage::Invocation { .. } => "Invocation",
            HubMessage::Completion { .. } => "Completion",
            HubMessage::Ping => "Ping",
            HubMessage::Close { .. } => "Close",
            HubMessage::Other(_) => "Other",
        }
    }

    /// Invocation target, if this is an invocation
    pub fn target(&self) -> Option<&str> {
        match self {
            HubMessage::Invocation { target, .. } => Some(target),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            HubMessage::Invocation {
                target,
                arguments,
                invocation_id,
            } => {
                let mut obj = Map::new();
                obj.insert("type".to_string(), json!(TYPE_INVOCATION));
                if let Some(id) = invocation_id {
                    obj.insert("invocationId".to_string(), json!(id));
                }
                obj.insert("target".to_string(), json!(target));
                obj.insert("arguments".to_string(), Value::Array(arguments.clone()));
                Value::Object(obj)
            }
            HubMessage::Completion { invocation_id, error } => {
                let mut obj = Map::new();
                obj.insert("type".to_string(), json!(TYPE_COMPLETION));
                obj.insert("invocationId".to_string(), json!(invocation_id));
                if let Some(error) = error {
                    obj.insert("error".to_string(), json!(error));
                }
                Value::Object(obj)
            }
            HubMessage::Ping => json!({ "type": TYPE_PING }),
            HubMessage::Close { error, allow_reconnect } => {
                let mut obj = Map::new();
                obj.insert("type".to_string(), json!(TYPE_CLOSE));
                if let Some(error) = error {
                    obj.insert("error".to_string(), json!(error));
                }
                if *allow_reconnect {
                    obj.insert("allowReconnect".to_string(), json!(true));
                }
                Value::Object(obj)
            }
            HubMessage::Other(kind) => json!({ "type": kind }),
        }
    }

    /// Encode as a wire frame with the trailing record separator
    pub fn encode(&self) -> String {
        format!("{}{}", self.to_value(), RECORD_SEPARATOR)
    }

    /// Interpret a decoded JSON object
    pub fn from_value(value: Value) -> Result<Self, HubError> {
        let kind = value
            .get("type")
            .and_then(Value::as_u64)
            .ok_or_else(|| HubError::Protocol("Message missing integer 'type'".to_string()))?;

        match kind {
            TYPE_INVOCATION => {
                let target = value
                    .get("target")
                    .and_then(Value::as_str)
                    .ok_or_else(|| HubError::Protocol("Invocation missing 'target'".to_string()))?
                    .to_string();
                let arguments = match value.get("arguments") {
                    Some(Value::Array(args)) => args.clone(),
                    None | Some(Value::Null) => Vec::new(),
                    Some(_) => return Err(HubError::Protocol("Invocation 'arguments' is not an array".to_string())),
                };
                let invocation_id = value.get("invocationId").and_then(Value::as_str).map(str::to_string);
                Ok(HubMessage::Invocation {
                    target,
                    arguments,
                    invocation_id,
                })
            }
            TYPE_COMPLETION => {
                let invocation_id = value
                    .get("invocationId")
                    .and_then(Value::as_str)
                    .ok_or_else(|| HubError::Protocol("Completion missing 'invocationId'".to_string()))?
                    .to_string();
                let error = value.get("error").and_then(Value::as_str).map(str::to_string);
                Ok(HubMessage::Completion { invocation_id, error })
            }
            TYPE_PING => Ok(HubMessage::Ping),
            TYPE_CLOSE => Ok(HubMessage::Close {
                error: value.get("error").and_then(Value::as_str).map(str::to_string),
                allow_reconnect: value.get("allowReconnect").and_then(Value::as_bool).unwrap_or(false),
            }),
            other => Ok(HubMessage::Other(other)),
        }
    }
}

/// Split a transport payload into its record-separated frames
///
/// Empty segments (the tail after the final separator) are skipped.
pub fn split_frames(payload: &str) -> impl Iterator<Item = &str> {
    payload.split(RECORD_SEPARATOR).filter(|frame| !frame.trim().is_empty())
}

/// Decode every frame in a transport payload
///
/// A bad frame yields an error entry without affecting its neighbours.
pub fn decode_frames(payload: &str) -> Vec<Result<HubMessage, HubError>> {
    split_frames(payload)
        .map(|frame| {
            serde_json::from_str::<Value>(frame)
                .map_err(|e| HubError::Protocol(format!("Invalid JSON frame: {}", e)))
                .and_then(HubMessage::from_value)
        })
        .collect()
}
