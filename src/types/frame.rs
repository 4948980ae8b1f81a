use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::types::Message;

/// A control frame the client sends over the socket.
///
/// Serialized as `{"command": <name>, "arguments": {..}}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "command", content = "arguments")]
pub enum ControlFrame {
    /// Authorize the connection with the user's token.
    #[serde(rename = "authorize")]
    Authorize {
        /// The user's auth token.
        token: String,
    },

    /// Subscribe the connection to a channel.
    #[serde(rename = "open channel")]
    OpenChannel {
        /// The channel identifier.
        id: String,
    },
}

impl ControlFrame {
    /// Create an `authorize` frame.
    pub fn authorize(token: impl Into<String>) -> Self {
        ControlFrame::Authorize {
            token: token.into(),
        }
    }

    /// Create an `open channel` frame.
    pub fn open_channel(id: impl Into<String>) -> Self {
        ControlFrame::OpenChannel { id: id.into() }
    }

    /// The wire name of the command.
    pub fn command(&self) -> &'static str {
        match self {
            ControlFrame::Authorize { .. } => "authorize",
            ControlFrame::OpenChannel { .. } => "open channel",
        }
    }

    /// Encode the frame as JSON text.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// A frame whose `payload` is a message.
    Message {
        /// The message carried in `payload`.
        payload: Message,
        /// The optional diagnostic `message` field.
        message: Option<String>,
    },

    /// A frame with no usable `payload`: absent, null, or not message-shaped.
    Invalid {
        /// The optional diagnostic `message` field.
        message: Option<String>,
        /// The whole frame, kept for diagnostics.
        raw: Value,
    },
}

impl InboundEvent {
    /// Decode a text frame.
    ///
    /// Text that is not JSON, or JSON that is not an object, is a decode
    /// error.  Anything object-shaped decodes, with frames lacking a usable
    /// payload becoming [`InboundEvent::Invalid`].
    pub fn decode(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text).map_err(|e| {
            Error::decode(
                format!("frame is not valid JSON: {e}"),
                text,
                Some(Box::new(e)),
            )
        })?;
        let Value::Object(object) = &value else {
            return Err(Error::decode("frame is not a JSON object", text, None));
        };
        let message = object
            .get("message")
            .and_then(Value::as_str)
            .map(String::from);
        match object.get("payload") {
            Some(payload) if !payload.is_null() => {
                match serde_json::from_value::<Message>(payload.clone()) {
                    Ok(payload) => Ok(InboundEvent::Message { payload, message }),
                    Err(_) => Ok(InboundEvent::Invalid {
                        message,
                        raw: value,
                    }),
                }
            }
            _ => Ok(InboundEvent::Invalid {
                message,
                raw: value,
            }),
        }
    }

    /// The frame's diagnostic `message` field, if it had one.
    pub fn diagnostic_message(&self) -> Option<&str> {
        match self {
            InboundEvent::Message { message, .. } | InboundEvent::Invalid { message, .. } => {
                message.as_deref()
            }
        }
    }

    /// Describe an invalid frame, preferring its `message` over a dump of the
    /// raw frame.
    pub fn diagnostic(&self) -> String {
        match self {
            InboundEvent::Invalid {
                message: Some(message),
                ..
            } => format!("Message: {message}"),
            InboundEvent::Invalid { raw, .. } => {
                let pretty = serde_json::to_string_pretty(raw).unwrap_or_else(|_| raw.to_string());
                format!("Websocket response:\n{pretty}")
            }
            InboundEvent::Message { payload, .. } => {
                format!("Message from {}", payload.sender)
            }
        }
    }
}
