//! Type-erased wire message
//!
//! The dispatcher routes on the `@type` of an unpacked message before any
//! concrete message type is known, so the post-unpack / pre-pack form is a
//! JSON value validated to carry the mandatory headers. Handlers turn it
//! into their typed message, never the other way around.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AgentError, AgentResult};

/// An unpacked DIDComm message in wire form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct WireMessage(Value);

impl WireMessage {
    /// Wrap a JSON value, validating the mandatory `@type` and `@id` headers
    pub fn from_value(value: Value) -> AgentResult<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| AgentError::serialization("wire message is not a JSON object"))?;
        for header in ["@type", "@id"] {
            if !object.get(header).is_some_and(Value::is_string) {
                return Err(AgentError::serialization(format!(
                    "wire message is missing the {header} header"
                )));
            }
        }
        Ok(Self(value))
    }

    /// Parse a wire message from raw JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> AgentResult<Self> {
        let value: Value = serde_json::from_slice(bytes)?;
        Self::from_value(value)
    }

    /// Serialize to raw JSON bytes
    pub fn to_bytes(&self) -> AgentResult<Vec<u8>> {
        Ok(serde_json::to_vec(&self.0)?)
    }

    /// The message type URI (`@type`)
    pub fn message_type(&self) -> &str {
        // Presence and string-ness are validated at construction.
        self.0["@type"].as_str().unwrap_or_default()
    }

    /// The message id (`@id`)
    pub fn id(&self) -> &str {
        self.0["@id"].as_str().unwrap_or_default()
    }

    /// The thread id, falling back to the message's own id when `~thread.thid`
    /// is absent
    pub fn thread_id(&self) -> &str {
        self.0["~thread"]["thid"].as_str().unwrap_or_else(|| self.id())
    }

    /// The parent thread id, when present
    pub fn parent_thread_id(&self) -> Option<&str> {
        self.0["~thread"]["pthid"].as_str()
    }

    /// Whether the sender asked for responses on the same channel
    pub fn has_return_routing(&self) -> bool {
        matches!(
            self.0["~transport"]["return_route"].as_str(),
            Some("all" | "thread")
        )
    }

    /// Borrow the underlying JSON value
    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

impl TryFrom<Value> for WireMessage {
    type Error = AgentError;

    fn try_from(value: Value) -> AgentResult<Self> {
        Self::from_value(value)
    }
}

impl From<WireMessage> for Value {
    fn from(message: WireMessage) -> Value {
        message.0
    }
}
