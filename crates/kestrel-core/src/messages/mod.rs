//! Typed DIDComm message model
//!
//! Every protocol message embeds [`MessageMeta`] (flattened), which carries
//! the wire headers: `@id`, `@type`, and the optional decorators. Wire
//! naming is static serde data; there is no runtime field mapping.
//!
//! A message is immutable once constructed: builders set threading and
//! return-routing before the message is first serialized or stored.

mod decorators;
mod wire;

pub use decorators::{
    LocalizationDecorator, ReturnRoute, ThreadDecorator, TransportDecorator,
};
pub use wire::WireMessage;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AgentError, AgentResult};

/// Common wire headers embedded (flattened) in every typed message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageMeta {
    /// Unique id of this message instance
    #[serde(rename = "@id")]
    pub id: String,
    /// Message type URI: protocol + version + message name
    #[serde(rename = "@type")]
    pub message_type: String,
    /// Threading decorator
    #[serde(rename = "~thread", skip_serializing_if = "Option::is_none")]
    pub thread: Option<ThreadDecorator>,
    /// Transport decorator
    #[serde(rename = "~transport", skip_serializing_if = "Option::is_none")]
    pub transport: Option<TransportDecorator>,
    /// Localization decorator
    #[serde(rename = "~l10n", skip_serializing_if = "Option::is_none")]
    pub l10n: Option<LocalizationDecorator>,
}

impl MessageMeta {
    /// Create headers for a new message of the given type with a fresh id
    pub fn new(message_type: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            message_type: message_type.into(),
            thread: None,
            transport: None,
            l10n: None,
        }
    }

    /// Set the thread decorator
    pub fn with_thread(mut self, thread: ThreadDecorator) -> Self {
        self.thread = Some(thread);
        self
    }

    /// Set the return-route preference
    pub fn with_return_route(mut self, return_route: ReturnRoute) -> Self {
        self.transport = Some(TransportDecorator {
            return_route: Some(return_route),
        });
        self
    }

    /// The thread id, defaulting to the message's own id
    pub fn thread_id(&self) -> &str {
        self.thread
            .as_ref()
            .and_then(|thread| thread.thid.as_deref())
            .unwrap_or(&self.id)
    }

    /// The parent thread id, when present
    pub fn parent_thread_id(&self) -> Option<&str> {
        self.thread.as_ref().and_then(|thread| thread.pthid.as_deref())
    }

    /// Whether the receiver should respond inline on the same channel
    pub fn has_return_routing(&self) -> bool {
        self.transport
            .as_ref()
            .is_some_and(TransportDecorator::requests_return_routing)
    }
}

/// A concrete protocol message with a statically declared type URI
pub trait TypedMessage: Serialize + DeserializeOwned + Send + Sync {
    /// The `@type` URI this message kind carries on the wire
    const TYPE: &'static str;

    /// The embedded wire headers
    fn meta(&self) -> &MessageMeta;

    /// Serialize to the type-erased wire form
    fn to_wire(&self) -> AgentResult<WireMessage> {
        WireMessage::from_value(serde_json::to_value(self)?)
    }

    /// Deserialize from the wire form, rejecting a mismatched `@type`
    fn from_wire(wire: &WireMessage) -> AgentResult<Self> {
        if wire.message_type() != Self::TYPE {
            return Err(AgentError::serialization(format!(
                "expected message of type {}, got {}",
                Self::TYPE,
                wire.message_type()
            )));
        }
        Ok(serde_json::from_value(wire.as_value().clone())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const TEST_TYPE: &str = "https://didcomm.org/test-protocol/1.0/ping";

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct PingMessage {
        #[serde(flatten)]
        meta: MessageMeta,
        comment: Option<String>,
    }

    impl TypedMessage for PingMessage {
        const TYPE: &'static str = TEST_TYPE;

        fn meta(&self) -> &MessageMeta {
            &self.meta
        }
    }

    fn ping(comment: &str) -> PingMessage {
        PingMessage {
            meta: MessageMeta::new(TEST_TYPE),
            comment: Some(comment.to_string()),
        }
    }

    #[test]
    fn thread_id_defaults_to_message_id() {
        let message = ping("hello");
        assert_eq!(message.meta().thread_id(), message.meta().id);
    }

    #[test]
    fn thread_decorator_overrides_thread_id() {
        let message = PingMessage {
            meta: MessageMeta::new(TEST_TYPE)
                .with_thread(ThreadDecorator::new("thread-1").with_parent("parent-1")),
            comment: None,
        };
        assert_eq!(message.meta().thread_id(), "thread-1");
        assert_eq!(message.meta().parent_thread_id(), Some("parent-1"));
    }

    #[test]
    fn wire_round_trip_preserves_headers_and_fields() {
        let message = PingMessage {
            meta: MessageMeta::new(TEST_TYPE).with_return_route(ReturnRoute::All),
            comment: Some("round trip".to_string()),
        };

        let wire = message.to_wire().unwrap();
        assert_eq!(wire.message_type(), TEST_TYPE);
        assert_eq!(wire.id(), message.meta.id);
        assert!(wire.has_return_routing());

        let decoded = PingMessage::from_wire(&wire).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn from_wire_rejects_mismatched_type() {
        let other = serde_json::json!({
            "@id": "msg-1",
            "@type": "https://didcomm.org/other/1.0/pong",
        });
        let wire = WireMessage::from_value(other).unwrap();
        assert_matches!(
            PingMessage::from_wire(&wire),
            Err(AgentError::Serialization { .. })
        );
    }

    #[test]
    fn wire_message_requires_type_and_id() {
        let missing_id = serde_json::json!({ "@type": TEST_TYPE });
        assert_matches!(
            WireMessage::from_value(missing_id),
            Err(AgentError::Serialization { .. })
        );
        assert_matches!(
            WireMessage::from_bytes(b"not json"),
            Err(AgentError::Serialization { .. })
        );
    }
}
