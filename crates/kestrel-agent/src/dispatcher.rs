//! Inbound message dispatch
//!
//! Each message type URI maps to exactly one handler, chosen at startup.
//! The dispatcher never sends: a handler's outbound message is returned to
//! the caller (the agent's receive loop), which decides how to deliver it.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use kestrel_core::{AgentError, AgentResult, WireMessage};
use parking_lot::RwLock;
use tracing::debug;

use crate::connections::ConnectionRecord;
use crate::sender::OutboundMessage;

/// Delivery context for one inbound message
#[derive(Debug, Clone)]
pub struct InboundMessageContext {
    /// The unpacked message
    pub message: WireMessage,
    /// The sender's key, when the envelope was not anonymous
    pub sender_key: Option<String>,
    /// The local key the envelope was addressed to
    pub recipient_key: Option<String>,
    /// The connection resolved from the sender key, if any
    pub connection: Option<ConnectionRecord>,
    /// Id of the inbound session the message arrived on, if any
    pub session_id: Option<String>,
}

impl InboundMessageContext {
    /// The resolved connection, failing when the protocol requires one
    pub fn connection(&self) -> AgentResult<&ConnectionRecord> {
        self.connection.as_ref().ok_or_else(|| {
            AgentError::protocol_state(format!(
                "inbound message {} has no associated connection",
                self.message.id()
            ))
        })
    }
}

/// A protocol message handler
///
/// Declares the message types it supports; `handle` returns at most one
/// outbound message to be sent back.
#[async_trait]
pub trait Handler: Send + Sync {
    /// The `@type` URIs this handler accepts
    fn supported_messages(&self) -> &'static [&'static str];

    /// Process one inbound message
    async fn handle(&self, context: &InboundMessageContext)
        -> AgentResult<Option<OutboundMessage>>;
}

/// Registry routing inbound messages to their handler
#[derive(Default)]
pub struct Dispatcher {
    handlers: RwLock<HashMap<String, Arc<dyn Handler>>>,
}

impl Dispatcher {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for every message type it declares
    ///
    /// Registering a second handler for a type is a configuration error.
    pub fn register_handler(&self, handler: Arc<dyn Handler>) -> AgentResult<()> {
        let mut handlers = self.handlers.write();
        // Validate before inserting so a rejected handler registers nothing.
        for message_type in handler.supported_messages() {
            if handlers.contains_key(*message_type) {
                return Err(AgentError::configuration(format!(
                    "a handler is already registered for {message_type}"
                )));
            }
        }
        for message_type in handler.supported_messages() {
            handlers.insert((*message_type).to_string(), Arc::clone(&handler));
        }
        Ok(())
    }

    /// Route one inbound message to its handler
    pub async fn dispatch(
        &self,
        context: &InboundMessageContext,
    ) -> AgentResult<Option<OutboundMessage>> {
        let message_type = context.message.message_type().to_string();
        let handler = self
            .handlers
            .read()
            .get(&message_type)
            .cloned()
            .ok_or(AgentError::UnsupportedMessageType {
                message_type: message_type.clone(),
            })?;

        debug!(message_type = %message_type, message_id = %context.message.id(), "dispatching inbound message");
        handler.handle(context).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    struct StaticHandler {
        types: &'static [&'static str],
    }

    #[async_trait]
    impl Handler for StaticHandler {
        fn supported_messages(&self) -> &'static [&'static str] {
            self.types
        }

        async fn handle(
            &self,
            _context: &InboundMessageContext,
        ) -> AgentResult<Option<OutboundMessage>> {
            Ok(None)
        }
    }

    fn context_for(message_type: &str) -> InboundMessageContext {
        let message = WireMessage::from_value(serde_json::json!({
            "@id": "msg-1",
            "@type": message_type,
        }))
        .unwrap();
        InboundMessageContext {
            message,
            sender_key: None,
            recipient_key: None,
            connection: None,
            session_id: None,
        }
    }

    #[tokio::test]
    async fn duplicate_registration_is_a_configuration_error() {
        let dispatcher = Dispatcher::new();
        dispatcher
            .register_handler(Arc::new(StaticHandler {
                types: &["https://didcomm.org/test/1.0/a"],
            }))
            .unwrap();

        assert_matches!(
            dispatcher.register_handler(Arc::new(StaticHandler {
                types: &["https://didcomm.org/test/1.0/a", "https://didcomm.org/test/1.0/b"],
            })),
            Err(AgentError::Configuration { .. })
        );
    }

    #[tokio::test]
    async fn unknown_type_is_unsupported() {
        let dispatcher = Dispatcher::new();
        assert_matches!(
            dispatcher
                .dispatch(&context_for("https://didcomm.org/test/1.0/unknown"))
                .await,
            Err(AgentError::UnsupportedMessageType { message_type })
                if message_type == "https://didcomm.org/test/1.0/unknown"
        );
    }

    #[tokio::test]
    async fn dispatches_to_the_registered_handler() {
        let dispatcher = Dispatcher::new();
        dispatcher
            .register_handler(Arc::new(StaticHandler {
                types: &["https://didcomm.org/test/1.0/a"],
            }))
            .unwrap();

        let result = dispatcher
            .dispatch(&context_for("https://didcomm.org/test/1.0/a"))
            .await
            .unwrap();
        assert!(result.is_none());
    }
}
