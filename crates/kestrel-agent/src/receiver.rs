//! Inbound receive entry point
//!
//! External inbound transporters hand raw wire input here, optionally with
//! the live session it arrived on. A failure to unpack or handle one
//! message aborts that message only, never the receive loop.

use std::sync::Arc;

use kestrel_core::{AgentError, AgentResult};
use kestrel_storage::{tags, Repository};
use tracing::{debug, warn};

use crate::connections::ConnectionRecord;
use crate::dispatcher::{Dispatcher, InboundMessageContext};
use crate::envelope::EnvelopeService;
use crate::sender::MessageSender;
use crate::transport::{TransportService, TransportSession};

/// Unpacks, contextualizes, and dispatches inbound wire messages
pub struct MessageReceiver {
    envelope_service: Arc<dyn EnvelopeService>,
    dispatcher: Arc<Dispatcher>,
    transport_service: Arc<TransportService>,
    connection_repository: Arc<Repository<ConnectionRecord>>,
    message_sender: Arc<MessageSender>,
}

impl MessageReceiver {
    /// Wire up a receiver over the shared services
    pub fn new(
        envelope_service: Arc<dyn EnvelopeService>,
        dispatcher: Arc<Dispatcher>,
        transport_service: Arc<TransportService>,
        connection_repository: Arc<Repository<ConnectionRecord>>,
        message_sender: Arc<MessageSender>,
    ) -> Self {
        Self {
            envelope_service,
            dispatcher,
            transport_service,
            connection_repository,
            message_sender,
        }
    }

    /// Process one inbound wire message
    ///
    /// Unpacks the envelope, resolves the sending connection by the
    /// sender's key, registers the inbound session under that connection,
    /// dispatches, and delivers the handler's response when there is one.
    pub async fn receive_message(
        &self,
        wire_bytes: &[u8],
        session: Option<TransportSession>,
    ) -> AgentResult<()> {
        let decrypted = self.envelope_service.unpack(wire_bytes).await?;
        let message = decrypted.message;
        debug!(
            message_type = %message.message_type(),
            message_id = %message.id(),
            "received inbound message"
        );

        let connection = match &decrypted.sender_key {
            Some(sender_key) => self.find_connection_by_their_key(sender_key).await?,
            None => None,
        };

        let session_id = session.as_ref().map(|session| session.id.clone());
        if let (Some(connection), Some(session)) = (&connection, session) {
            // Same-channel responses for this connection go over the
            // freshest inbound session.
            self.transport_service.save_session(connection.id.clone(), session);
        }

        if connection.is_none() {
            warn!(
                message_id = %message.id(),
                "no connection found for inbound sender key"
            );
        }

        let context = InboundMessageContext {
            message,
            sender_key: decrypted.sender_key,
            recipient_key: decrypted.recipient_key,
            connection,
            session_id,
        };

        if let Some(outbound) = self.dispatcher.dispatch(&context).await? {
            self.message_sender.send_message(outbound).await?;
        }
        Ok(())
    }

    async fn find_connection_by_their_key(
        &self,
        their_key: &str,
    ) -> AgentResult<Option<ConnectionRecord>> {
        let mut matches = self
            .connection_repository
            .find_by_query(&tags([("their_key", Some(their_key))]))
            .await?;
        match matches.len() {
            0 => Ok(None),
            1 => Ok(Some(matches.remove(0))),
            n => Err(AgentError::record_duplicate(format!(
                "{n} connections share their_key {their_key}"
            ))),
        }
    }
}
