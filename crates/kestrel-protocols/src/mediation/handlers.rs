//! Keylist-update handlers
//!
//! The mediator handler answers inline: the response message is returned
//! from `handle` and the receive loop delivers it, over the inbound
//! session when the update asked for return routing.

use std::sync::Arc;

use async_trait::async_trait;
use kestrel_agent::{Handler, InboundMessageContext, OutboundMessage};
use kestrel_core::{AgentResult, TypedMessage};

use super::messages::{KEYLIST_UPDATE_RESPONSE_TYPE, KEYLIST_UPDATE_TYPE};
use super::service::MediationService;

/// Mediator side: an inbound keylist update
pub struct KeylistUpdateHandler {
    mediation_service: Arc<MediationService>,
}

impl KeylistUpdateHandler {
    /// Create the handler
    pub fn new(mediation_service: Arc<MediationService>) -> Self {
        Self { mediation_service }
    }
}

#[async_trait]
impl Handler for KeylistUpdateHandler {
    fn supported_messages(&self) -> &'static [&'static str] {
        &[KEYLIST_UPDATE_TYPE]
    }

    async fn handle(
        &self,
        context: &InboundMessageContext,
    ) -> AgentResult<Option<OutboundMessage>> {
        let response = self.mediation_service.process_keylist_update(context).await?;
        let connection = context.connection()?.clone();
        Ok(Some(OutboundMessage::new(connection, response.to_wire()?)))
    }
}

/// Recipient side: the mediator's response to our keylist update
pub struct KeylistUpdateResponseHandler {
    mediation_service: Arc<MediationService>,
}

impl KeylistUpdateResponseHandler {
    /// Create the handler
    pub fn new(mediation_service: Arc<MediationService>) -> Self {
        Self { mediation_service }
    }
}

#[async_trait]
impl Handler for KeylistUpdateResponseHandler {
    fn supported_messages(&self) -> &'static [&'static str] {
        &[KEYLIST_UPDATE_RESPONSE_TYPE]
    }

    async fn handle(
        &self,
        context: &InboundMessageContext,
    ) -> AgentResult<Option<OutboundMessage>> {
        self.mediation_service
            .process_keylist_update_response(context)
            .await?;
        Ok(None)
    }
}
