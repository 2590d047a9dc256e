//! Present-proof message handlers
//!
//! Handlers record the inbound transition and return no response: whether
//! and when to continue the exchange is a decision for the agent's owner,
//! made through the module API.

use std::sync::Arc;

use async_trait::async_trait;
use kestrel_agent::{Handler, InboundMessageContext, OutboundMessage};
use kestrel_core::AgentResult;

use super::messages::{
    PRESENTATION_ACK_TYPE, PRESENTATION_TYPE, PROPOSE_PRESENTATION_TYPE,
    REQUEST_PRESENTATION_TYPE,
};
use super::service::ProofService;

/// Verifier side: an inbound presentation proposal
pub struct ProposePresentationHandler {
    proof_service: Arc<ProofService>,
}

impl ProposePresentationHandler {
    /// Create the handler
    pub fn new(proof_service: Arc<ProofService>) -> Self {
        Self { proof_service }
    }
}

#[async_trait]
impl Handler for ProposePresentationHandler {
    fn supported_messages(&self) -> &'static [&'static str] {
        &[PROPOSE_PRESENTATION_TYPE]
    }

    async fn handle(
        &self,
        context: &InboundMessageContext,
    ) -> AgentResult<Option<OutboundMessage>> {
        self.proof_service.process_proposal(context).await?;
        Ok(None)
    }
}

/// Prover side: an inbound presentation request
pub struct RequestPresentationHandler {
    proof_service: Arc<ProofService>,
}

impl RequestPresentationHandler {
    /// Create the handler
    pub fn new(proof_service: Arc<ProofService>) -> Self {
        Self { proof_service }
    }
}

#[async_trait]
impl Handler for RequestPresentationHandler {
    fn supported_messages(&self) -> &'static [&'static str] {
        &[REQUEST_PRESENTATION_TYPE]
    }

    async fn handle(
        &self,
        context: &InboundMessageContext,
    ) -> AgentResult<Option<OutboundMessage>> {
        self.proof_service.process_request(context).await?;
        Ok(None)
    }
}

/// Verifier side: the inbound presentation
pub struct PresentationHandler {
    proof_service: Arc<ProofService>,
}

impl PresentationHandler {
    /// Create the handler
    pub fn new(proof_service: Arc<ProofService>) -> Self {
        Self { proof_service }
    }
}

#[async_trait]
impl Handler for PresentationHandler {
    fn supported_messages(&self) -> &'static [&'static str] {
        &[PRESENTATION_TYPE]
    }

    async fn handle(
        &self,
        context: &InboundMessageContext,
    ) -> AgentResult<Option<OutboundMessage>> {
        self.proof_service.process_presentation(context).await?;
        Ok(None)
    }
}

/// Prover side: the inbound acknowledgement
pub struct PresentationAckHandler {
    proof_service: Arc<ProofService>,
}

impl PresentationAckHandler {
    /// Create the handler
    pub fn new(proof_service: Arc<ProofService>) -> Self {
        Self { proof_service }
    }
}

#[async_trait]
impl Handler for PresentationAckHandler {
    fn supported_messages(&self) -> &'static [&'static str] {
        &[PRESENTATION_ACK_TYPE]
    }

    async fn handle(
        &self,
        context: &InboundMessageContext,
    ) -> AgentResult<Option<OutboundMessage>> {
        self.proof_service.process_ack(context).await?;
        Ok(None)
    }
}
