//! Present-proof module API
//!
//! The facade the agent's owner drives exchanges through: each call loads
//! the connection, asks the service for the next message, and hands it to
//! the sender. Configuration defaults are resolved here, at call entry.

use std::sync::Arc;

use kestrel_agent::{ConnectionRecord, Dispatcher, MessageSender, OutboundMessage};
use kestrel_core::{AgentError, AgentResult, TypedMessage};
use kestrel_storage::Repository;
use rand::Rng;

use super::handlers::{
    PresentationAckHandler, PresentationHandler, ProposePresentationHandler,
    RequestPresentationHandler,
};
use super::messages::{
    PresentationPreview, ProofAttributeInfo, ProofPredicateInfo, ProofRequest,
    ProposePresentationMessage,
};
use super::record::ProofRecord;
use super::service::{ProofService, RequestedCredentials};

/// Configuration for accepting a proposal with a request
///
/// Unset fields fall back to the documented defaults.
#[derive(Debug, Clone, Default)]
pub struct AcceptProposalConfig {
    /// Proof request name; defaults to `"proof-request"`
    pub request_name: Option<String>,
    /// Proof request version; defaults to `"1.0"`
    pub request_version: Option<String>,
    /// Nonce; a fresh one is generated when absent
    pub nonce: Option<String>,
    /// Free-text comment
    pub comment: Option<String>,
}

/// Options for a verifier-initiated proof request
#[derive(Debug, Clone, Default)]
pub struct RequestProofOptions {
    /// Proof request name; defaults to `"proof-request"`
    pub name: Option<String>,
    /// Nonce; a fresh one is generated when absent
    pub nonce: Option<String>,
    /// Requested attributes, keyed by referent
    pub requested_attributes: std::collections::BTreeMap<String, ProofAttributeInfo>,
    /// Requested predicates, keyed by referent
    pub requested_predicates: std::collections::BTreeMap<String, ProofPredicateInfo>,
}

/// Present-proof module facade
pub struct ProofsModule {
    proof_service: Arc<ProofService>,
    connection_repository: Arc<Repository<ConnectionRecord>>,
    message_sender: Arc<MessageSender>,
}

impl ProofsModule {
    /// Wire the module and register its handlers with the dispatcher
    pub fn new(
        dispatcher: &Dispatcher,
        proof_service: Arc<ProofService>,
        connection_repository: Arc<Repository<ConnectionRecord>>,
        message_sender: Arc<MessageSender>,
    ) -> AgentResult<Self> {
        dispatcher.register_handler(Arc::new(ProposePresentationHandler::new(Arc::clone(
            &proof_service,
        ))))?;
        dispatcher.register_handler(Arc::new(RequestPresentationHandler::new(Arc::clone(
            &proof_service,
        ))))?;
        dispatcher.register_handler(Arc::new(PresentationHandler::new(Arc::clone(
            &proof_service,
        ))))?;
        dispatcher.register_handler(Arc::new(PresentationAckHandler::new(Arc::clone(
            &proof_service,
        ))))?;

        Ok(Self {
            proof_service,
            connection_repository,
            message_sender,
        })
    }

    /// Prover: start an exchange by proposing a presentation
    pub async fn propose_proof(
        &self,
        connection_id: &str,
        presentation_proposal: PresentationPreview,
        comment: Option<String>,
    ) -> AgentResult<ProofRecord> {
        let connection = self.connection_repository.get_by_id(connection_id).await?;

        let message = ProposePresentationMessage::new(presentation_proposal, comment);
        let (record, message) = self
            .proof_service
            .create_proposal(connection_id, message)
            .await?;

        self.message_sender
            .send_message(OutboundMessage::new(connection, message.to_wire()?))
            .await?;
        Ok(record)
    }

    /// Verifier: accept a received proposal by sending a request
    ///
    /// The request is built from the stored proposal; a record without one
    /// is a `ProtocolState` error and nothing is sent or mutated.
    pub async fn accept_proposal(
        &self,
        record_id: &str,
        config: AcceptProposalConfig,
    ) -> AgentResult<ProofRecord> {
        let record = self.proof_service.get_by_id(record_id).await?;
        let connection = self
            .connection_repository
            .get_by_id(&record.connection_id)
            .await?;

        let proposal = record.proposal_message.as_ref().ok_or_else(|| {
            AgentError::protocol_state(format!(
                "proof record {record_id} is missing its presentation proposal"
            ))
        })?;
        let request = proof_request_from_proposal(
            &proposal.presentation_proposal,
            config.request_name.unwrap_or_else(|| "proof-request".to_string()),
            config.request_version.unwrap_or_else(|| "1.0".to_string()),
            config.nonce.unwrap_or_else(generate_nonce),
        );

        let (record, message) = self
            .proof_service
            .create_request_as_response(record_id, request, config.comment)
            .await?;

        self.message_sender
            .send_message(OutboundMessage::new(connection, message.to_wire()?))
            .await?;
        Ok(record)
    }

    /// Verifier: start an exchange by requesting a presentation
    pub async fn request_proof(
        &self,
        connection_id: &str,
        options: RequestProofOptions,
        comment: Option<String>,
    ) -> AgentResult<ProofRecord> {
        let connection = self.connection_repository.get_by_id(connection_id).await?;

        let request = ProofRequest {
            name: options.name.unwrap_or_else(|| "proof-request".to_string()),
            version: "1.0".to_string(),
            nonce: options.nonce.unwrap_or_else(generate_nonce),
            requested_attributes: options.requested_attributes,
            requested_predicates: options.requested_predicates,
        };

        let (record, message) = self
            .proof_service
            .create_request(connection_id, request, comment)
            .await?;

        self.message_sender
            .send_message(OutboundMessage::new(connection, message.to_wire()?))
            .await?;
        Ok(record)
    }

    /// Prover: accept a received request by sending the presentation
    pub async fn accept_request(
        &self,
        record_id: &str,
        requested_credentials: &RequestedCredentials,
        comment: Option<String>,
    ) -> AgentResult<ProofRecord> {
        let record = self.proof_service.get_by_id(record_id).await?;
        let connection = self
            .connection_repository
            .get_by_id(&record.connection_id)
            .await?;

        let (record, message) = self
            .proof_service
            .create_presentation(record_id, requested_credentials, comment)
            .await?;

        self.message_sender
            .send_message(OutboundMessage::new(connection, message.to_wire()?))
            .await?;
        Ok(record)
    }

    /// Verifier: acknowledge a received presentation
    pub async fn accept_presentation(&self, record_id: &str) -> AgentResult<ProofRecord> {
        let record = self.proof_service.get_by_id(record_id).await?;
        let connection = self
            .connection_repository
            .get_by_id(&record.connection_id)
            .await?;

        let (record, message) = self.proof_service.create_ack(record_id).await?;

        self.message_sender
            .send_message(OutboundMessage::new(connection, message.to_wire()?))
            .await?;
        Ok(record)
    }

    /// All proof records
    pub async fn get_all(&self) -> AgentResult<Vec<ProofRecord>> {
        self.proof_service.get_all().await
    }

    /// Get a record by id, failing when absent
    pub async fn get_by_id(&self, record_id: &str) -> AgentResult<ProofRecord> {
        self.proof_service.get_by_id(record_id).await
    }

    /// Look up a record by id
    pub async fn find_by_id(&self, record_id: &str) -> AgentResult<Option<ProofRecord>> {
        self.proof_service.find_by_id(record_id).await
    }

    /// The unique record for one exchange on one connection
    pub async fn get_by_connection_and_thread_id(
        &self,
        connection_id: &str,
        thread_id: &str,
    ) -> AgentResult<ProofRecord> {
        self.proof_service
            .get_by_connection_and_thread_id(connection_id, thread_id)
            .await
    }
}

/// Build a proof request covering everything a proposal offered
fn proof_request_from_proposal(
    proposal: &PresentationPreview,
    name: String,
    version: String,
    nonce: String,
) -> ProofRequest {
    let requested_attributes = proposal
        .attributes
        .iter()
        .enumerate()
        .map(|(index, attribute)| {
            (
                format!("attr_{index}_{}", attribute.name),
                ProofAttributeInfo {
                    name: attribute.name.clone(),
                    cred_def_id: attribute.cred_def_id.clone(),
                },
            )
        })
        .collect();
    let requested_predicates = proposal
        .predicates
        .iter()
        .enumerate()
        .map(|(index, predicate)| {
            (
                format!("pred_{index}_{}", predicate.name),
                ProofPredicateInfo {
                    name: predicate.name.clone(),
                    p_type: predicate.predicate.clone(),
                    p_value: predicate.threshold,
                    cred_def_id: predicate.cred_def_id.clone(),
                },
            )
        })
        .collect();

    ProofRequest {
        name,
        version,
        nonce,
        requested_attributes,
        requested_predicates,
    }
}

/// A fresh decimal nonce for one proof request
fn generate_nonce() -> String {
    let mut rng = rand::thread_rng();
    (0..24).map(|_| char::from(b'0' + rng.gen_range(0..10u8))).collect()
}
