//! Proof exchange state machine
//!
//! Every transition has the same shape: load or receive the exchange
//! record, validate that the required antecedent message is present,
//! build the next message threaded to the exchange, persist the updated
//! record, and hand the message back for delivery. Transitions that
//! read-modify-write an existing record hold that record's lock so two
//! concurrent calls cannot both observe the same antecedent state and
//! both commit.

use std::sync::Arc;

use kestrel_agent::InboundMessageContext;
use kestrel_core::{AgentError, AgentResult, ThreadDecorator, TypedMessage};
use kestrel_storage::{tags, Repository};
use tracing::debug;

use super::messages::{
    PresentationAckMessage, PresentationMessage, ProposePresentationMessage,
    RequestPresentationMessage, ProofRequest,
};
use super::record::{ProofRecord, ProofState};

/// The prover's credential selection for a presentation
///
/// What the selection means is the wallet's business; the core stores and
/// forwards it.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RequestedCredentials {
    /// Credential referent per requested attribute referent
    #[serde(default)]
    pub requested_attributes: std::collections::BTreeMap<String, String>,
    /// Self-attested value per requested attribute referent
    #[serde(default)]
    pub self_attested_attributes: std::collections::BTreeMap<String, String>,
}

/// Drives proof exchanges against the proof record repository
pub struct ProofService {
    proof_repository: Arc<Repository<ProofRecord>>,
}

impl ProofService {
    /// Create a service over the given repository
    pub fn new(proof_repository: Arc<Repository<ProofRecord>>) -> Self {
        Self { proof_repository }
    }

    /// Prover: start an exchange with a proposal
    pub async fn create_proposal(
        &self,
        connection_id: &str,
        message: ProposePresentationMessage,
    ) -> AgentResult<(ProofRecord, ProposePresentationMessage)> {
        let mut record = ProofRecord::new(
            connection_id,
            message.meta().thread_id(),
            ProofState::ProposalSent,
        );
        record.proposal_message = Some(message.clone());
        self.proof_repository.save(&record).await?;
        debug!(record_id = %record.id, thread_id = %record.thread_id, "created proof proposal");
        Ok((record, message))
    }

    /// Verifier: receive a proposal, creating the exchange record
    ///
    /// Exactly one record exists per `(connection_id, thread_id)`, so a
    /// redelivered proposal is rejected rather than creating a twin.
    pub async fn process_proposal(
        &self,
        context: &InboundMessageContext,
    ) -> AgentResult<ProofRecord> {
        let connection = context.connection()?;
        let message = ProposePresentationMessage::from_wire(&context.message)?;
        let thread_id = message.meta().thread_id().to_string();

        if let Some(existing) = self
            .find_by_connection_and_thread_id(&connection.id, &thread_id)
            .await?
        {
            return Err(AgentError::protocol_state(format!(
                "proof record {} already exists for thread {thread_id}",
                existing.id
            )));
        }

        let mut record = ProofRecord::new(
            connection.id.clone(),
            thread_id,
            ProofState::ProposalReceived,
        );
        record.proposal_message = Some(message);
        self.proof_repository.save(&record).await?;
        Ok(record)
    }

    /// Verifier: answer a received proposal with a request
    ///
    /// Requires the record to be `ProposalReceived` with the proposal
    /// message stored; anything else is a `ProtocolState` error and leaves
    /// the record untouched.
    pub async fn create_request_as_response(
        &self,
        record_id: &str,
        request: ProofRequest,
        comment: Option<String>,
    ) -> AgentResult<(ProofRecord, RequestPresentationMessage)> {
        let _guard = self.proof_repository.lock_record(record_id).await;

        let mut record = self.proof_repository.get_by_id(record_id).await?;
        record.assert_state(ProofState::ProposalReceived)?;
        let proposal = record.proposal_message.as_ref().ok_or_else(|| {
            AgentError::protocol_state(format!(
                "proof record {record_id} is missing its presentation proposal"
            ))
        })?;

        let thread = ThreadDecorator::new(record.thread_id.clone())
            .with_parent(proposal.meta.id.clone());
        let message = RequestPresentationMessage::new(request, comment, Some(thread));

        record.request_message = Some(message.clone());
        record.state = ProofState::RequestSent;
        self.proof_repository.update(&record).await?;
        Ok((record, message))
    }

    /// Verifier: start an exchange with a request (no prior proposal)
    pub async fn create_request(
        &self,
        connection_id: &str,
        request: ProofRequest,
        comment: Option<String>,
    ) -> AgentResult<(ProofRecord, RequestPresentationMessage)> {
        let message = RequestPresentationMessage::new(request, comment, None);
        let mut record = ProofRecord::new(
            connection_id,
            message.meta().thread_id(),
            ProofState::RequestSent,
        );
        record.request_message = Some(message.clone());
        self.proof_repository.save(&record).await?;
        Ok((record, message))
    }

    /// Prover: receive a request, either answering a sent proposal or
    /// starting a verifier-initiated exchange
    pub async fn process_request(
        &self,
        context: &InboundMessageContext,
    ) -> AgentResult<ProofRecord> {
        let connection = context.connection()?;
        let message = RequestPresentationMessage::from_wire(&context.message)?;
        let thread_id = message.meta().thread_id().to_string();

        match self
            .find_by_connection_and_thread_id(&connection.id, &thread_id)
            .await?
        {
            Some(existing) => {
                let _guard = self.proof_repository.lock_record(&existing.id).await;
                let mut record = self.proof_repository.get_by_id(&existing.id).await?;
                record.assert_state(ProofState::ProposalSent)?;
                record.request_message = Some(message);
                record.state = ProofState::RequestReceived;
                self.proof_repository.update(&record).await?;
                Ok(record)
            }
            None => {
                let mut record = ProofRecord::new(
                    connection.id.clone(),
                    thread_id,
                    ProofState::RequestReceived,
                );
                record.request_message = Some(message);
                self.proof_repository.save(&record).await?;
                Ok(record)
            }
        }
    }

    /// Prover: answer a received request with a presentation
    ///
    /// Requires the record to be `RequestReceived` with the request stored.
    pub async fn create_presentation(
        &self,
        record_id: &str,
        requested_credentials: &RequestedCredentials,
        comment: Option<String>,
    ) -> AgentResult<(ProofRecord, PresentationMessage)> {
        let _guard = self.proof_repository.lock_record(record_id).await;

        let mut record = self.proof_repository.get_by_id(record_id).await?;
        record.assert_state(ProofState::RequestReceived)?;
        let request = record.request_message.as_ref().ok_or_else(|| {
            AgentError::protocol_state(format!(
                "proof record {record_id} is missing its presentation request"
            ))
        })?;

        // The real presentation body comes from the external wallet; the
        // core binds the selection to the request's nonce and forwards it.
        let presentations = serde_json::json!({
            "nonce": request.request_presentations.nonce,
            "requested_proof": requested_credentials,
        });

        let thread = ThreadDecorator::new(record.thread_id.clone())
            .with_parent(request.meta.id.clone());
        let message = PresentationMessage::new(presentations, comment, thread);

        record.presentation_message = Some(message.clone());
        record.state = ProofState::PresentationSent;
        self.proof_repository.update(&record).await?;
        Ok((record, message))
    }

    /// Verifier: receive the presentation
    pub async fn process_presentation(
        &self,
        context: &InboundMessageContext,
    ) -> AgentResult<ProofRecord> {
        let connection = context.connection()?;
        let message = PresentationMessage::from_wire(&context.message)?;

        let existing = self
            .get_by_connection_and_thread_id(&connection.id, context.message.thread_id())
            .await?;
        let _guard = self.proof_repository.lock_record(&existing.id).await;
        let mut record = self.proof_repository.get_by_id(&existing.id).await?;
        record.assert_state(ProofState::RequestSent)?;
        record.presentation_message = Some(message);
        record.state = ProofState::PresentationReceived;
        self.proof_repository.update(&record).await?;
        Ok(record)
    }

    /// Verifier: acknowledge a received presentation
    ///
    /// Requires the record to be `PresentationReceived` with the
    /// presentation stored.
    pub async fn create_ack(
        &self,
        record_id: &str,
    ) -> AgentResult<(ProofRecord, PresentationAckMessage)> {
        let _guard = self.proof_repository.lock_record(record_id).await;

        let mut record = self.proof_repository.get_by_id(record_id).await?;
        record.assert_state(ProofState::PresentationReceived)?;
        let presentation = record.presentation_message.as_ref().ok_or_else(|| {
            AgentError::protocol_state(format!(
                "proof record {record_id} is missing its presentation"
            ))
        })?;

        let thread = ThreadDecorator::new(record.thread_id.clone())
            .with_parent(presentation.meta.id.clone());
        let message = PresentationAckMessage::new(thread);

        record.state = ProofState::Done;
        self.proof_repository.update(&record).await?;
        Ok((record, message))
    }

    /// Prover: receive the acknowledgement, completing the exchange
    pub async fn process_ack(&self, context: &InboundMessageContext) -> AgentResult<ProofRecord> {
        let connection = context.connection()?;
        PresentationAckMessage::from_wire(&context.message)?;

        let existing = self
            .get_by_connection_and_thread_id(&connection.id, context.message.thread_id())
            .await?;
        let _guard = self.proof_repository.lock_record(&existing.id).await;
        let mut record = self.proof_repository.get_by_id(&existing.id).await?;
        record.assert_state(ProofState::PresentationSent)?;
        record.state = ProofState::Done;
        self.proof_repository.update(&record).await?;
        Ok(record)
    }

    /// Get a record by id, failing when absent
    pub async fn get_by_id(&self, record_id: &str) -> AgentResult<ProofRecord> {
        self.proof_repository.get_by_id(record_id).await
    }

    /// Look up a record by id
    pub async fn find_by_id(&self, record_id: &str) -> AgentResult<Option<ProofRecord>> {
        self.proof_repository.find_by_id(record_id).await
    }

    /// All proof records
    pub async fn get_all(&self) -> AgentResult<Vec<ProofRecord>> {
        self.proof_repository.get_all().await
    }

    /// The unique record for one exchange on one connection
    pub async fn get_by_connection_and_thread_id(
        &self,
        connection_id: &str,
        thread_id: &str,
    ) -> AgentResult<ProofRecord> {
        self.proof_repository
            .get_single_by_query(&tags([
                ("connection_id", Some(connection_id)),
                ("thread_id", Some(thread_id)),
            ]))
            .await
    }

    async fn find_by_connection_and_thread_id(
        &self,
        connection_id: &str,
        thread_id: &str,
    ) -> AgentResult<Option<ProofRecord>> {
        match self.get_by_connection_and_thread_id(connection_id, thread_id).await {
            Ok(record) => Ok(Some(record)),
            Err(AgentError::RecordNotFound { .. }) => Ok(None),
            Err(error) => Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::messages::PresentationPreview;
    use assert_matches::assert_matches;
    use kestrel_core::WireMessage;
    use kestrel_storage::InMemoryStorage;
    use kestrel_testkit::mock_connection;

    fn service() -> (ProofService, Arc<Repository<ProofRecord>>) {
        let repository = Arc::new(Repository::new(Arc::new(InMemoryStorage::new())));
        (ProofService::new(Arc::clone(&repository)), repository)
    }

    fn inbound(message: WireMessage, connection_id: &str) -> InboundMessageContext {
        InboundMessageContext {
            message,
            sender_key: Some("their-verkey".to_string()),
            recipient_key: Some("our-verkey".to_string()),
            connection: Some(mock_connection(connection_id)),
            session_id: None,
        }
    }

    fn proof_request() -> ProofRequest {
        ProofRequest {
            name: "proof-request".to_string(),
            version: "1.0".to_string(),
            nonce: "12345".to_string(),
            requested_attributes: Default::default(),
            requested_predicates: Default::default(),
        }
    }

    async fn received_proposal_record(repository: &Repository<ProofRecord>) -> ProofRecord {
        let proposal = ProposePresentationMessage::new(PresentationPreview::default(), None);
        let mut record = ProofRecord::new(
            "conn-1",
            proposal.meta.thread_id().to_string(),
            ProofState::ProposalReceived,
        );
        record.proposal_message = Some(proposal);
        repository.save(&record).await.unwrap();
        record
    }

    #[tokio::test]
    async fn proposal_assigns_thread_id_from_first_message() {
        let (service, _) = service();
        let message = ProposePresentationMessage::new(PresentationPreview::default(), None);
        let message_id = message.meta.id.clone();

        let (record, _) = service.create_proposal("conn-1", message).await.unwrap();
        assert_eq!(record.thread_id, message_id);
        assert_eq!(record.state, ProofState::ProposalSent);
    }

    #[tokio::test]
    async fn redelivered_proposal_does_not_create_a_second_record() {
        let (service, _) = service();
        let proposal = ProposePresentationMessage::new(PresentationPreview::default(), None);
        let context = inbound(proposal.to_wire().unwrap(), "conn-1");

        let record = service.process_proposal(&context).await.unwrap();
        assert_matches!(
            service.process_proposal(&context).await,
            Err(AgentError::ProtocolState { .. })
        );

        // The exchange still resolves to its single record.
        let found = service
            .get_by_connection_and_thread_id("conn-1", &record.thread_id)
            .await
            .unwrap();
        assert_eq!(found.id, record.id);
    }

    #[tokio::test]
    async fn request_as_response_threads_to_the_exchange() {
        let (service, repository) = service();
        let record = received_proposal_record(&repository).await;
        let proposal_id = record.proposal_message.as_ref().unwrap().meta.id.clone();

        let (updated, message) = service
            .create_request_as_response(&record.id, proof_request(), None)
            .await
            .unwrap();

        assert_eq!(updated.state, ProofState::RequestSent);
        assert_eq!(message.meta.thread_id(), record.thread_id);
        assert_eq!(message.meta.parent_thread_id(), Some(proposal_id.as_str()));
    }

    #[tokio::test]
    async fn request_without_stored_proposal_fails_and_mutates_nothing() {
        let (service, repository) = service();
        // A record claiming ProposalReceived but missing the proposal.
        let record = ProofRecord::new("conn-1", "thread-1", ProofState::ProposalReceived);
        repository.save(&record).await.unwrap();

        assert_matches!(
            service
                .create_request_as_response(&record.id, proof_request(), None)
                .await,
            Err(AgentError::ProtocolState { .. })
        );

        let reloaded = repository.get_by_id(&record.id).await.unwrap();
        assert_eq!(reloaded, record);
    }

    #[tokio::test]
    async fn request_in_wrong_state_is_a_protocol_state_error() {
        let (service, repository) = service();
        let record = ProofRecord::new("conn-1", "thread-1", ProofState::Done);
        repository.save(&record).await.unwrap();

        assert_matches!(
            service
                .create_request_as_response(&record.id, proof_request(), None)
                .await,
            Err(AgentError::ProtocolState { .. })
        );
    }

    #[tokio::test]
    async fn concurrent_accepts_of_one_proposal_cannot_both_succeed() {
        let (service, repository) = service();
        let service = Arc::new(service);
        let record = received_proposal_record(&repository).await;

        let tasks: Vec<_> = (0..2)
            .map(|_| {
                let service = Arc::clone(&service);
                let record_id = record.id.clone();
                tokio::spawn(async move {
                    service
                        .create_request_as_response(&record_id, proof_request(), None)
                        .await
                })
            })
            .collect();

        let mut successes = 0;
        let mut state_errors = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => successes += 1,
                Err(AgentError::ProtocolState { .. }) => state_errors += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!((successes, state_errors), (1, 1));
    }
}
