//! Proof exchange record

use kestrel_core::{AgentError, AgentResult};
use kestrel_storage::{tags, Record, RecordTags};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::messages::{PresentationMessage, ProposePresentationMessage, RequestPresentationMessage};

/// State of one proof exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProofState {
    /// Prover sent a proposal
    ProposalSent,
    /// Verifier received a proposal
    ProposalReceived,
    /// Verifier sent a request
    RequestSent,
    /// Prover received a request
    RequestReceived,
    /// Prover sent the presentation
    PresentationSent,
    /// Verifier received the presentation
    PresentationReceived,
    /// Exchange acknowledged and complete
    Done,
}

/// Persisted state of one proof exchange
///
/// Exactly one record exists per `(connection_id, thread_id)`; the thread
/// id is assigned at creation from the first message of the exchange and
/// every later message carries it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProofRecord {
    /// Record id
    pub id: String,
    /// Owning connection
    pub connection_id: String,
    /// Exchange thread id
    pub thread_id: String,
    /// Current state
    pub state: ProofState,
    /// Stored proposal, once one was sent or received
    pub proposal_message: Option<ProposePresentationMessage>,
    /// Stored request, once one was sent or received
    pub request_message: Option<RequestPresentationMessage>,
    /// Stored presentation, once one was sent or received
    pub presentation_message: Option<PresentationMessage>,
    /// Creation time
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl ProofRecord {
    /// Create a record for a new exchange
    pub fn new(connection_id: impl Into<String>, thread_id: impl Into<String>, state: ProofState) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            connection_id: connection_id.into(),
            thread_id: thread_id.into(),
            state,
            proposal_message: None,
            request_message: None,
            presentation_message: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    /// Fail with `ProtocolState` unless the record is in `expected` state
    pub fn assert_state(&self, expected: ProofState) -> AgentResult<()> {
        if self.state != expected {
            return Err(AgentError::protocol_state(format!(
                "proof record {} is in state {:?}, expected {expected:?}",
                self.id, self.state
            )));
        }
        Ok(())
    }
}

impl Record for ProofRecord {
    const RECORD_TYPE: &'static str = "ProofRecord";

    fn id(&self) -> &str {
        &self.id
    }

    fn tags(&self) -> RecordTags {
        tags([
            ("connection_id", Some(self.connection_id.clone())),
            ("thread_id", Some(self.thread_id.clone())),
        ])
    }
}
