//! Present-proof 1.0 messages

use std::collections::BTreeMap;

use kestrel_core::{MessageMeta, ThreadDecorator, TypedMessage};
use serde::{Deserialize, Serialize};

/// `@type` of the propose-presentation message
pub const PROPOSE_PRESENTATION_TYPE: &str =
    "https://didcomm.org/present-proof/1.0/propose-presentation";
/// `@type` of the request-presentation message
pub const REQUEST_PRESENTATION_TYPE: &str =
    "https://didcomm.org/present-proof/1.0/request-presentation";
/// `@type` of the presentation message
pub const PRESENTATION_TYPE: &str = "https://didcomm.org/present-proof/1.0/presentation";
/// `@type` of the presentation acknowledgement
pub const PRESENTATION_ACK_TYPE: &str = "https://didcomm.org/present-proof/1.0/ack";

/// One attribute the prover proposes to reveal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresentationPreviewAttribute {
    /// Attribute name
    pub name: String,
    /// Credential definition the attribute would come from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cred_def_id: Option<String>,
    /// Proposed value, when the prover chooses to disclose it up front
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// One predicate the prover proposes to prove
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresentationPreviewPredicate {
    /// Attribute name the predicate ranges over
    pub name: String,
    /// Comparison operator, e.g. `>=`
    pub predicate: String,
    /// Threshold value
    pub threshold: i64,
    /// Credential definition the attribute would come from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cred_def_id: Option<String>,
}

/// The prover's sketch of the presentation it is willing to make
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresentationPreview {
    /// Proposed attributes
    #[serde(default)]
    pub attributes: Vec<PresentationPreviewAttribute>,
    /// Proposed predicates
    #[serde(default)]
    pub predicates: Vec<PresentationPreviewPredicate>,
}

/// Prover → verifier: propose a presentation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposePresentationMessage {
    /// Wire headers
    #[serde(flatten)]
    pub meta: MessageMeta,
    /// Free-text comment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// The proposed presentation
    pub presentation_proposal: PresentationPreview,
}

impl ProposePresentationMessage {
    /// Create a proposal; its own id becomes the exchange thread id
    pub fn new(presentation_proposal: PresentationPreview, comment: Option<String>) -> Self {
        Self {
            meta: MessageMeta::new(PROPOSE_PRESENTATION_TYPE),
            comment,
            presentation_proposal,
        }
    }
}

impl TypedMessage for ProposePresentationMessage {
    const TYPE: &'static str = PROPOSE_PRESENTATION_TYPE;

    fn meta(&self) -> &MessageMeta {
        &self.meta
    }
}

/// One attribute requested by the verifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofAttributeInfo {
    /// Attribute name
    pub name: String,
    /// Credential definition restriction, when any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cred_def_id: Option<String>,
}

/// One predicate requested by the verifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofPredicateInfo {
    /// Attribute name the predicate ranges over
    pub name: String,
    /// Comparison operator, e.g. `>=`
    pub p_type: String,
    /// Threshold value
    pub p_value: i64,
    /// Credential definition restriction, when any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cred_def_id: Option<String>,
}

/// What the verifier asks the prover to prove
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofRequest {
    /// Request name
    pub name: String,
    /// Request version
    pub version: String,
    /// Verifier-chosen nonce binding the presentation to this request
    pub nonce: String,
    /// Requested attributes, keyed by referent
    #[serde(default)]
    pub requested_attributes: BTreeMap<String, ProofAttributeInfo>,
    /// Requested predicates, keyed by referent
    #[serde(default)]
    pub requested_predicates: BTreeMap<String, ProofPredicateInfo>,
}

/// Verifier → prover: request a presentation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestPresentationMessage {
    /// Wire headers
    #[serde(flatten)]
    pub meta: MessageMeta,
    /// Free-text comment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// The proof request
    pub request_presentations: ProofRequest,
}

impl RequestPresentationMessage {
    /// Create a request; when `thread` is `None` this starts a new exchange
    pub fn new(
        request: ProofRequest,
        comment: Option<String>,
        thread: Option<ThreadDecorator>,
    ) -> Self {
        let mut meta = MessageMeta::new(REQUEST_PRESENTATION_TYPE);
        if let Some(thread) = thread {
            meta = meta.with_thread(thread);
        }
        Self {
            meta,
            comment,
            request_presentations: request,
        }
    }
}

impl TypedMessage for RequestPresentationMessage {
    const TYPE: &'static str = REQUEST_PRESENTATION_TYPE;

    fn meta(&self) -> &MessageMeta {
        &self.meta
    }
}

/// Prover → verifier: the presentation itself
///
/// The presentation body is produced by the external wallet and is opaque
/// to the messaging core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresentationMessage {
    /// Wire headers
    #[serde(flatten)]
    pub meta: MessageMeta,
    /// Free-text comment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Wallet-produced presentation content
    pub presentations: serde_json::Value,
}

impl PresentationMessage {
    /// Create a presentation in an existing exchange thread
    pub fn new(
        presentations: serde_json::Value,
        comment: Option<String>,
        thread: ThreadDecorator,
    ) -> Self {
        Self {
            meta: MessageMeta::new(PRESENTATION_TYPE).with_thread(thread),
            comment,
            presentations,
        }
    }
}

impl TypedMessage for PresentationMessage {
    const TYPE: &'static str = PRESENTATION_TYPE;

    fn meta(&self) -> &MessageMeta {
        &self.meta
    }
}

/// Acknowledgement status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AckStatus {
    /// The presentation was received and accepted
    #[serde(rename = "OK")]
    Ok,
}

/// Verifier → prover: the presentation was accepted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresentationAckMessage {
    /// Wire headers
    #[serde(flatten)]
    pub meta: MessageMeta,
    /// Acknowledgement status
    pub status: AckStatus,
}

impl PresentationAckMessage {
    /// Acknowledge a presentation in an existing exchange thread
    pub fn new(thread: ThreadDecorator) -> Self {
        Self {
            meta: MessageMeta::new(PRESENTATION_ACK_TYPE).with_thread(thread),
            status: AckStatus::Ok,
        }
    }
}

impl TypedMessage for PresentationAckMessage {
    const TYPE: &'static str = PRESENTATION_ACK_TYPE;

    fn meta(&self) -> &MessageMeta {
        &self.meta
    }
}
