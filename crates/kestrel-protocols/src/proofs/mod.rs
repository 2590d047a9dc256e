//! Present-proof exchange
//!
//! # Protocol flow
//!
//! ```text
//! Prover                         Verifier
//!   │  propose-presentation  ──►   │   (or the verifier starts
//!   │  ◄── request-presentation    │    directly with a request)
//!   │  presentation ──►            │
//!   │  ◄── ack                     │
//! ```
//!
//! Each arrow is one transition on the shared `ProofRecord`, threaded by
//! the id of the first message of the exchange.

pub mod handlers;
pub mod messages;
pub mod module;
pub mod record;
pub mod service;

pub use messages::{
    PresentationAckMessage, PresentationMessage, PresentationPreview,
    PresentationPreviewAttribute, PresentationPreviewPredicate, ProofAttributeInfo,
    ProofPredicateInfo, ProofRequest, ProposePresentationMessage, RequestPresentationMessage,
};
pub use module::{AcceptProposalConfig, ProofsModule, RequestProofOptions};
pub use record::{ProofRecord, ProofState};
pub use service::{ProofService, RequestedCredentials};
