//! Core types for the Kestrel messaging agent
//!
//! This crate carries the pieces every other crate depends on: the typed
//! DIDComm message model with its wire decorators, the DID document types
//! that describe a peer's routing surface, and the unified error type.

pub mod did;
pub mod error;
pub mod messages;

pub use did::{DidCommService, DidDoc, DidDocKey};
pub use error::{AgentError, AgentResult};
pub use messages::{
    MessageMeta, ReturnRoute, ThreadDecorator, TransportDecorator, TypedMessage, WireMessage,
};
