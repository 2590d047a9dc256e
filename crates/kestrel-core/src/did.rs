//! DID document types
//!
//! The peer's published routing surface: its keys and the ordered service
//! endpoints messages can be addressed to. Document order of services is
//! meaningful and preserved.

use serde::{Deserialize, Serialize};

/// A DIDComm service endpoint declared in a peer's DID document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidCommService {
    /// Service id, unique within the document
    pub id: String,
    /// The address messages for this service are delivered to
    pub service_endpoint: String,
    /// Keys the envelope must be encrypted to; non-empty for a usable service
    pub recipient_keys: Vec<String>,
    /// Intermediate forwarding keys, outermost first; empty for a direct route
    #[serde(default)]
    pub routing_keys: Vec<String>,
}

impl DidCommService {
    /// Create a service with a direct route (no routing keys)
    pub fn new(
        id: impl Into<String>,
        service_endpoint: impl Into<String>,
        recipient_keys: Vec<String>,
    ) -> Self {
        Self {
            id: id.into(),
            service_endpoint: service_endpoint.into(),
            recipient_keys,
            routing_keys: Vec::new(),
        }
    }
}

/// A public key entry in a DID document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidDocKey {
    /// Key id, unique within the document
    pub id: String,
    /// The DID controlling this key
    pub controller: String,
    /// Base58-encoded public key material
    pub public_key_base58: String,
}

/// A peer's DID document: identity keys plus declared service endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DidDoc {
    /// The DID this document describes
    pub id: String,
    /// Public keys declared by the peer
    #[serde(rename = "publicKey", default)]
    pub public_keys: Vec<DidDocKey>,
    /// Key ids usable for authentication
    #[serde(default)]
    pub authentication: Vec<String>,
    /// Declared services, in document order
    #[serde(rename = "service", default)]
    pub services: Vec<DidCommService>,
}

impl DidDoc {
    /// Create a document with services only
    pub fn new(id: impl Into<String>, services: Vec<DidCommService>) -> Self {
        Self {
            id: id.into(),
            public_keys: Vec::new(),
            authentication: Vec::new(),
            services,
        }
    }

    /// The declared DIDComm services, in document order
    pub fn didcomm_services(&self) -> &[DidCommService] {
        &self.services
    }
}
