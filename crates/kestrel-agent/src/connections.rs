//! Connection records
//!
//! A connection is the unit of addressability for all outbound sends. The
//! connection-establishment protocol itself lives outside this core; the
//! record exists here because transport resolution and inbound context
//! both read it.

use kestrel_core::DidDoc;
use kestrel_storage::{tags, Record, RecordTags};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Which side of the invitation this agent was on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionRole {
    /// This agent created the invitation
    Inviter,
    /// This agent received the invitation
    Invitee,
}

/// Connection-protocol state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// Invitation exchanged, no request yet
    Invited,
    /// Connection request sent or received
    Requested,
    /// Connection response sent or received
    Responded,
    /// Connection established
    Complete,
}

/// A connection invitation's routing fallback
///
/// Present only pre-connection; once the peer's DID document is known the
/// invitation no longer participates in routing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionInvitation {
    /// Human-readable label of the inviter
    pub label: String,
    /// Keys messages to the inviter must be encrypted to
    #[serde(default)]
    pub recipient_keys: Vec<String>,
    /// Endpoint the inviter can be reached at
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_endpoint: Option<String>,
    /// Intermediate forwarding keys
    #[serde(default)]
    pub routing_keys: Vec<String>,
}

/// Persisted state of one connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionRecord {
    /// Record id
    pub id: String,
    /// This agent's role in establishing the connection
    pub role: ConnectionRole,
    /// Connection-protocol state
    pub state: ConnectionState,
    /// This agent's verification key for the connection
    pub verkey: String,
    /// The peer's verification key, once known
    pub their_key: Option<String>,
    /// The peer's DID document, once the peer's routing surface is known
    pub their_did_doc: Option<DidDoc>,
    /// The invitation this connection started from, pre-connection only
    pub invitation: Option<ConnectionInvitation>,
    /// Creation time
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl ConnectionRecord {
    /// Create a new connection record in the given role
    pub fn new(role: ConnectionRole, verkey: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            state: ConnectionState::Invited,
            verkey: verkey.into(),
            their_key: None,
            their_did_doc: None,
            invitation: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }
}

impl Record for ConnectionRecord {
    const RECORD_TYPE: &'static str = "ConnectionRecord";

    fn id(&self) -> &str {
        &self.id
    }

    fn tags(&self) -> RecordTags {
        tags([
            ("verkey", Some(self.verkey.clone())),
            ("their_key", self.their_key.clone()),
        ])
    }
}
