//! Mediation records

use kestrel_storage::{tags, Record, RecordTags};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::messages::{KeylistUpdateAction, KeylistUpdateResult};

/// State of one in-flight keylist update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeylistUpdateState {
    /// Sent to the mediator, no response yet
    Pending,
    /// The mediator's response resolved this update
    Resolved,
}

/// One requested keylist change awaiting (or carrying) its outcome
///
/// Created per outbound update, looked up again by recipient key when the
/// mediator's response arrives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeylistUpdateRecord {
    /// Record id
    pub id: String,
    /// Connection to the mediator
    pub connection_id: String,
    /// Thread id of the update message
    pub thread_id: String,
    /// The key the change is about
    pub recipient_key: String,
    /// The requested action
    pub action: KeylistUpdateAction,
    /// Pending or resolved
    pub state: KeylistUpdateState,
    /// The mediator's verdict, once resolved
    pub result: Option<KeylistUpdateResult>,
    /// Creation time
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl KeylistUpdateRecord {
    /// Create a pending record for one requested change
    pub fn new(
        connection_id: impl Into<String>,
        thread_id: impl Into<String>,
        recipient_key: impl Into<String>,
        action: KeylistUpdateAction,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            connection_id: connection_id.into(),
            thread_id: thread_id.into(),
            recipient_key: recipient_key.into(),
            action,
            state: KeylistUpdateState::Pending,
            result: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }
}

impl Record for KeylistUpdateRecord {
    const RECORD_TYPE: &'static str = "KeylistUpdateRecord";

    fn id(&self) -> &str {
        &self.id
    }

    fn tags(&self) -> RecordTags {
        let state = match self.state {
            KeylistUpdateState::Pending => "pending",
            KeylistUpdateState::Resolved => "resolved",
        };
        tags([
            ("connection_id", Some(self.connection_id.clone())),
            ("recipient_key", Some(self.recipient_key.clone())),
            ("state", Some(state.to_string())),
        ])
    }
}

/// The keys a mediator routes for one connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediationRecord {
    /// Record id
    pub id: String,
    /// The mediated connection
    pub connection_id: String,
    /// Keys currently routed for that connection
    pub recipient_keys: Vec<String>,
    /// Creation time
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl MediationRecord {
    /// Create an empty keylist for a connection
    pub fn new(connection_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            connection_id: connection_id.into(),
            recipient_keys: Vec::new(),
            created_at: OffsetDateTime::now_utc(),
        }
    }
}

impl Record for MediationRecord {
    const RECORD_TYPE: &'static str = "MediationRecord";

    fn id(&self) -> &str {
        &self.id
    }

    fn tags(&self) -> RecordTags {
        tags([("connection_id", Some(self.connection_id.clone()))])
    }
}
