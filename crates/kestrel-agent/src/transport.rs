//! Service and session discovery
//!
//! For a given connection this module answers two questions: which
//! endpoints can the peer be reached at (in priority order), and is there
//! a live bidirectional channel that can be reused. Sessions are created
//! and destroyed by the external transport layer; this service only looks
//! them up.

use std::collections::HashMap;

use kestrel_core::{AgentError, AgentResult, DidCommService};
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::debug;

use crate::connections::{ConnectionRecord, ConnectionRole};

/// A live bidirectional channel to a peer, keyed by connection id
///
/// The handle is cheap to clone; the inbound transporter keeps the receive
/// half and writes responses it is handed back onto the same channel.
#[derive(Debug, Clone)]
pub struct TransportSession {
    /// Session id, assigned by the transport layer
    pub id: String,
    sender: mpsc::UnboundedSender<Vec<u8>>,
}

impl TransportSession {
    /// Create a session handle plus the receive half of its write channel
    pub fn new(id: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<Vec<u8>>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                id: id.into(),
                sender,
            },
            receiver,
        )
    }

    /// Queue wire bytes for delivery on this channel
    pub fn send(&self, wire_bytes: Vec<u8>) -> AgentResult<()> {
        self.sender
            .send(wire_bytes)
            .map_err(|_| AgentError::transport(format!("session {} is closed", self.id)))
    }
}

/// Resolves candidate services and live sessions for connections
#[derive(Debug, Default)]
pub struct TransportService {
    sessions: RwLock<HashMap<String, TransportSession>>,
}

impl TransportService {
    /// Create a service with no registered sessions
    pub fn new() -> Self {
        Self::default()
    }

    /// The ordered candidate services for a connection
    ///
    /// A fully negotiated DID document always supersedes the original
    /// invitation once available:
    /// 1. the peer's DID document services, in document order;
    /// 2. otherwise, for an invitee, a single service synthesized from the
    ///    invitation's endpoint and keys;
    /// 3. otherwise no known route.
    pub fn find_didcomm_services(&self, connection: &ConnectionRecord) -> Vec<DidCommService> {
        if let Some(did_doc) = &connection.their_did_doc {
            return did_doc.didcomm_services().to_vec();
        }

        if connection.role == ConnectionRole::Invitee {
            if let Some(invitation) = &connection.invitation {
                if let Some(service_endpoint) = &invitation.service_endpoint {
                    return vec![DidCommService {
                        id: format!("{}-invitation", connection.id),
                        service_endpoint: service_endpoint.clone(),
                        recipient_keys: invitation.recipient_keys.clone(),
                        routing_keys: Vec::new(),
                    }];
                }
            }
        }

        Vec::new()
    }

    /// Look up the live session for a connection, if any
    pub fn find_session(&self, connection_id: &str) -> Option<TransportSession> {
        self.sessions.read().get(connection_id).cloned()
    }

    /// Register a live session for a connection
    ///
    /// Called by the transport layer on connect; replaces any previous
    /// session for that connection.
    pub fn save_session(&self, connection_id: impl Into<String>, session: TransportSession) {
        let connection_id = connection_id.into();
        debug!(connection_id = %connection_id, session_id = %session.id, "saving transport session");
        self.sessions.write().insert(connection_id, session);
    }

    /// Drop the session for a connection
    ///
    /// Called by the transport layer on close.
    pub fn remove_session(&self, connection_id: &str) {
        self.sessions.write().remove(connection_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connections::ConnectionInvitation;
    use kestrel_core::DidDoc;

    fn mock_connection(id: &str, role: ConnectionRole) -> ConnectionRecord {
        ConnectionRecord {
            id: id.to_string(),
            ..ConnectionRecord::new(role, "my-verkey")
        }
    }

    fn example_service() -> DidCommService {
        DidCommService::new(
            "<did>;indy",
            "https://example.com",
            vec!["verkey".to_string()],
        )
    }

    #[test]
    fn no_did_doc_as_inviter_resolves_nothing() {
        let service = TransportService::new();
        let connection = mock_connection("test-123", ConnectionRole::Inviter);
        assert!(service.find_didcomm_services(&connection).is_empty());
    }

    #[test]
    fn no_did_doc_and_no_invitation_as_invitee_resolves_nothing() {
        let service = TransportService::new();
        let connection = mock_connection("test-123", ConnectionRole::Invitee);
        assert!(service.find_didcomm_services(&connection).is_empty());
    }

    #[test]
    fn did_doc_services_win_and_keep_document_order() {
        let service = TransportService::new();
        let second = DidCommService::new(
            "<did>;indy-2",
            "https://fallback.example.com",
            vec!["verkey-2".to_string()],
        );
        let mut connection = mock_connection("test-123", ConnectionRole::Invitee);
        connection.their_did_doc = Some(DidDoc::new(
            "test-456",
            vec![example_service(), second.clone()],
        ));
        // An invitation that must be ignored once the DID document is known.
        connection.invitation = Some(ConnectionInvitation {
            label: "test".to_string(),
            recipient_keys: vec!["stale".to_string()],
            service_endpoint: Some("ws://stale.example.com".to_string()),
            routing_keys: Vec::new(),
        });

        assert_eq!(
            service.find_didcomm_services(&connection),
            vec![example_service(), second]
        );
    }

    #[test]
    fn invitation_synthesizes_a_single_service_for_invitee() {
        let service = TransportService::new();
        let mut connection = mock_connection("test-123", ConnectionRole::Invitee);
        connection.invitation = Some(ConnectionInvitation {
            label: "test".to_string(),
            recipient_keys: vec!["verkey".to_string()],
            service_endpoint: Some("ws://invitationEndpoint.com".to_string()),
            routing_keys: Vec::new(),
        });

        assert_eq!(
            service.find_didcomm_services(&connection),
            vec![DidCommService {
                id: "test-123-invitation".to_string(),
                service_endpoint: "ws://invitationEndpoint.com".to_string(),
                recipient_keys: vec!["verkey".to_string()],
                routing_keys: Vec::new(),
            }]
        );
    }

    #[test]
    fn sessions_are_looked_up_never_created() {
        let service = TransportService::new();
        assert!(service.find_session("conn-1").is_none());

        let (session, mut receiver) = TransportSession::new("session-1");
        service.save_session("conn-1", session.clone());

        let found = service.find_session("conn-1").unwrap();
        found.send(b"response".to_vec()).unwrap();
        assert_eq!(receiver.try_recv().unwrap(), b"response".to_vec());

        service.remove_session("conn-1");
        assert!(service.find_session("conn-1").is_none());
    }
}
