//! Keylist-update state machine, both sides
//!
//! Recipient side: every outbound update creates a pending
//! `KeylistUpdateRecord`; the mediator's response is correlated back to
//! that record by recipient key and resolves it. Mediator side: an
//! inbound update mutates the connection's `MediationRecord` keylist and
//! produces the response message.

use std::sync::Arc;

use kestrel_agent::InboundMessageContext;
use kestrel_core::{AgentError, AgentResult, ThreadDecorator, TypedMessage};
use kestrel_storage::{tags, Repository};
use tracing::debug;

use super::messages::{
    KeylistUpdate, KeylistUpdateAction, KeylistUpdateMessage, KeylistUpdateResponseMessage,
    KeylistUpdateResult, KeylistUpdated,
};
use super::records::{KeylistUpdateRecord, KeylistUpdateState, MediationRecord};

/// Drives keylist updates against their repositories
pub struct MediationService {
    keylist_repository: Arc<Repository<KeylistUpdateRecord>>,
    mediation_repository: Arc<Repository<MediationRecord>>,
}

impl MediationService {
    /// Create a service over the given repositories
    pub fn new(
        keylist_repository: Arc<Repository<KeylistUpdateRecord>>,
        mediation_repository: Arc<Repository<MediationRecord>>,
    ) -> Self {
        Self {
            keylist_repository,
            mediation_repository,
        }
    }

    /// Recipient: build an update message, recording one pending update
    /// per requested change
    pub async fn create_keylist_update(
        &self,
        connection_id: &str,
        updates: Vec<KeylistUpdate>,
    ) -> AgentResult<(KeylistUpdateMessage, Vec<KeylistUpdateRecord>)> {
        let message = KeylistUpdateMessage::new(updates);

        let mut records = Vec::with_capacity(message.updates.len());
        for update in &message.updates {
            let record = KeylistUpdateRecord::new(
                connection_id,
                message.meta().thread_id(),
                update.recipient_key.clone(),
                update.action,
            );
            self.keylist_repository.save(&record).await?;
            records.push(record);
        }
        Ok((message, records))
    }

    /// Get an update record by id, failing when absent
    pub async fn get_update_by_id(&self, record_id: &str) -> AgentResult<KeylistUpdateRecord> {
        self.keylist_repository.get_by_id(record_id).await
    }

    /// Recipient: the unique pending update for a recipient key
    pub async fn get_single_by_recipient_key(
        &self,
        recipient_key: &str,
    ) -> AgentResult<KeylistUpdateRecord> {
        self.keylist_repository
            .get_single_by_query(&tags([
                ("recipient_key", Some(recipient_key)),
                ("state", Some("pending")),
            ]))
            .await
    }

    /// Recipient: correlate a response to its pending updates and resolve
    /// them
    ///
    /// A response entry with no pending record surfaces as
    /// `RecordNotFound`: it means the mediator answered an update this
    /// agent never sent, which is not a state to ignore.
    pub async fn process_keylist_update_response(
        &self,
        context: &InboundMessageContext,
    ) -> AgentResult<Vec<KeylistUpdateRecord>> {
        let message = KeylistUpdateResponseMessage::from_wire(&context.message)?;

        let mut resolved = Vec::with_capacity(message.updated.len());
        for updated in &message.updated {
            let pending = self.get_single_by_recipient_key(&updated.recipient_key).await?;

            let _guard = self.keylist_repository.lock_record(&pending.id).await;
            let mut record = self.keylist_repository.get_by_id(&pending.id).await?;
            // A racing duplicate response may have resolved it between the
            // lookup and the lock.
            if record.state != KeylistUpdateState::Pending {
                return Err(AgentError::protocol_state(format!(
                    "keylist update {} was already resolved",
                    record.id
                )));
            }
            record.state = KeylistUpdateState::Resolved;
            record.result = Some(updated.result);
            self.keylist_repository.update(&record).await?;

            debug!(
                recipient_key = %record.recipient_key,
                result = ?updated.result,
                "resolved keylist update"
            );
            resolved.push(record);
        }
        Ok(resolved)
    }

    /// Mediator: apply an inbound update to the connection's keylist and
    /// build the response
    pub async fn process_keylist_update(
        &self,
        context: &InboundMessageContext,
    ) -> AgentResult<KeylistUpdateResponseMessage> {
        let connection = context.connection()?;
        let message = KeylistUpdateMessage::from_wire(&context.message)?;

        // One guard keyed by connection id covers both record creation and
        // keylist mutation, so racing updates for a new connection cannot
        // create twin keylists.
        let _guard = self.mediation_repository.lock_record(&connection.id).await;

        let mut record = match self.find_mediation_by_connection_id(&connection.id).await? {
            Some(record) => record,
            None => {
                let record = MediationRecord::new(connection.id.clone());
                self.mediation_repository.save(&record).await?;
                record
            }
        };
        let mut updated = Vec::with_capacity(message.updates.len());
        for update in &message.updates {
            let position = record
                .recipient_keys
                .iter()
                .position(|key| key == &update.recipient_key);
            let result = match (update.action, position) {
                (KeylistUpdateAction::Add, Some(_)) => KeylistUpdateResult::NoChange,
                (KeylistUpdateAction::Add, None) => {
                    record.recipient_keys.push(update.recipient_key.clone());
                    KeylistUpdateResult::Success
                }
                (KeylistUpdateAction::Remove, Some(index)) => {
                    record.recipient_keys.remove(index);
                    KeylistUpdateResult::Success
                }
                (KeylistUpdateAction::Remove, None) => KeylistUpdateResult::NoChange,
            };
            updated.push(KeylistUpdated {
                recipient_key: update.recipient_key.clone(),
                action: update.action,
                result,
            });
        }
        self.mediation_repository.update(&record).await?;

        Ok(KeylistUpdateResponseMessage::new(
            updated,
            ThreadDecorator::new(context.message.thread_id()),
        ))
    }

    /// Mediator: the keylist for a connection, when one exists
    ///
    /// Several keylists for one connection is corrupted state and surfaces
    /// as `RecordDuplicate`.
    pub async fn find_mediation_by_connection_id(
        &self,
        connection_id: &str,
    ) -> AgentResult<Option<MediationRecord>> {
        match self
            .mediation_repository
            .get_single_by_query(&tags([("connection_id", Some(connection_id))]))
            .await
        {
            Ok(record) => Ok(Some(record)),
            Err(AgentError::RecordNotFound { .. }) => Ok(None),
            Err(error) => Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use kestrel_core::WireMessage;
    use kestrel_storage::InMemoryStorage;
    use kestrel_testkit::mock_connection;

    fn service() -> MediationService {
        MediationService::new(
            Arc::new(Repository::new(Arc::new(InMemoryStorage::new()))),
            Arc::new(Repository::new(Arc::new(InMemoryStorage::new()))),
        )
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

    fn add(recipient_key: &str) -> KeylistUpdate {
        KeylistUpdate {
            recipient_key: recipient_key.to_string(),
            action: KeylistUpdateAction::Add,
        }
    }

    #[tokio::test]
    async fn response_resolves_the_pending_update() {
        let service = service();
        let (_, records) = service
            .create_keylist_update("conn-1", vec![add("routed-key")])
            .await
            .unwrap();
        assert_eq!(records[0].state, KeylistUpdateState::Pending);

        let response = KeylistUpdateResponseMessage::new(
            vec![KeylistUpdated {
                recipient_key: "routed-key".to_string(),
                action: KeylistUpdateAction::Add,
                result: KeylistUpdateResult::Success,
            }],
            ThreadDecorator::new(records[0].thread_id.clone()),
        );

        let resolved = service
            .process_keylist_update_response(&inbound(response.to_wire().unwrap(), "conn-1"))
            .await
            .unwrap();

        assert_eq!(resolved[0].state, KeylistUpdateState::Resolved);
        assert_eq!(resolved[0].result, Some(KeylistUpdateResult::Success));
        // No pending record remains for that key.
        assert_matches!(
            service.get_single_by_recipient_key("routed-key").await,
            Err(AgentError::RecordNotFound { .. })
        );
    }

    #[tokio::test]
    async fn unsolicited_response_is_not_swallowed() {
        let service = service();
        let response = KeylistUpdateResponseMessage::new(
            vec![KeylistUpdated {
                recipient_key: "never-requested".to_string(),
                action: KeylistUpdateAction::Add,
                result: KeylistUpdateResult::Success,
            }],
            ThreadDecorator::new("thread-1"),
        );

        assert_matches!(
            service
                .process_keylist_update_response(&inbound(response.to_wire().unwrap(), "conn-1"))
                .await,
            Err(AgentError::RecordNotFound { .. })
        );
    }

    #[tokio::test]
    async fn mediator_applies_updates_and_reports_no_change() {
        let service = service();
        let update = KeylistUpdateMessage::new(vec![add("key-1")]);
        let response = service
            .process_keylist_update(&inbound(update.to_wire().unwrap(), "conn-m"))
            .await
            .unwrap();
        assert_eq!(response.updated[0].result, KeylistUpdateResult::Success);

        // Adding the same key again changes nothing.
        let repeat = KeylistUpdateMessage::new(vec![add("key-1")]);
        let response = service
            .process_keylist_update(&inbound(repeat.to_wire().unwrap(), "conn-m"))
            .await
            .unwrap();
        assert_eq!(response.updated[0].result, KeylistUpdateResult::NoChange);

        let record = service
            .find_mediation_by_connection_id("conn-m")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.recipient_keys, vec!["key-1".to_string()]);
    }

    #[tokio::test]
    async fn concurrent_identical_responses_resolve_the_update_once() {
        let service = Arc::new(service());
        let (_, records) = service
            .create_keylist_update("conn-1", vec![add("routed-key")])
            .await
            .unwrap();

        let response = KeylistUpdateResponseMessage::new(
            vec![KeylistUpdated {
                recipient_key: "routed-key".to_string(),
                action: KeylistUpdateAction::Add,
                result: KeylistUpdateResult::Success,
            }],
            ThreadDecorator::new(records[0].thread_id.clone()),
        );
        let wire = response.to_wire().unwrap();

        let tasks: Vec<_> = (0..2)
            .map(|_| {
                let service = Arc::clone(&service);
                let wire = wire.clone();
                tokio::spawn(async move {
                    service
                        .process_keylist_update_response(&inbound(wire, "conn-1"))
                        .await
                })
            })
            .collect();

        let mut successes = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => successes += 1,
                Err(AgentError::ProtocolState { .. } | AgentError::RecordNotFound { .. }) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(successes, 1);
    }

    #[tokio::test]
    async fn concurrent_updates_for_a_new_connection_share_one_keylist() {
        let mediation_repository = Arc::new(Repository::new(Arc::new(InMemoryStorage::new())));
        let service = Arc::new(MediationService::new(
            Arc::new(Repository::new(Arc::new(InMemoryStorage::new()))),
            Arc::clone(&mediation_repository),
        ));

        let tasks: Vec<_> = ["key-a", "key-b"]
            .into_iter()
            .map(|key| {
                let service = Arc::clone(&service);
                let update = KeylistUpdateMessage::new(vec![add(key)]);
                tokio::spawn(async move {
                    service
                        .process_keylist_update(&inbound(update.to_wire().unwrap(), "conn-m"))
                        .await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let records = mediation_repository
            .find_by_query(&tags([("connection_id", Some("conn-m"))]))
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        let mut keys = records[0].recipient_keys.clone();
        keys.sort();
        assert_eq!(keys, vec!["key-a".to_string(), "key-b".to_string()]);
    }

    #[tokio::test]
    async fn duplicate_keylists_for_one_connection_surface_as_corruption() {
        let mediation_repository = Arc::new(Repository::new(Arc::new(InMemoryStorage::new())));
        let service = MediationService::new(
            Arc::new(Repository::new(Arc::new(InMemoryStorage::new()))),
            Arc::clone(&mediation_repository),
        );

        mediation_repository.save(&MediationRecord::new("conn-m")).await.unwrap();
        mediation_repository.save(&MediationRecord::new("conn-m")).await.unwrap();

        assert_matches!(
            service.find_mediation_by_connection_id("conn-m").await,
            Err(AgentError::RecordDuplicate { .. })
        );
    }

    #[tokio::test]
    async fn mediator_response_is_threaded_to_the_update() {
        let service = service();
        let update = KeylistUpdateMessage::new(vec![add("key-1")]);
        let update_id = update.meta.id.clone();

        let response = service
            .process_keylist_update(&inbound(update.to_wire().unwrap(), "conn-m"))
            .await
            .unwrap();
        assert_eq!(response.meta.thread_id(), update_id);
    }
}
