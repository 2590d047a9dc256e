//! Mediation module API

use std::sync::Arc;

use kestrel_agent::{ConnectionRecord, Dispatcher, MessageSender, OutboundMessage};
use kestrel_core::{AgentResult, TypedMessage};
use kestrel_storage::Repository;

use super::handlers::{KeylistUpdateHandler, KeylistUpdateResponseHandler};
use super::messages::{KeylistUpdate, KeylistUpdateAction};
use super::records::KeylistUpdateRecord;
use super::service::MediationService;

/// Mediation module facade
pub struct MediationModule {
    mediation_service: Arc<MediationService>,
    connection_repository: Arc<Repository<ConnectionRecord>>,
    message_sender: Arc<MessageSender>,
}

impl MediationModule {
    /// Wire the module and register its handlers with the dispatcher
    pub fn new(
        dispatcher: &Dispatcher,
        mediation_service: Arc<MediationService>,
        connection_repository: Arc<Repository<ConnectionRecord>>,
        message_sender: Arc<MessageSender>,
    ) -> AgentResult<Self> {
        dispatcher.register_handler(Arc::new(KeylistUpdateHandler::new(Arc::clone(
            &mediation_service,
        ))))?;
        dispatcher.register_handler(Arc::new(KeylistUpdateResponseHandler::new(Arc::clone(
            &mediation_service,
        ))))?;

        Ok(Self {
            mediation_service,
            connection_repository,
            message_sender,
        })
    }

    /// Ask the mediator on `connection_id` to apply the given changes
    ///
    /// Returns the pending records; each resolves when the mediator's
    /// response arrives.
    pub async fn update_keylist(
        &self,
        connection_id: &str,
        updates: Vec<KeylistUpdate>,
    ) -> AgentResult<Vec<KeylistUpdateRecord>> {
        let connection = self.connection_repository.get_by_id(connection_id).await?;

        let (message, records) = self
            .mediation_service
            .create_keylist_update(connection_id, updates)
            .await?;

        self.message_sender
            .send_message(OutboundMessage::new(connection, message.to_wire()?))
            .await?;
        Ok(records)
    }

    /// Ask the mediator to start routing one key
    pub async fn add_recipient_key(
        &self,
        connection_id: &str,
        recipient_key: &str,
    ) -> AgentResult<KeylistUpdateRecord> {
        let mut records = self
            .update_keylist(
                connection_id,
                vec![KeylistUpdate {
                    recipient_key: recipient_key.to_string(),
                    action: KeylistUpdateAction::Add,
                }],
            )
            .await?;
        Ok(records.remove(0))
    }

    /// The unique pending update for a recipient key
    pub async fn get_pending_update(
        &self,
        recipient_key: &str,
    ) -> AgentResult<KeylistUpdateRecord> {
        self.mediation_service
            .get_single_by_recipient_key(recipient_key)
            .await
    }
}
