//! Explicit agent wiring
//!
//! One context owns one instance of each core service and hands out shared
//! handles. Construction is plain code: callers inject the envelope
//! provider and storage backends, everything else is built here. There is
//! no ambient registry.

use std::sync::Arc;

use kestrel_storage::{Repository, StorageService};

use crate::config::AgentConfig;
use crate::connections::ConnectionRecord;
use crate::dispatcher::Dispatcher;
use crate::envelope::EnvelopeService;
use crate::receiver::MessageReceiver;
use crate::sender::MessageSender;
use crate::transport::TransportService;

/// The assembled messaging core of one agent
pub struct AgentContext {
    /// Resolved configuration
    pub config: AgentConfig,
    /// Envelope pack/unpack boundary
    pub envelope_service: Arc<dyn EnvelopeService>,
    /// Service and session discovery
    pub transport_service: Arc<TransportService>,
    /// Outbound delivery pipeline
    pub message_sender: Arc<MessageSender>,
    /// Inbound routing registry
    pub dispatcher: Arc<Dispatcher>,
    /// Connection records
    pub connection_repository: Arc<Repository<ConnectionRecord>>,
    /// Inbound receive entry point
    pub message_receiver: Arc<MessageReceiver>,
}

impl AgentContext {
    /// Build a context from its injected boundaries
    pub fn new(
        config: AgentConfig,
        envelope_service: Arc<dyn EnvelopeService>,
        connection_storage: Arc<dyn StorageService<ConnectionRecord>>,
    ) -> Self {
        let transport_service = Arc::new(TransportService::new());
        let dispatcher = Arc::new(Dispatcher::new());
        let connection_repository = Arc::new(Repository::new(connection_storage));
        let message_sender = Arc::new(MessageSender::new(
            Arc::clone(&envelope_service),
            Arc::clone(&transport_service),
            config.outbound_send_timeout,
        ));
        let message_receiver = Arc::new(MessageReceiver::new(
            Arc::clone(&envelope_service),
            Arc::clone(&dispatcher),
            Arc::clone(&transport_service),
            Arc::clone(&connection_repository),
            Arc::clone(&message_sender),
        ));

        Self {
            config,
            envelope_service,
            transport_service,
            message_sender,
            dispatcher,
            connection_repository,
            message_receiver,
        }
    }
}
