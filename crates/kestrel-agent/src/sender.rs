//! Outbound delivery pipeline
//!
//! `send_message` resolves the candidate services for the target
//! connection and tries them strictly in order, one attempt per service,
//! stopping at the first success. A peer publishing several endpoints gets
//! best-effort multi-homing without retry storms.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kestrel_core::{AgentError, AgentResult, WireMessage};
use parking_lot::RwLock;
use tracing::debug;

use crate::connections::ConnectionRecord;
use crate::envelope::{EnvelopeKeys, EnvelopeService};
use crate::transport::{TransportService, TransportSession};

/// A protocol message addressed to a connection, pre-encryption
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    /// The connection to deliver to
    pub connection: ConnectionRecord,
    /// The plaintext message
    pub payload: WireMessage,
}

impl OutboundMessage {
    /// Address a message to a connection
    pub fn new(connection: ConnectionRecord, payload: WireMessage) -> Self {
        Self {
            connection,
            payload,
        }
    }
}

/// An encrypted message ready to transmit
#[derive(Debug, Clone)]
pub struct OutboundPackage {
    /// The connection being delivered to
    pub connection: ConnectionRecord,
    /// Opaque wire bytes
    pub payload: Vec<u8>,
    /// Whether the sender asked for the response on the same channel
    pub response_requested: bool,
    /// The endpoint chosen for this attempt
    pub endpoint: Option<String>,
    /// A live session to the connection, when one exists
    pub session: Option<TransportSession>,
}

/// Either form an outbound send can start from
///
/// A value is exclusively one or the other; the sender converts
/// message→package exactly once per delivery attempt and reuses a
/// pre-packed package unchanged across attempts.
#[derive(Debug, Clone)]
pub enum Outbound {
    /// Not yet encrypted; packed per service with that service's keys
    Message(OutboundMessage),
    /// Already encrypted; reused as-is for every attempt
    Package(OutboundPackage),
}

impl From<OutboundMessage> for Outbound {
    fn from(message: OutboundMessage) -> Self {
        Self::Message(message)
    }
}

impl From<OutboundPackage> for Outbound {
    fn from(package: OutboundPackage) -> Self {
        Self::Package(package)
    }
}

impl Outbound {
    fn connection(&self) -> &ConnectionRecord {
        match self {
            Self::Message(message) => &message.connection,
            Self::Package(package) => &package.connection,
        }
    }
}

/// Concrete delivery mechanism, implemented by the external transport layer
///
/// A failed send must surface as an error so the sender can fall back to
/// the next candidate service.
#[async_trait]
pub trait OutboundTransporter: Send + Sync {
    /// Transmit one package to its endpoint
    async fn send_message(&self, package: OutboundPackage) -> AgentResult<()>;
}

/// Outbound delivery pipeline
pub struct MessageSender {
    envelope_service: Arc<dyn EnvelopeService>,
    transport_service: Arc<TransportService>,
    outbound_transporter: RwLock<Option<Arc<dyn OutboundTransporter>>>,
    send_timeout: Duration,
}

impl MessageSender {
    /// Create a sender; no transporter is configured yet
    pub fn new(
        envelope_service: Arc<dyn EnvelopeService>,
        transport_service: Arc<TransportService>,
        send_timeout: Duration,
    ) -> Self {
        Self {
            envelope_service,
            transport_service,
            outbound_transporter: RwLock::new(None),
            send_timeout,
        }
    }

    /// Configure the transporter used for every subsequent send
    pub fn set_outbound_transporter(&self, transporter: Arc<dyn OutboundTransporter>) {
        *self.outbound_transporter.write() = Some(transporter);
    }

    /// Pack a message for the given keys
    ///
    /// Exposed standalone so protocol modules can pre-pack when they need
    /// to, e.g. for queueing at a mediator.
    pub async fn pack_message(
        &self,
        outbound: &OutboundMessage,
        keys: &EnvelopeKeys,
    ) -> AgentResult<OutboundPackage> {
        let payload = self.envelope_service.pack(&outbound.payload, keys).await?;
        Ok(OutboundPackage {
            connection: outbound.connection.clone(),
            payload,
            response_requested: outbound.payload.has_return_routing(),
            endpoint: None,
            session: None,
        })
    }

    /// Deliver an outbound message or pre-packed package
    ///
    /// Fails fast with `NoOutboundTransporter` or `NoServiceForConnection`;
    /// otherwise tries each candidate service at most once and returns
    /// `DeliveryExhausted` when none succeeded.
    pub async fn send_message(&self, outbound: impl Into<Outbound>) -> AgentResult<()> {
        let outbound = outbound.into();
        let transporter = self
            .outbound_transporter
            .read()
            .clone()
            .ok_or(AgentError::NoOutboundTransporter)?;

        let connection = outbound.connection();
        debug!(
            connection_id = %connection.id,
            verkey = %connection.verkey,
            "sending outbound message"
        );

        let services = self.transport_service.find_didcomm_services(connection);
        if services.is_empty() {
            return Err(AgentError::NoServiceForConnection {
                connection_id: connection.id.clone(),
            });
        }

        let attempts = services.len();
        for service in services {
            debug!(
                connection_id = %connection.id,
                service_id = %service.id,
                endpoint = %service.service_endpoint,
                "trying outbound service"
            );

            let mut package = match &outbound {
                Outbound::Message(message) => {
                    let keys = EnvelopeKeys {
                        recipient_keys: service.recipient_keys.clone(),
                        routing_keys: service.routing_keys.clone(),
                        sender_key: Some(connection.verkey.clone()),
                    };
                    self.pack_message(message, &keys).await?
                }
                Outbound::Package(package) => package.clone(),
            };

            package.session = self.transport_service.find_session(&connection.id);
            package.endpoint = Some(service.service_endpoint.clone());

            match tokio::time::timeout(self.send_timeout, transporter.send_message(package)).await
            {
                Ok(Ok(())) => return Ok(()),
                Ok(Err(error)) => {
                    debug!(
                        service_id = %service.id,
                        %error,
                        "outbound delivery attempt failed"
                    );
                }
                Err(_) => {
                    debug!(
                        service_id = %service.id,
                        timeout = ?self.send_timeout,
                        "outbound delivery attempt timed out"
                    );
                }
            }
        }

        Err(AgentError::DeliveryExhausted {
            connection_id: connection.id.clone(),
            attempts,
        })
    }
}
