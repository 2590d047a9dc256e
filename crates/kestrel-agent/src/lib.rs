//! Messaging core of the Kestrel agent
//!
//! Inbound: wire bytes → envelope unpack → dispatcher → one handler → an
//! optional response message. Outbound: a message addressed to a
//! connection → service resolution → per-service pack and delivery with
//! ordered fallback. Concrete transports and the envelope cipher live
//! outside this crate, behind the traits defined here.

pub mod config;
pub mod connections;
pub mod context;
pub mod dispatcher;
pub mod envelope;
pub mod receiver;
pub mod sender;
pub mod transport;

pub use config::AgentConfig;
pub use connections::{ConnectionInvitation, ConnectionRecord, ConnectionRole, ConnectionState};
pub use context::AgentContext;
pub use dispatcher::{Dispatcher, Handler, InboundMessageContext};
pub use envelope::{DecryptedMessageContext, EnvelopeKeys, EnvelopeService};
pub use receiver::MessageReceiver;
pub use sender::{
    MessageSender, Outbound, OutboundMessage, OutboundPackage, OutboundTransporter,
};
pub use transport::{TransportService, TransportSession};
