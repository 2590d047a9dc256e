//! Unified error type for the messaging core
//!
//! One enum covers the whole taxonomy so callers can match on the class of
//! failure without chasing per-crate error types. Constructor helpers keep
//! call sites short.

use serde::{Deserialize, Serialize};

/// Result alias used across the workspace
pub type AgentResult<T> = Result<T, AgentError>;

/// Unified error type for all agent operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum AgentError {
    /// Invalid wiring or setup, e.g. duplicate handler registration
    #[error("Configuration error: {message}")]
    Configuration {
        /// What was misconfigured
        message: String,
    },

    /// An outbound send was attempted before a transporter was configured
    #[error("Agent has no outbound transporter")]
    NoOutboundTransporter,

    /// A connection has no resolvable DIDComm service to deliver to
    #[error("Connection {connection_id} has no service")]
    NoServiceForConnection {
        /// The connection that could not be routed
        connection_id: String,
    },

    /// Every candidate service was tried and every attempt failed
    #[error("Delivery to connection {connection_id} failed after {attempts} attempt(s)")]
    DeliveryExhausted {
        /// The connection that could not be reached
        connection_id: String,
        /// Number of services tried
        attempts: usize,
    },

    /// A single delivery attempt failed (one endpoint, one try)
    #[error("Transport error: {message}")]
    Transport {
        /// What went wrong on the wire
        message: String,
    },

    /// A repository lookup matched no record
    #[error("Record not found: {message}")]
    RecordNotFound {
        /// What was looked up
        message: String,
    },

    /// A lookup that must match at most one record matched several
    #[error("Duplicate records: {message}")]
    RecordDuplicate {
        /// The offending query
        message: String,
    },

    /// A protocol transition was attempted without its required antecedent
    #[error("Protocol state error: {message}")]
    ProtocolState {
        /// Which precondition was violated
        message: String,
    },

    /// An envelope could not be decrypted for any local key
    #[error("Decryption error: {message}")]
    Decryption {
        /// Why decryption failed
        message: String,
    },

    /// An envelope was structurally invalid before any key was tried
    #[error("Malformed envelope: {message}")]
    MalformedEnvelope {
        /// What was malformed
        message: String,
    },

    /// No handler is registered for the inbound message type
    #[error("Unsupported message type: {message_type}")]
    UnsupportedMessageType {
        /// The `@type` URI that had no handler
        message_type: String,
    },

    /// A message failed to (de)serialize to its wire form
    #[error("Serialization error: {message}")]
    Serialization {
        /// The underlying serde failure
        message: String,
    },
}

impl AgentError {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a transport error for a single failed delivery attempt
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create a record-not-found error
    pub fn record_not_found(message: impl Into<String>) -> Self {
        Self::RecordNotFound {
            message: message.into(),
        }
    }

    /// Create a duplicate-record error
    pub fn record_duplicate(message: impl Into<String>) -> Self {
        Self::RecordDuplicate {
            message: message.into(),
        }
    }

    /// Create a protocol-state error
    pub fn protocol_state(message: impl Into<String>) -> Self {
        Self::ProtocolState {
            message: message.into(),
        }
    }

    /// Create a decryption error
    pub fn decryption(message: impl Into<String>) -> Self {
        Self::Decryption {
            message: message.into(),
        }
    }

    /// Create a malformed-envelope error
    pub fn malformed_envelope(message: impl Into<String>) -> Self {
        Self::MalformedEnvelope {
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for AgentError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}
