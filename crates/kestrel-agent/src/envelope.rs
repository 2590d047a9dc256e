//! Envelope boundary to the wallet/crypto provider
//!
//! The core never touches the envelope cipher itself; it packs and unpacks
//! through this trait. Implementations must be deterministic on success and
//! must distinguish "wrong recipient" (`Decryption`) from "corrupt data"
//! (`MalformedEnvelope`).

use async_trait::async_trait;
use kestrel_core::{AgentResult, WireMessage};

/// Key material for packing one envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeKeys {
    /// Keys of the final recipients
    pub recipient_keys: Vec<String>,
    /// Intermediate forwarding keys, outermost first
    pub routing_keys: Vec<String>,
    /// The sender's verification key; `None` packs anonymously
    pub sender_key: Option<String>,
}

/// Result of unpacking one envelope
#[derive(Debug, Clone)]
pub struct DecryptedMessageContext {
    /// The plaintext message
    pub message: WireMessage,
    /// The sender's key, when the envelope was not anonymous
    pub sender_key: Option<String>,
    /// The local key the envelope was addressed to
    pub recipient_key: Option<String>,
}

/// Pack/unpack capability provided by the external wallet
#[async_trait]
pub trait EnvelopeService: Send + Sync {
    /// Encrypt a message to the given keys, producing opaque wire bytes
    async fn pack(&self, message: &WireMessage, keys: &EnvelopeKeys) -> AgentResult<Vec<u8>>;

    /// Decrypt wire bytes addressed to one of the wallet's keys
    async fn unpack(&self, wire_bytes: &[u8]) -> AgentResult<DecryptedMessageContext>;
}
