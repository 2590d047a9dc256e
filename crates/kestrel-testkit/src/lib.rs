//! Test doubles and fixtures for the Kestrel messaging core
//!
//! Everything here is for tests only: a stub envelope (JSON body in a
//! base64 frame, no real cipher), a recording transporter with scriptable
//! failures, mock connections, and a tracing-based test logger.

use std::collections::HashMap;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use kestrel_agent::{
    ConnectionInvitation, ConnectionRecord, ConnectionRole, ConnectionState,
    DecryptedMessageContext, EnvelopeKeys, EnvelopeService, OutboundPackage, OutboundTransporter,
};
use kestrel_core::{AgentError, AgentResult, DidCommService, DidDoc, WireMessage};
use parking_lot::Mutex;

/// Install a fmt subscriber honoring `RUST_LOG`; safe to call repeatedly
pub fn test_logger() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A connection with a populated peer DID document, ready for sending
///
/// Fields are public; tests overwrite what they need.
pub fn mock_connection(id: &str) -> ConnectionRecord {
    let mut connection = ConnectionRecord::new(ConnectionRole::Inviter, format!("{id}-verkey"));
    connection.id = id.to_string();
    connection.state = ConnectionState::Complete;
    connection.their_key = Some(format!("{id}-their-verkey"));
    connection.their_did_doc = Some(DidDoc::new(
        format!("did:example:{id}"),
        vec![DidCommService::new(
            format!("did:example:{id};indy"),
            "https://endpoint.example.com",
            vec![format!("{id}-their-verkey")],
        )],
    ));
    connection
}

/// An invitation fallback for invitee-side connections
pub fn mock_invitation(endpoint: &str, recipient_key: &str) -> ConnectionInvitation {
    ConnectionInvitation {
        label: "test".to_string(),
        recipient_keys: vec![recipient_key.to_string()],
        service_endpoint: Some(endpoint.to_string()),
        routing_keys: Vec::new(),
    }
}

/// Stub envelope: base64 frame carrying the plaintext JSON and the keys
///
/// Unpack enforces addressing when the stub was given local keys, so tests
/// can exercise the `Decryption` vs `MalformedEnvelope` distinction without
/// a real cipher.
#[derive(Debug, Default)]
pub struct StubEnvelopeService {
    local_keys: Vec<String>,
}

impl StubEnvelopeService {
    /// A stub that accepts envelopes for any recipient
    pub fn new() -> Self {
        Self::default()
    }

    /// A stub that only unpacks envelopes addressed to one of `local_keys`
    pub fn with_local_keys(local_keys: Vec<String>) -> Self {
        Self { local_keys }
    }
}

#[async_trait]
impl EnvelopeService for StubEnvelopeService {
    async fn pack(&self, message: &WireMessage, keys: &EnvelopeKeys) -> AgentResult<Vec<u8>> {
        let frame = serde_json::json!({
            "protected": BASE64.encode(message.to_bytes()?),
            "recipient_key": keys.recipient_keys.first(),
            "sender_key": keys.sender_key,
        });
        Ok(serde_json::to_vec(&frame)?)
    }

    async fn unpack(&self, wire_bytes: &[u8]) -> AgentResult<DecryptedMessageContext> {
        let frame: serde_json::Value = serde_json::from_slice(wire_bytes)
            .map_err(|error| AgentError::malformed_envelope(error.to_string()))?;
        let protected = frame["protected"]
            .as_str()
            .ok_or_else(|| AgentError::malformed_envelope("frame has no protected part"))?;
        let plaintext = BASE64
            .decode(protected)
            .map_err(|error| AgentError::malformed_envelope(error.to_string()))?;

        let recipient_key = frame["recipient_key"].as_str().map(str::to_string);
        if !self.local_keys.is_empty() {
            let addressed_to_us = recipient_key
                .as_deref()
                .is_some_and(|key| self.local_keys.iter().any(|local| local == key));
            if !addressed_to_us {
                return Err(AgentError::decryption("envelope is for another recipient"));
            }
        }

        let message = WireMessage::from_bytes(&plaintext)
            .map_err(|error| AgentError::malformed_envelope(error.to_string()))?;
        Ok(DecryptedMessageContext {
            message,
            sender_key: frame["sender_key"].as_str().map(str::to_string),
            recipient_key,
        })
    }
}

/// Outbound transporter that records every package it is handed
///
/// Individual calls can be scripted to fail, keyed by call index.
#[derive(Debug, Default)]
pub struct RecordingTransporter {
    packages: Mutex<Vec<OutboundPackage>>,
    failures: Mutex<HashMap<usize, String>>,
}

impl RecordingTransporter {
    /// A transporter where every call succeeds
    pub fn new() -> Self {
        Self::default()
    }

    /// Script call number `index` (zero-based) to fail
    pub fn fail_call(&self, index: usize, reason: &str) {
        self.failures.lock().insert(index, reason.to_string());
    }

    /// Every package handed to the transporter so far, in order
    pub fn packages(&self) -> Vec<OutboundPackage> {
        self.packages.lock().clone()
    }

    /// The payload of the most recent package
    pub fn last_payload(&self) -> Option<Vec<u8>> {
        self.packages.lock().last().map(|package| package.payload.clone())
    }
}

#[async_trait]
impl OutboundTransporter for RecordingTransporter {
    async fn send_message(&self, package: OutboundPackage) -> AgentResult<()> {
        let mut packages = self.packages.lock();
        let index = packages.len();
        packages.push(package);
        if let Some(reason) = self.failures.lock().get(&index) {
            return Err(AgentError::transport(reason.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn keys_for(recipient: &str) -> EnvelopeKeys {
        EnvelopeKeys {
            recipient_keys: vec![recipient.to_string()],
            routing_keys: Vec::new(),
            sender_key: Some("sender-verkey".to_string()),
        }
    }

    fn sample_message() -> WireMessage {
        WireMessage::from_value(serde_json::json!({
            "@id": "msg-1",
            "@type": "https://didcomm.org/test/1.0/sample",
            "~thread": { "thid": "thread-1" },
            "content": "hello",
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn unpack_recovers_exactly_what_was_packed() {
        let envelope = StubEnvelopeService::new();
        let message = sample_message();

        let wire_bytes = envelope.pack(&message, &keys_for("recipient-verkey")).await.unwrap();
        let decrypted = envelope.unpack(&wire_bytes).await.unwrap();

        assert_eq!(decrypted.message, message);
        assert_eq!(decrypted.sender_key.as_deref(), Some("sender-verkey"));
        assert_eq!(decrypted.recipient_key.as_deref(), Some("recipient-verkey"));
    }

    #[tokio::test]
    async fn wrong_recipient_is_a_decryption_error() {
        let envelope = StubEnvelopeService::with_local_keys(vec!["our-verkey".to_string()]);
        let wire_bytes = envelope
            .pack(&sample_message(), &keys_for("someone-else"))
            .await
            .unwrap();

        assert_matches!(
            envelope.unpack(&wire_bytes).await,
            Err(AgentError::Decryption { .. })
        );
    }

    #[tokio::test]
    async fn corrupt_data_is_a_malformed_envelope_error() {
        let envelope = StubEnvelopeService::new();
        assert_matches!(
            envelope.unpack(b"definitely not an envelope").await,
            Err(AgentError::MalformedEnvelope { .. })
        );
    }
}
