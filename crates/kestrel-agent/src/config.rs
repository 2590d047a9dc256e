//! Agent configuration
//!
//! Explicit fields with documented defaults, resolved once at construction.

use std::time::Duration;

/// Configuration for one agent instance
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Human-readable label presented in invitations
    pub label: String,
    /// Public endpoint this agent advertises, when it has one
    pub endpoint: Option<String>,
    /// Upper bound for a single outbound transporter invocation; a service
    /// that does not answer within this window counts as a failed attempt
    /// and fallback moves on. Default 15 seconds.
    pub outbound_send_timeout: Duration,
}

impl AgentConfig {
    /// Create a configuration with defaults for everything but the label
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            endpoint: None,
            outbound_send_timeout: Duration::from_secs(15),
        }
    }

    /// Set the advertised endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Override the outbound send timeout
    pub fn with_outbound_send_timeout(mut self, timeout: Duration) -> Self {
        self.outbound_send_timeout = timeout;
        self
    }
}
