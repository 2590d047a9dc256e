//! Wire decorators shared by all message types
//!
//! Decorators are the `~`-prefixed attachments of the wire format. Field
//! names here are the external wire names; internal code never parses them
//! by hand.

use serde::{Deserialize, Serialize};

/// Threading decorator (`~thread`) linking a message to its exchange
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadDecorator {
    /// Thread id: the id of the first message of the exchange
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thid: Option<String>,
    /// Parent thread id, set when responding to a triggering message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pthid: Option<String>,
}

impl ThreadDecorator {
    /// Create a thread decorator with the given thread id
    pub fn new(thid: impl Into<String>) -> Self {
        Self {
            thid: Some(thid.into()),
            pthid: None,
        }
    }

    /// Set the parent thread id
    pub fn with_parent(mut self, pthid: impl Into<String>) -> Self {
        self.pthid = Some(pthid.into());
        self
    }
}

/// Return-route preference carried in the `~transport` decorator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReturnRoute {
    /// Do not reuse the inbound channel
    None,
    /// Send all outbound traffic for this sender over the inbound channel
    All,
    /// Reuse the inbound channel for this thread only
    Thread,
}

/// Transport decorator (`~transport`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportDecorator {
    /// The sender's return-route preference
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_route: Option<ReturnRoute>,
}

impl TransportDecorator {
    /// Whether this decorator asks the receiver to respond on the same channel
    pub fn requests_return_routing(&self) -> bool {
        matches!(self.return_route, Some(ReturnRoute::All | ReturnRoute::Thread))
    }
}

/// Localization decorator (`~l10n`) carrying the message locale
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalizationDecorator {
    /// Locale of human-readable fields, e.g. `en`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}
