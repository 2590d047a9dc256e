//! Coordinate-mediation 1.0 keylist-update messages

use kestrel_core::{MessageMeta, ThreadDecorator, TypedMessage};
use serde::{Deserialize, Serialize};

/// `@type` of the keylist-update message
pub const KEYLIST_UPDATE_TYPE: &str =
    "https://didcomm.org/coordinate-mediation/1.0/keylist-update";
/// `@type` of the keylist-update-response message
pub const KEYLIST_UPDATE_RESPONSE_TYPE: &str =
    "https://didcomm.org/coordinate-mediation/1.0/keylist-update-response";

/// What the recipient asks the mediator to do with a key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeylistUpdateAction {
    /// Start routing messages for this key
    Add,
    /// Stop routing messages for this key
    Remove,
}

/// One requested keylist change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeylistUpdate {
    /// The key to add or remove
    pub recipient_key: String,
    /// The requested action
    pub action: KeylistUpdateAction,
}

/// Recipient → mediator: requested keylist changes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeylistUpdateMessage {
    /// Wire headers
    #[serde(flatten)]
    pub meta: MessageMeta,
    /// The requested changes, applied in order
    pub updates: Vec<KeylistUpdate>,
}

impl KeylistUpdateMessage {
    /// Create an update request; its own id becomes the thread id
    pub fn new(updates: Vec<KeylistUpdate>) -> Self {
        Self {
            meta: MessageMeta::new(KEYLIST_UPDATE_TYPE),
            updates,
        }
    }
}

impl TypedMessage for KeylistUpdateMessage {
    const TYPE: &'static str = KEYLIST_UPDATE_TYPE;

    fn meta(&self) -> &MessageMeta {
        &self.meta
    }
}

/// Outcome of one requested change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeylistUpdateResult {
    /// The request was malformed
    ClientError,
    /// The mediator failed internally
    ServerError,
    /// The keylist already satisfied the request
    NoChange,
    /// The change was applied
    Success,
}

/// One resolved keylist change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeylistUpdated {
    /// The key the change was about
    pub recipient_key: String,
    /// The requested action
    pub action: KeylistUpdateAction,
    /// The outcome
    pub result: KeylistUpdateResult,
}

/// Mediator → recipient: outcomes of the requested changes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeylistUpdateResponseMessage {
    /// Wire headers
    #[serde(flatten)]
    pub meta: MessageMeta,
    /// One entry per requested change
    pub updated: Vec<KeylistUpdated>,
}

impl KeylistUpdateResponseMessage {
    /// Create a response threaded to the triggering update message
    pub fn new(updated: Vec<KeylistUpdated>, thread: ThreadDecorator) -> Self {
        Self {
            meta: MessageMeta::new(KEYLIST_UPDATE_RESPONSE_TYPE).with_thread(thread),
            updated,
        }
    }
}

impl TypedMessage for KeylistUpdateResponseMessage {
    const TYPE: &'static str = KEYLIST_UPDATE_RESPONSE_TYPE;

    fn meta(&self) -> &MessageMeta {
        &self.meta
    }
}
