//! Coordinate-mediation 1.0 keylist management
//!
//! A recipient asks its mediator to add or remove recipient keys from
//! the routing keylist; the mediator applies the changes and reports
//! the per-key outcome in a threaded response.
//!
//! ```text
//!   Recipient                               Mediator
//!       |                                       |
//!       |---------- keylist-update ----------->|
//!       |   (pending KeylistUpdateRecord       |  apply add/remove
//!       |    per requested change)             |  to MediationRecord
//!       |                                       |
//!       |<----- keylist-update-response --------|
//!       |   resolve each pending record         |
//!       |   with its reported result            |
//! ```
//!
//! Unsolicited or stale response entries surface as errors rather than
//! being silently dropped.

pub mod handlers;
pub mod messages;
pub mod module;
pub mod records;
pub mod service;

pub use handlers::{KeylistUpdateHandler, KeylistUpdateResponseHandler};
pub use messages::{
    KeylistUpdate, KeylistUpdateAction, KeylistUpdateMessage, KeylistUpdateResponseMessage,
    KeylistUpdateResult, KeylistUpdated, KEYLIST_UPDATE_RESPONSE_TYPE, KEYLIST_UPDATE_TYPE,
};
pub use module::MediationModule;
pub use records::{KeylistUpdateRecord, KeylistUpdateState, MediationRecord};
pub use service::MediationService;
