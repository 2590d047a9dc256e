//! Tag-indexed record persistence for the Kestrel messaging agent
//!
//! Every protocol keeps its exchange state in records, looked up by flat
//! tags (connection id, thread id, recipient key). This crate defines the
//! record contract, the storage backend boundary, an in-memory backend,
//! and the repository layer that adds uniqueness guarantees and per-record
//! transition locking.

mod record;
mod repository;
mod storage;

pub use record::{tags, tags_match, Record, RecordTags};
pub use repository::{RecordGuard, Repository};
pub use storage::{InMemoryStorage, StorageService};
