//! Storage backend contract and in-memory implementation
//!
//! The backend owns physical persistence only. The uniqueness guarantees
//! protocol modules rely on live in the [`Repository`](crate::Repository)
//! layer above this trait.

use std::collections::HashMap;

use async_lock::RwLock;
use async_trait::async_trait;
use kestrel_core::{AgentError, AgentResult};

use crate::record::{tags_match, Record, RecordTags};

/// Physical persistence backend for one record kind
#[async_trait]
pub trait StorageService<R: Record>: Send + Sync {
    /// Insert a new record; the id must not already exist
    async fn save(&self, record: &R) -> AgentResult<()>;

    /// Replace an existing record; the id must already exist
    async fn update(&self, record: &R) -> AgentResult<()>;

    /// Look up a record by id
    async fn find_by_id(&self, id: &str) -> AgentResult<Option<R>>;

    /// All records of this kind, in unspecified order
    async fn find_all(&self) -> AgentResult<Vec<R>>;

    /// All records whose tag projection satisfies every pair in `query`
    async fn find_by_query(&self, query: &RecordTags) -> AgentResult<Vec<R>>;
}

/// In-memory storage backend
///
/// Suitable for tests and ephemeral agents; tag queries scan, which is fine
/// at the record counts a single agent holds.
#[derive(Debug, Default)]
pub struct InMemoryStorage<R> {
    records: RwLock<HashMap<String, R>>,
}

impl<R> InMemoryStorage<R> {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl<R: Record> StorageService<R> for InMemoryStorage<R> {
    async fn save(&self, record: &R) -> AgentResult<()> {
        let mut records = self.records.write().await;
        if records.contains_key(record.id()) {
            return Err(AgentError::record_duplicate(format!(
                "{} record {} already exists",
                R::RECORD_TYPE,
                record.id()
            )));
        }
        records.insert(record.id().to_string(), record.clone());
        Ok(())
    }

    async fn update(&self, record: &R) -> AgentResult<()> {
        let mut records = self.records.write().await;
        if !records.contains_key(record.id()) {
            return Err(AgentError::record_not_found(format!(
                "cannot update missing {} record {}",
                R::RECORD_TYPE,
                record.id()
            )));
        }
        records.insert(record.id().to_string(), record.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> AgentResult<Option<R>> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn find_all(&self) -> AgentResult<Vec<R>> {
        Ok(self.records.read().await.values().cloned().collect())
    }

    async fn find_by_query(&self, query: &RecordTags) -> AgentResult<Vec<R>> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .filter(|record| tags_match(&record.tags(), query))
            .cloned()
            .collect())
    }
}
