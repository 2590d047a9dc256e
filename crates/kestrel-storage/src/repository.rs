//! Tag-indexed repository over a storage backend
//!
//! The repository adds the contracts protocol modules depend on:
//! `get_single_by_query` resolves a correlation key to exactly one record
//! (zero is `RecordNotFound`, several is `RecordDuplicate` and means
//! corrupted state), and `lock_record` serializes read-modify-write on a
//! single record id so two concurrent transitions cannot both read the
//! same antecedent state and both commit.

use std::collections::HashMap;
use std::sync::Arc;

use async_lock::{Mutex, MutexGuardArc};
use kestrel_core::{AgentError, AgentResult};
use parking_lot::Mutex as SyncMutex;

use crate::record::{Record, RecordTags};
use crate::storage::StorageService;

/// Guard serializing transitions on one record id
pub type RecordGuard = MutexGuardArc<()>;

/// Repository over one record kind
pub struct Repository<R: Record> {
    storage: Arc<dyn StorageService<R>>,
    locks: SyncMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<R: Record> Repository<R> {
    /// Create a repository over the given backend
    pub fn new(storage: Arc<dyn StorageService<R>>) -> Self {
        Self {
            storage,
            locks: SyncMutex::new(HashMap::new()),
        }
    }

    /// Persist a new record
    pub async fn save(&self, record: &R) -> AgentResult<()> {
        self.storage.save(record).await
    }

    /// Replace an existing record; updating a missing id is an error
    pub async fn update(&self, record: &R) -> AgentResult<()> {
        self.storage.update(record).await
    }

    /// Look up a record by id
    pub async fn find_by_id(&self, id: &str) -> AgentResult<Option<R>> {
        self.storage.find_by_id(id).await
    }

    /// Get a record by id, failing when it is absent
    pub async fn get_by_id(&self, id: &str) -> AgentResult<R> {
        self.find_by_id(id).await?.ok_or_else(|| {
            AgentError::record_not_found(format!("no {} record with id {id}", R::RECORD_TYPE))
        })
    }

    /// All records of this kind
    pub async fn get_all(&self) -> AgentResult<Vec<R>> {
        self.storage.find_all().await
    }

    /// All records matching the tag query
    pub async fn find_by_query(&self, query: &RecordTags) -> AgentResult<Vec<R>> {
        self.storage.find_by_query(query).await
    }

    /// The unique record matching the tag query
    ///
    /// Zero matches is `RecordNotFound`; more than one is `RecordDuplicate`,
    /// which indicates corrupted state and is never swallowed.
    pub async fn get_single_by_query(&self, query: &RecordTags) -> AgentResult<R> {
        let mut matches = self.storage.find_by_query(query).await?;
        match matches.len() {
            0 => Err(AgentError::record_not_found(format!(
                "no {} record matches {query:?}",
                R::RECORD_TYPE
            ))),
            1 => Ok(matches.remove(0)),
            n => Err(AgentError::record_duplicate(format!(
                "{n} {} records match {query:?}",
                R::RECORD_TYPE
            ))),
        }
    }

    /// Acquire the transition lock for one record id
    ///
    /// Callers hold the guard across their load-validate-update window.
    /// Locks are keyed by id, so transitions on different records never
    /// contend.
    pub async fn lock_record(&self, id: &str) -> RecordGuard {
        let lock = {
            let mut locks = self.locks.lock();
            Arc::clone(locks.entry(id.to_string()).or_default())
        };
        lock.lock_arc().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::tags;
    use crate::storage::InMemoryStorage;
    use assert_matches::assert_matches;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct NoteRecord {
        id: String,
        connection_id: String,
        thread_id: String,
        body: String,
    }

    impl Record for NoteRecord {
        const RECORD_TYPE: &'static str = "NoteRecord";

        fn id(&self) -> &str {
            &self.id
        }

        fn tags(&self) -> RecordTags {
            tags([
                ("connection_id", Some(self.connection_id.as_str())),
                ("thread_id", Some(self.thread_id.as_str())),
            ])
        }
    }

    fn note(id: &str, connection_id: &str, thread_id: &str) -> NoteRecord {
        NoteRecord {
            id: id.to_string(),
            connection_id: connection_id.to_string(),
            thread_id: thread_id.to_string(),
            body: String::new(),
        }
    }

    fn repository() -> Repository<NoteRecord> {
        Repository::new(Arc::new(InMemoryStorage::new()))
    }

    #[tokio::test]
    async fn get_by_id_fails_on_missing_record() {
        let repo = repository();
        assert_matches!(
            repo.get_by_id("missing").await,
            Err(AgentError::RecordNotFound { .. })
        );
    }

    #[tokio::test]
    async fn update_requires_existing_record() {
        let repo = repository();
        assert_matches!(
            repo.update(&note("n1", "conn-1", "t1")).await,
            Err(AgentError::RecordNotFound { .. })
        );
    }

    #[tokio::test]
    async fn save_rejects_duplicate_id() {
        let repo = repository();
        repo.save(&note("n1", "conn-1", "t1")).await.unwrap();
        assert_matches!(
            repo.save(&note("n1", "conn-2", "t2")).await,
            Err(AgentError::RecordDuplicate { .. })
        );
    }

    #[tokio::test]
    async fn get_single_by_query_enforces_exactly_one() {
        let repo = repository();
        repo.save(&note("n1", "conn-1", "t1")).await.unwrap();
        repo.save(&note("n2", "conn-1", "t2")).await.unwrap();

        // Zero matches
        assert_matches!(
            repo.get_single_by_query(&tags([("connection_id", Some("conn-9"))]))
                .await,
            Err(AgentError::RecordNotFound { .. })
        );

        // Exactly one
        let found = repo
            .get_single_by_query(&tags([
                ("connection_id", Some("conn-1")),
                ("thread_id", Some("t2")),
            ]))
            .await
            .unwrap();
        assert_eq!(found.id, "n2");

        // More than one
        assert_matches!(
            repo.get_single_by_query(&tags([("connection_id", Some("conn-1"))]))
                .await,
            Err(AgentError::RecordDuplicate { .. })
        );
    }

    #[tokio::test]
    async fn record_lock_serializes_same_id_only() {
        let repo = Arc::new(repository());

        let first = repo.lock_record("n1").await;
        // A different id is immediately available.
        let _other = repo.lock_record("n2").await;

        // The same id blocks until the first guard drops.
        let contender = {
            let repo = Arc::clone(&repo);
            tokio::spawn(async move {
                let _guard = repo.lock_record("n1").await;
            })
        };
        tokio::task::yield_now().await;
        assert!(!contender.is_finished());

        drop(first);
        contender.await.unwrap();
    }
}
