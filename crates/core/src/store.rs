//! Job store abstraction and the in-memory implementation.
//!
//! The store is the only shared mutable resource in the system. Every backend
//! must make [`JobStore::add_page`] a single atomic read-modify-write per
//! document, while leaving unrelated documents free to proceed in parallel.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::error::StoreError;
use crate::types::{CompletionOutcome, JobState};

pub type StoreResult<T> = Result<T, StoreError>;

/// Key-value persistence for [`JobState`], keyed by document id.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Write a fresh state with no completed pages.
    async fn create(&self, document_id: &str, expected_pages: u32) -> StoreResult<()>;

    /// Atomically add `page` to the completed set and report what happened.
    async fn add_page(&self, document_id: &str, page: u32) -> StoreResult<CompletionOutcome>;

    /// Current state, or `None` if the document is unknown.
    async fn load(&self, document_id: &str) -> StoreResult<Option<JobState>>;

    /// Remove all state for the document. Returns whether anything was removed.
    async fn delete(&self, document_id: &str) -> StoreResult<bool>;

    /// Short backend name for status reporting.
    fn backend(&self) -> &'static str {
        "custom"
    }
}

/// In-process store: a concurrent map of per-document locks.
///
/// The map shard lock is only held long enough to clone the entry's `Arc`;
/// the per-document `Mutex` serializes the read-modify-write.
#[derive(Clone, Default)]
pub struct MemoryJobStore {
    jobs: Arc<DashMap<String, Arc<Mutex<JobState>>>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    fn entry(&self, document_id: &str) -> Option<Arc<Mutex<JobState>>> {
        self.jobs.get(document_id).map(|e| Arc::clone(e.value()))
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, document_id: &str, expected_pages: u32) -> StoreResult<()> {
        self.jobs.insert(
            document_id.to_string(),
            Arc::new(Mutex::new(JobState::new(document_id, expected_pages))),
        );
        Ok(())
    }

    async fn add_page(&self, document_id: &str, page: u32) -> StoreResult<CompletionOutcome> {
        let Some(slot) = self.entry(document_id) else {
            return Ok(CompletionOutcome::Unknown);
        };
        let mut state = slot.lock().await;
        // A delete may have raced us between the map lookup and the lock.
        if !self
            .jobs
            .get(document_id)
            .is_some_and(|e| Arc::ptr_eq(e.value(), &slot))
        {
            return Ok(CompletionOutcome::Unknown);
        }
        if !state.accepts(page) {
            return Ok(CompletionOutcome::OutOfRange {
                expected: state.expected_pages,
            });
        }
        Ok(state.insert(page))
    }

    async fn load(&self, document_id: &str) -> StoreResult<Option<JobState>> {
        match self.entry(document_id) {
            Some(slot) => Ok(Some(slot.lock().await.clone())),
            None => Ok(None),
        }
    }

    async fn delete(&self, document_id: &str) -> StoreResult<bool> {
        Ok(self.jobs.remove(document_id).is_some())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_memory_store_lifecycle() {
        let store = MemoryJobStore::new();
        assert!(store.is_empty());

        store.create("doc", 2).await.unwrap();
        assert_eq!(store.len(), 1);

        assert_eq!(
            store.add_page("doc", 1).await.unwrap(),
            CompletionOutcome::Recorded {
                completed: 1,
                expected: 2
            }
        );
        assert_eq!(
            store.add_page("doc", 1).await.unwrap(),
            CompletionOutcome::Duplicate
        );
        assert_eq!(
            store.add_page("doc", 9).await.unwrap(),
            CompletionOutcome::OutOfRange { expected: 2 }
        );

        let state = store.load("doc").await.unwrap().unwrap();
        assert_eq!(state.completed_pages.into_iter().collect::<Vec<_>>(), vec![1]);

        assert!(store.delete("doc").await.unwrap());
        assert!(!store.delete("doc").await.unwrap());
        assert!(store.load("doc").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_add_page_unknown_document() {
        let store = MemoryJobStore::new();
        assert_eq!(
            store.add_page("missing", 1).await.unwrap(),
            CompletionOutcome::Unknown
        );
        // Unknown pages never create state as a side effect.
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_add_page_after_delete_is_unknown() {
        let store = MemoryJobStore::new();
        store.create("doc", 1).await.unwrap();
        assert!(store.add_page("doc", 1).await.unwrap().completed_job());
        store.delete("doc").await.unwrap();
        assert_eq!(
            store.add_page("doc", 1).await.unwrap(),
            CompletionOutcome::Unknown
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_documents_do_not_share_a_lock() {
        let store = MemoryJobStore::new();
        store.create("a", 1).await.unwrap();
        store.create("b", 1).await.unwrap();

        // Holding one document's lock must not block another document.
        let slot_a = store.entry("a").unwrap();
        let _held = slot_a.lock().await;
        let outcome = tokio::time::timeout(
            std::time::Duration::from_secs(1),
            store.add_page("b", 1),
        )
        .await
        .expect("document b blocked by document a")
        .unwrap();
        assert!(outcome.completed_job());
    }
}
