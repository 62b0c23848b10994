//! Per-document completion tracking.
//!
//! [`JobTracker`] is the fan-in half of the system. Its one authoritative
//! signal is the `true` returned by [`JobTracker::record_completion`]: across
//! every delivery of every page of a document, exactly one call returns it.

use std::sync::Arc;

use metrics::counter;

use crate::error::TrackerError;
use crate::store::JobStore;
use crate::types::{CompletionOutcome, JobSnapshot};

pub type TrackerResult<T> = Result<T, TrackerError>;

/// Owns job state for every document, through a shared [`JobStore`].
#[derive(Clone)]
pub struct JobTracker {
    store: Arc<dyn JobStore>,
}

impl JobTracker {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    /// Create state for a new document with no pages completed.
    ///
    /// Calling this twice for the same id replaces the earlier state; ids are
    /// expected to be fresh.
    pub async fn initialize(&self, document_id: &str, expected_pages: u32) -> TrackerResult<()> {
        self.store.create(document_id, expected_pages).await?;
        tracing::debug!(document_id, expected_pages, "Job initialized");
        Ok(())
    }

    /// Record that `page` finished. Returns `true` iff this call completed the job.
    ///
    /// Duplicates and pages for unknown (or already destroyed) documents
    /// return `false`.
    pub async fn record_completion(&self, document_id: &str, page: u32) -> TrackerResult<bool> {
        match self.store.add_page(document_id, page).await? {
            CompletionOutcome::Unknown => {
                tracing::debug!(document_id, page, "Completion for unknown job ignored");
                Ok(false)
            }
            CompletionOutcome::Duplicate => {
                counter!("pagefan_duplicate_completions_total").increment(1);
                tracing::debug!(document_id, page, "Duplicate completion ignored");
                Ok(false)
            }
            CompletionOutcome::OutOfRange { expected } => Err(TrackerError::PageOutOfRange {
                document_id: document_id.to_string(),
                page,
                expected,
            }),
            outcome @ CompletionOutcome::Recorded { completed, expected } => {
                counter!("pagefan_pages_completed_total").increment(1);
                tracing::trace!(document_id, page, completed, expected, "Page recorded");
                Ok(outcome.completed_job())
            }
        }
    }

    /// Whether every expected page has been recorded. Missing jobs report `false`.
    ///
    /// Only use this for reporting; the terminal action keys off
    /// [`record_completion`](Self::record_completion).
    pub async fn is_complete(&self, document_id: &str) -> TrackerResult<bool> {
        Ok(self
            .store
            .load(document_id)
            .await?
            .is_some_and(|state| state.is_complete()))
    }

    /// Status for external reporting. Unknown documents read as empty.
    pub async fn snapshot(&self, document_id: &str) -> TrackerResult<JobSnapshot> {
        Ok(self
            .store
            .load(document_id)
            .await?
            .map(|state| state.snapshot())
            .unwrap_or_default())
    }

    /// Drop all state for the document. Destroying an absent job is a no-op.
    pub async fn destroy(&self, document_id: &str) -> TrackerResult<()> {
        if !self.store.delete(document_id).await? {
            tracing::debug!(document_id, "Destroy on absent job");
        }
        Ok(())
    }
}
