//! Fan-out: turn a job request into page work items.

use std::sync::Arc;

use chrono::Utc;
use metrics::counter;

use crate::channel::WorkChannel;
use crate::error::DispatchError;
use crate::ids::IdGenerator;
use crate::tracker::JobTracker;
use crate::types::{DocumentId, WorkItem};

/// Interpret a client-supplied page count.
///
/// Missing, non-numeric, zero and negative values all fall back to `default`.
pub fn resolve_page_count(raw: Option<&str>, default: u32) -> u32 {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
        .filter(|&n| n > 0)
        .map(|n| u32::try_from(n).unwrap_or(u32::MAX))
        .unwrap_or(default)
}

/// Creates job state and enqueues one page item per page.
#[derive(Clone)]
pub struct Dispatcher {
    tracker: JobTracker,
    channel: Arc<dyn WorkChannel>,
    ids: Arc<dyn IdGenerator>,
    default_pages: u32,
    max_pages: u32,
}

impl Dispatcher {
    pub fn new(
        tracker: JobTracker,
        channel: Arc<dyn WorkChannel>,
        ids: Arc<dyn IdGenerator>,
        default_pages: u32,
        max_pages: u32,
    ) -> Self {
        Self {
            tracker,
            channel,
            ids,
            default_pages,
            max_pages,
        }
    }

    /// Dispatch a job whose size comes straight from a request parameter.
    pub async fn dispatch_requested(&self, raw: Option<&str>) -> Result<(DocumentId, u32), DispatchError> {
        let pages = resolve_page_count(raw, self.default_pages);
        let document_id = self.dispatch(pages).await?;
        Ok((document_id, pages))
    }

    /// Create a job of `expected_pages` pages and enqueue all of them.
    ///
    /// Pages go out in consecutive batches no larger than the channel limit.
    /// If enqueueing fails, the freshly created state is removed again.
    /// A zero-page job is rejected: it would be complete on creation with no
    /// page left to emit its end item.
    pub async fn dispatch(&self, expected_pages: u32) -> Result<DocumentId, DispatchError> {
        if expected_pages == 0 {
            return Err(DispatchError::EmptyJob);
        }
        if expected_pages > self.max_pages {
            return Err(DispatchError::TooManyPages {
                requested: expected_pages,
                max: self.max_pages,
            });
        }

        let document_id = self.ids.next_id();
        let start_time = Utc::now();
        self.tracker.initialize(&document_id, expected_pages).await?;

        let items: Vec<WorkItem> = (1..=expected_pages)
            .map(|page| WorkItem::Page {
                document_id: document_id.clone(),
                start_time,
                page,
                total_pages: expected_pages,
            })
            .collect();

        let chunk = self.channel.max_batch_size().max(1);
        let batches = items.len().div_ceil(chunk);
        for batch in items.chunks(chunk) {
            if let Err(e) = self.channel.send_batch(batch.to_vec()).await {
                tracing::error!(document_id = %document_id, error = %e, "Failed to enqueue pages");
                if let Err(cleanup) = self.tracker.destroy(&document_id).await {
                    tracing::warn!(document_id = %document_id, error = %cleanup, "Cleanup after failed dispatch failed");
                }
                return Err(e.into());
            }
        }

        counter!("pagefan_jobs_dispatched_total").increment(1);
        tracing::info!(
            document_id = %document_id,
            pages = expected_pages,
            batches,
            "Job dispatched"
        );
        Ok(document_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_page_count() {
        assert_eq!(resolve_page_count(None, 100), 100);
        assert_eq!(resolve_page_count(Some("12"), 100), 12);
        assert_eq!(resolve_page_count(Some(" 7 "), 100), 7);
        assert_eq!(resolve_page_count(Some("0"), 100), 100);
        assert_eq!(resolve_page_count(Some("-5"), 100), 100);
        assert_eq!(resolve_page_count(Some("abc"), 100), 100);
        assert_eq!(resolve_page_count(Some(""), 100), 100);
        assert_eq!(resolve_page_count(Some("2.5"), 100), 100);
        assert_eq!(resolve_page_count(Some("99999999999"), 100), u32::MAX);
    }
}
