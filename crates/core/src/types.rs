// crates/core/src/types.rs
//! Job state and wire types shared by the dispatcher, workers and stores.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque identifier of a document (one fan-out job).
pub type DocumentId = String;

/// Persisted per-document completion record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobState {
    pub document_id: DocumentId,
    pub expected_pages: u32,
    pub completed_pages: BTreeSet<u32>,
}

impl JobState {
    /// Fresh state with nothing completed yet.
    pub fn new(document_id: impl Into<DocumentId>, expected_pages: u32) -> Self {
        Self {
            document_id: document_id.into(),
            expected_pages,
            completed_pages: BTreeSet::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.completed_pages.len() == self.expected_pages as usize
    }

    pub fn accepts(&self, page: u32) -> bool {
        (1..=self.expected_pages).contains(&page)
    }

    /// Idempotent insert. Callers must have checked [`JobState::accepts`].
    pub fn insert(&mut self, page: u32) -> CompletionOutcome {
        if !self.completed_pages.insert(page) {
            return CompletionOutcome::Duplicate;
        }
        CompletionOutcome::Recorded {
            completed: self.completed_pages.len() as u32,
            expected: self.expected_pages,
        }
    }

    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            finished: self.is_complete(),
            finished_pages: self.completed_pages.iter().copied().collect(),
        }
    }
}

/// Result of one atomic page insert against the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// No state exists for the document (never created, or already destroyed).
    Unknown,
    /// The page was already present; nothing changed.
    Duplicate,
    /// The page was added; counts are taken after the insert.
    Recorded { completed: u32, expected: u32 },
    /// The page is outside `1..=expected`; nothing was stored.
    OutOfRange { expected: u32 },
}

impl CompletionOutcome {
    /// True only for the insert that filled the last missing page.
    pub fn completed_job(&self) -> bool {
        matches!(self, Self::Recorded { completed, expected } if completed == expected)
    }
}

/// Read-only status of a job, as reported to clients.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub finished: bool,
    pub finished_pages: Vec<u32>,
}

/// Message carried by the work channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkItem {
    Page {
        document_id: DocumentId,
        start_time: DateTime<Utc>,
        page: u32,
        total_pages: u32,
    },
    End {
        document_id: DocumentId,
        start_time: DateTime<Utc>,
    },
}

impl WorkItem {
    pub fn document_id(&self) -> &str {
        match self {
            Self::Page { document_id, .. } | Self::End { document_id, .. } => document_id,
        }
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        match self {
            Self::Page { start_time, .. } | Self::End { start_time, .. } => *start_time,
        }
    }

    pub fn is_end(&self) -> bool {
        matches!(self, Self::End { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_insert_is_idempotent() {
        let mut state = JobState::new("doc", 3);
        assert_eq!(
            state.insert(2),
            CompletionOutcome::Recorded {
                completed: 1,
                expected: 3
            }
        );
        assert_eq!(state.insert(2), CompletionOutcome::Duplicate);
        assert_eq!(state.completed_pages.len(), 1);
    }

    #[test]
    fn test_accepts_bounds() {
        let state = JobState::new("doc", 3);
        assert!(!state.accepts(0));
        assert!(state.accepts(1));
        assert!(state.accepts(3));
        assert!(!state.accepts(4));
    }

    #[test]
    fn test_completed_job_only_on_last_page() {
        let mut state = JobState::new("doc", 2);
        assert!(!state.insert(1).completed_job());
        assert!(state.insert(2).completed_job());
        assert!(!state.insert(2).completed_job());
        assert!(!CompletionOutcome::Unknown.completed_job());
    }

    #[test]
    fn test_zero_page_job_is_complete() {
        let state = JobState::new("empty", 0);
        assert!(state.is_complete());
        assert!(!state.accepts(1));
    }

    #[test]
    fn test_snapshot_pages_sorted() {
        let mut state = JobState::new("doc", 4);
        for page in [4, 1, 3] {
            state.insert(page);
        }
        assert_eq!(
            state.snapshot(),
            JobSnapshot {
                finished: false,
                finished_pages: vec![1, 3, 4],
            }
        );
    }

    #[test]
    fn test_work_item_wire_format() {
        let start = DateTime::parse_from_rfc3339("2026-02-05T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let item = WorkItem::Page {
            document_id: "doc-1".into(),
            start_time: start,
            page: 2,
            total_pages: 5,
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["kind"], "page");
        assert_eq!(json["document_id"], "doc-1");
        assert_eq!(json["page"], 2);
        assert_eq!(json["total_pages"], 5);

        let end: WorkItem = serde_json::from_str(
            r#"{"kind":"end","document_id":"doc-1","start_time":"2026-02-05T12:00:00Z"}"#,
        )
        .unwrap();
        assert!(end.is_end());
        assert_eq!(end.document_id(), "doc-1");
        assert_eq!(end.start_time(), start);
    }
}
