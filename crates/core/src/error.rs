// crates/core/src/error.rs
use std::path::PathBuf;
use thiserror::Error;

use crate::types::DocumentId;

/// Errors raised by a [`JobStore`](crate::store::JobStore) backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Job store unavailable: {0}")]
    Unavailable(String),

    #[error("Job store backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),

    #[error("Corrupt job state for {document_id}: {message}")]
    Corrupt {
        document_id: DocumentId,
        message: String,
    },
}

impl StoreError {
    /// Corrupt rows look the same on every delivery; everything else may
    /// succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Corrupt { .. })
    }
}

/// Errors returned by [`JobTracker`](crate::tracker::JobTracker) operations.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Page {page} out of range for {document_id} (expected 1..={expected})")]
    PageOutOfRange {
        document_id: DocumentId,
        page: u32,
        expected: u32,
    },
}

impl TrackerError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Store(e) => e.is_retryable(),
            Self::PageOutOfRange { .. } => false,
        }
    }
}

/// Errors from submitting work to a [`WorkChannel`](crate::channel::WorkChannel).
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Batch of {len} items exceeds the channel limit of {max}")]
    BatchTooLarge { len: usize, max: usize },

    #[error("Work channel closed")]
    Closed,
}

/// Errors from [`Dispatcher::dispatch`](crate::dispatcher::Dispatcher::dispatch).
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("A job needs at least one page")]
    EmptyJob,

    #[error("Requested {requested} pages, the limit is {max}")]
    TooManyPages { requested: u32, max: u32 },

    #[error(transparent)]
    Tracker(#[from] TrackerError),

    #[error("Failed to enqueue pages: {0}")]
    Channel(#[from] ChannelError),
}

/// Errors from handling a single work item in the worker loop.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Tracker(#[from] TrackerError),

    #[error("Could not submit terminal item for {document_id}: {source}")]
    TerminalSend {
        document_id: DocumentId,
        #[source]
        source: ChannelError,
    },

    #[error("Could not remove state of finished job {document_id}: {source}")]
    Destroy {
        document_id: DocumentId,
        #[source]
        source: TrackerError,
    },
}

impl WorkerError {
    /// Whether the transport should redeliver the item that caused this error.
    ///
    /// Neither terminal step is redelivered: the page is already recorded,
    /// so a second delivery would observe `false` and never repeat the step.
    /// Both are retried inline instead.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Tracker(e) => e.is_retryable(),
            Self::TerminalSend { .. } | Self::Destroy { .. } => false,
        }
    }
}

/// Errors loading or validating [`TrackerConfig`](crate::config::TrackerConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid TOML in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
