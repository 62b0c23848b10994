// crates/core/src/lib.rs
//! Fan-out/fan-in completion tracking.
//!
//! A document is split into pages, pages travel over an at-least-once
//! [`WorkChannel`], and [`JobTracker`] folds their completions back together
//! so that exactly one worker observes the job becoming complete.

pub mod channel;
pub mod config;
pub mod delay;
pub mod dispatcher;
pub mod error;
pub mod ids;
pub mod store;
pub mod tracker;
pub mod types;
pub mod worker;

pub use channel::{Delivery, MemoryQueue, QueueConsumer, WorkChannel, DEFAULT_MAX_BATCH_SIZE};
pub use config::TrackerConfig;
pub use delay::DelayPolicy;
pub use dispatcher::{resolve_page_count, Dispatcher};
pub use error::*;
pub use ids::{IdGenerator, SequentialIds, UuidIds};
pub use store::{JobStore, MemoryJobStore, StoreResult};
pub use tracker::{JobTracker, TrackerResult};
pub use types::*;
pub use worker::{spawn_workers, ItemOutcome, Worker};
