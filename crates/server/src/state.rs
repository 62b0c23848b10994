// crates/server/src/state.rs
//! Application state for the Axum server, and the wiring that builds it.

use std::sync::Arc;
use std::time::Instant;

use pagefan_core::{
    Dispatcher, IdGenerator, JobStore, JobTracker, MemoryQueue, QueueConsumer, TrackerConfig,
    Worker,
};

/// Shared application state accessible from all route handlers.
pub struct AppState {
    /// Server start time for uptime tracking.
    pub start_time: Instant,
    /// Status queries.
    pub tracker: JobTracker,
    /// Job creation.
    pub dispatcher: Dispatcher,
    /// Name of the job store backend, for health reporting.
    pub store_backend: &'static str,
    /// Size of the in-process worker pool.
    pub workers: usize,
}

impl AppState {
    pub fn new(
        tracker: JobTracker,
        dispatcher: Dispatcher,
        store_backend: &'static str,
        workers: usize,
    ) -> Arc<Self> {
        Arc::new(Self {
            start_time: Instant::now(),
            tracker,
            dispatcher,
            store_backend,
            workers,
        })
    }

    /// Get the server uptime in seconds.
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

/// Everything the binary needs: HTTP state plus the worker side of the queue.
pub struct Pipeline {
    pub state: Arc<AppState>,
    pub worker: Worker,
    pub consumer: QueueConsumer,
}

impl Pipeline {
    /// Wire tracker, in-memory queue, dispatcher and worker around `store`.
    pub fn new(config: &TrackerConfig, store: Arc<dyn JobStore>, ids: Arc<dyn IdGenerator>) -> Self {
        let store_backend = store.backend();
        let tracker = JobTracker::new(store);
        let (queue, consumer) = MemoryQueue::new(config.max_batch_size, config.max_retries);
        let queue = Arc::new(queue);

        let dispatcher = Dispatcher::new(
            tracker.clone(),
            queue.clone(),
            ids,
            config.default_pages,
            config.max_pages,
        );
        let worker = Worker::new(tracker.clone(), queue, config.delay())
            .with_terminal_send_attempts(config.terminal_send_attempts);

        Self {
            state: AppState::new(tracker, dispatcher, store_backend, config.workers),
            worker,
            consumer,
        }
    }
}
