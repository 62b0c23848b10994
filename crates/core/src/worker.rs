//! Fan-in: the worker loop that consumes page and end items.
//!
//! ```text
//!   Page ──delay──► record_completion ──true──► send(End) ──► destroy
//!                          │                      (retried)     (retried)
//!                        false ──► done
//!   End  ──► log duration + job_duration_seconds
//! ```
//!
//! The terminal item is submitted before state is destroyed, so a status
//! reader never sees the job vanish ahead of its end signal. Both terminal
//! steps are retried in place: a redelivered page would only see a duplicate
//! and never get back to them.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use metrics::{counter, histogram};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::channel::{Delivery, QueueConsumer, WorkChannel};
use crate::delay::DelayPolicy;
use crate::error::{ChannelError, WorkerError};
use crate::tracker::JobTracker;
use crate::types::WorkItem;

/// What handling one item led to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Page recorded (or absorbed as a duplicate); job still open.
    PageRecorded,
    /// This page completed the job; the end item was sent and state destroyed.
    JobCompleted,
    /// An end item was observed.
    JobFinished { duration: Duration },
}

/// Stateless handler shared by every worker loop.
#[derive(Clone)]
pub struct Worker {
    tracker: JobTracker,
    channel: Arc<dyn WorkChannel>,
    delay: DelayPolicy,
    terminal_send_attempts: u32,
    terminal_backoff: Duration,
}

impl Worker {
    pub fn new(tracker: JobTracker, channel: Arc<dyn WorkChannel>, delay: DelayPolicy) -> Self {
        Self {
            tracker,
            channel,
            delay,
            terminal_send_attempts: 3,
            terminal_backoff: Duration::from_millis(50),
        }
    }

    pub fn with_terminal_send_attempts(mut self, attempts: u32) -> Self {
        self.terminal_send_attempts = attempts.max(1);
        self
    }

    pub fn with_terminal_backoff(mut self, backoff: Duration) -> Self {
        self.terminal_backoff = backoff;
        self
    }

    /// Handle a single work item.
    pub async fn handle(&self, item: &WorkItem) -> Result<ItemOutcome, WorkerError> {
        match item {
            WorkItem::End {
                document_id,
                start_time,
            } => {
                let duration = (Utc::now() - *start_time).to_std().unwrap_or_default();
                histogram!("pagefan_job_duration_seconds").record(duration.as_secs_f64());
                counter!("pagefan_jobs_completed_total").increment(1);
                tracing::info!(
                    document_id = %document_id,
                    duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
                    "Job finished"
                );
                Ok(ItemOutcome::JobFinished { duration })
            }
            WorkItem::Page {
                document_id,
                start_time,
                page,
                ..
            } => {
                self.delay.wait().await;

                if !self.tracker.record_completion(document_id, *page).await? {
                    return Ok(ItemOutcome::PageRecorded);
                }

                let end = WorkItem::End {
                    document_id: document_id.clone(),
                    start_time: *start_time,
                };
                self.send_terminal(document_id, end).await?;
                self.destroy_finished(document_id).await?;
                Ok(ItemOutcome::JobCompleted)
            }
        }
    }

    async fn send_terminal(&self, document_id: &str, end: WorkItem) -> Result<(), WorkerError> {
        let mut last_err = ChannelError::Closed;
        for attempt in 1..=self.terminal_send_attempts {
            match self.channel.send(end.clone()).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!(
                        document_id,
                        attempt,
                        error = %e,
                        "Terminal item submit failed"
                    );
                    last_err = e;
                }
            }
            if attempt < self.terminal_send_attempts {
                tokio::time::sleep(self.terminal_backoff * attempt).await;
            }
        }
        Err(WorkerError::TerminalSend {
            document_id: document_id.to_string(),
            source: last_err,
        })
    }

    async fn destroy_finished(&self, document_id: &str) -> Result<(), WorkerError> {
        let mut attempt = 1;
        loop {
            match self.tracker.destroy(document_id).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_retryable() && attempt < self.terminal_send_attempts => {
                    tracing::warn!(
                        document_id,
                        attempt,
                        error = %e,
                        "Removing finished job failed"
                    );
                    tokio::time::sleep(self.terminal_backoff * attempt).await;
                    attempt += 1;
                }
                Err(source) => {
                    return Err(WorkerError::Destroy {
                        document_id: document_id.to_string(),
                        source,
                    })
                }
            }
        }
    }

    /// Handle one delivery, handing it back to the queue on retryable failure.
    pub async fn process(&self, consumer: &QueueConsumer, delivery: Delivery) {
        match self.handle(&delivery.item).await {
            Ok(_) => {}
            Err(e) if e.is_retryable() => {
                let document_id = delivery.item.document_id().to_string();
                let attempt = delivery.attempt;
                tracing::warn!(
                    document_id = %document_id,
                    attempt,
                    error = %e,
                    "Work item failed, scheduling redelivery"
                );
                if !consumer.retry(delivery) {
                    tracing::error!(
                        document_id = %document_id,
                        attempt,
                        error = %e,
                        "Work item dropped, redelivery refused"
                    );
                }
            }
            Err(e) => {
                tracing::error!(
                    document_id = %delivery.item.document_id(),
                    error = %e,
                    "Work item failed permanently"
                );
            }
        }
    }

    /// Consume deliveries one at a time until the queue closes or `cancel` fires.
    pub async fn run(self, id: usize, consumer: QueueConsumer, cancel: CancellationToken) {
        tracing::debug!(worker = id, "Worker started");
        loop {
            let delivery = tokio::select! {
                _ = cancel.cancelled() => break,
                delivery = consumer.recv() => match delivery {
                    Some(delivery) => delivery,
                    None => break,
                },
            };
            self.process(&consumer, delivery).await;
        }
        tracing::debug!(worker = id, "Worker stopped");
    }
}

/// Spawn `count` worker loops sharing one consumer.
pub fn spawn_workers(
    count: usize,
    worker: Worker,
    consumer: QueueConsumer,
    cancel: CancellationToken,
) -> Vec<JoinHandle<()>> {
    (0..count)
        .map(|i| {
            let worker = worker.clone();
            let consumer = consumer.clone();
            let cancel = cancel.clone();
            tokio::spawn(worker.run(i, consumer, cancel))
        })
        .collect()
}
