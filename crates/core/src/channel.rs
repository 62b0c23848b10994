//! Work distribution channel.
//!
//! [`WorkChannel`] is the producer-side contract (batch and single submit).
//! [`MemoryQueue`] is an in-process, at-least-once implementation: consumers
//! receive one delivery at a time and hand failed items back with
//! [`QueueConsumer::retry`] for redelivery.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use metrics::counter;
use tokio::sync::{mpsc, Mutex};

use crate::error::ChannelError;
use crate::types::WorkItem;

/// Largest batch the queue accepts in one submit.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 100;

/// Producer side of the work channel.
#[async_trait]
pub trait WorkChannel: Send + Sync {
    /// Submit up to [`max_batch_size`](Self::max_batch_size) items at once.
    async fn send_batch(&self, items: Vec<WorkItem>) -> Result<(), ChannelError>;

    async fn send(&self, item: WorkItem) -> Result<(), ChannelError> {
        self.send_batch(vec![item]).await
    }

    fn max_batch_size(&self) -> usize;
}

/// One delivery of a work item. `attempt` starts at 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub item: WorkItem,
    pub attempt: u32,
}

/// In-memory queue backed by an unbounded tokio channel of batches.
#[derive(Clone)]
pub struct MemoryQueue {
    tx: mpsc::UnboundedSender<Vec<Delivery>>,
    max_batch_size: usize,
}

impl MemoryQueue {
    /// Create a queue and its consumer handle.
    ///
    /// `max_retries` bounds how many extra deliveries a failing item gets.
    pub fn new(max_batch_size: usize, max_retries: u32) -> (Self, QueueConsumer) {
        let (tx, rx) = mpsc::unbounded_channel();
        let consumer = QueueConsumer {
            inner: Arc::new(Mutex::new(ConsumerInner {
                rx,
                buffered: VecDeque::new(),
            })),
            tx: tx.downgrade(),
            max_retries,
        };
        (Self { tx, max_batch_size }, consumer)
    }
}

#[async_trait]
impl WorkChannel for MemoryQueue {
    async fn send_batch(&self, items: Vec<WorkItem>) -> Result<(), ChannelError> {
        if items.len() > self.max_batch_size {
            return Err(ChannelError::BatchTooLarge {
                len: items.len(),
                max: self.max_batch_size,
            });
        }
        if items.is_empty() {
            return Ok(());
        }
        let batch = items
            .into_iter()
            .map(|item| Delivery { item, attempt: 1 })
            .collect();
        self.tx.send(batch).map_err(|_| ChannelError::Closed)
    }

    fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }
}

/// Consumer side of a [`MemoryQueue`], shareable between workers.
///
/// Batches are split into single deliveries behind one lock, so the pages
/// of a batch spread across every worker polling the consumer. Holds only a
/// weak sender for redelivery, so the queue closes once every producer
/// handle is dropped and the backlog drains.
#[derive(Clone)]
pub struct QueueConsumer {
    inner: Arc<Mutex<ConsumerInner>>,
    tx: mpsc::WeakUnboundedSender<Vec<Delivery>>,
    max_retries: u32,
}

struct ConsumerInner {
    rx: mpsc::UnboundedReceiver<Vec<Delivery>>,
    buffered: VecDeque<Delivery>,
}

impl QueueConsumer {
    /// Next delivery, or `None` once the queue is closed and drained.
    ///
    /// Cancel safe: dropping the future loses nothing.
    pub async fn recv(&self) -> Option<Delivery> {
        let mut inner = self.inner.lock().await;
        loop {
            if let Some(delivery) = inner.buffered.pop_front() {
                return Some(delivery);
            }
            let batch = inner.rx.recv().await?;
            inner.buffered.extend(batch);
        }
    }

    /// Hand a failed delivery back for another attempt.
    ///
    /// Returns `false` when the retry budget is spent or the queue is gone;
    /// the item is dropped in that case.
    pub fn retry(&self, delivery: Delivery) -> bool {
        if delivery.attempt > self.max_retries {
            return false;
        }
        let Some(tx) = self.tx.upgrade() else {
            return false;
        };
        counter!("pagefan_redeliveries_total").increment(1);
        let next = Delivery {
            item: delivery.item,
            attempt: delivery.attempt + 1,
        };
        tx.send(vec![next]).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn page(n: u32) -> WorkItem {
        WorkItem::Page {
            document_id: "doc".into(),
            start_time: Utc::now(),
            page: n,
            total_pages: 200,
        }
    }

    #[tokio::test]
    async fn test_batch_split_into_deliveries_in_order() {
        let (queue, consumer) = MemoryQueue::new(10, 0);
        queue.send_batch((1..=3).map(page).collect()).await.unwrap();
        drop(queue);

        let mut pages = Vec::new();
        while let Some(delivery) = consumer.recv().await {
            assert_eq!(delivery.attempt, 1);
            if let WorkItem::Page { page, .. } = delivery.item {
                pages.push(page);
            }
        }
        assert_eq!(pages, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_one_batch_feeds_several_consumers() {
        let (queue, consumer) = MemoryQueue::new(10, 0);
        queue.send_batch((1..=2).map(page).collect()).await.unwrap();

        // Two clones each get one item of the same batch.
        let other = consumer.clone();
        let a = consumer.recv().await.unwrap();
        let b = other.recv().await.unwrap();
        assert_ne!(a.item, b.item);
    }

    #[tokio::test]
    async fn test_oversized_batch_rejected() {
        let (queue, _consumer) = MemoryQueue::new(DEFAULT_MAX_BATCH_SIZE, 0);
        let err = queue
            .send_batch((1..=101).map(page).collect())
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::BatchTooLarge { len: 101, max: 100 }));
    }

    #[tokio::test]
    async fn test_empty_batch_is_noop() {
        let (queue, consumer) = MemoryQueue::new(10, 0);
        queue.send_batch(Vec::new()).await.unwrap();
        drop(queue);
        assert!(consumer.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_single_send() {
        let (queue, consumer) = MemoryQueue::new(10, 0);
        queue.send(page(7)).await.unwrap();
        let delivery = consumer.recv().await.unwrap();
        assert!(matches!(delivery.item, WorkItem::Page { page: 7, .. }));
    }

    #[tokio::test]
    async fn test_retry_until_budget_spent() {
        let (queue, consumer) = MemoryQueue::new(10, 2);
        queue.send(page(1)).await.unwrap();

        let first = consumer.recv().await.unwrap();
        assert!(consumer.retry(first));
        let second = consumer.recv().await.unwrap();
        assert_eq!(second.attempt, 2);
        assert!(consumer.retry(second));
        let third = consumer.recv().await.unwrap();
        assert_eq!(third.attempt, 3);
        assert!(!consumer.retry(third));
    }

    #[tokio::test]
    async fn test_retry_after_queue_dropped_fails() {
        let (queue, consumer) = MemoryQueue::new(10, 5);
        queue.send(page(1)).await.unwrap();
        let delivery = consumer.recv().await.unwrap();
        drop(queue);
        assert!(!consumer.retry(delivery));
    }

    #[tokio::test]
    async fn test_send_after_consumer_dropped_fails() {
        let (queue, consumer) = MemoryQueue::new(10, 0);
        drop(consumer);
        assert!(matches!(
            queue.send(page(1)).await.unwrap_err(),
            ChannelError::Closed
        ));
    }
}
