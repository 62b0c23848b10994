// JobTracker over the SQLite store: the same exactly-once guarantees as the
// in-memory store, with several pooled connections racing on one file.

use std::sync::Arc;

use pagefan_core::{JobSnapshot, JobTracker};
use pagefan_db::SqliteJobStore;
use pretty_assertions::assert_eq;

async fn file_tracker(dir: &tempfile::TempDir) -> JobTracker {
    let store = SqliteJobStore::open(&dir.path().join("jobs.db"))
        .await
        .expect("open job store");
    JobTracker::new(Arc::new(store))
}

#[tokio::test]
async fn three_page_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let tracker = file_tracker(&dir).await;

    tracker.initialize("doc", 3).await.unwrap();
    assert!(!tracker.record_completion("doc", 1).await.unwrap());
    assert!(!tracker.record_completion("doc", 2).await.unwrap());
    assert!(!tracker.record_completion("doc", 1).await.unwrap());
    assert!(tracker.record_completion("doc", 3).await.unwrap());

    let snap = tracker.snapshot("doc").await.unwrap();
    assert!(snap.finished);
    assert_eq!(snap.finished_pages, vec![1, 2, 3]);

    tracker.destroy("doc").await.unwrap();
    assert_eq!(tracker.snapshot("doc").await.unwrap(), JobSnapshot::default());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_completions_fire_once() {
    let dir = tempfile::tempdir().unwrap();
    let tracker = file_tracker(&dir).await;
    let pages = 40;
    tracker.initialize("doc", pages).await.unwrap();

    let mut handles = Vec::new();
    // Each page twice, to race duplicates against first deliveries.
    for page in (1..=pages).chain(1..=pages) {
        let tracker = tracker.clone();
        handles.push(tokio::spawn(async move {
            tracker.record_completion("doc", page).await.unwrap()
        }));
    }

    let mut fired = 0;
    for handle in handles {
        if handle.await.unwrap() {
            fired += 1;
        }
    }
    assert_eq!(fired, 1);
    assert_eq!(
        tracker.snapshot("doc").await.unwrap().finished_pages.len(),
        pages as usize
    );
}

#[tokio::test]
async fn state_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let tracker = file_tracker(&dir).await;
        tracker.initialize("doc", 2).await.unwrap();
        tracker.record_completion("doc", 2).await.unwrap();
    }

    let tracker = file_tracker(&dir).await;
    assert_eq!(tracker.snapshot("doc").await.unwrap().finished_pages, vec![2]);
    assert!(tracker.record_completion("doc", 1).await.unwrap());
}

#[tokio::test]
async fn jobs_are_independent() {
    let dir = tempfile::tempdir().unwrap();
    let tracker = file_tracker(&dir).await;
    tracker.initialize("a", 1).await.unwrap();
    tracker.initialize("b", 2).await.unwrap();

    assert!(tracker.record_completion("a", 1).await.unwrap());
    tracker.destroy("a").await.unwrap();

    assert!(!tracker.record_completion("b", 1).await.unwrap());
    assert_eq!(tracker.snapshot("b").await.unwrap().finished_pages, vec![1]);
}
