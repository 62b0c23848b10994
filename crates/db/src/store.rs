//! `JobStore` implementation for [`SqliteJobStore`].

use std::collections::BTreeSet;

use async_trait::async_trait;
use pagefan_core::{CompletionOutcome, JobState, JobStore, StoreError, StoreResult};

use crate::{DbError, SqliteJobStore};

fn db_err(e: sqlx::Error) -> StoreError {
    DbError::from(e).into()
}

fn corrupt(document_id: &str, message: impl Into<String>) -> StoreError {
    StoreError::Corrupt {
        document_id: document_id.to_string(),
        message: message.into(),
    }
}

#[async_trait]
impl JobStore for SqliteJobStore {
    async fn create(&self, document_id: &str, expected_pages: u32) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        // Replace any leftover pages from an earlier job with the same id.
        sqlx::query("DELETE FROM job_pages WHERE document_id = ?")
            .bind(document_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        sqlx::query(
            "INSERT OR REPLACE INTO jobs (document_id, expected_pages, created_at) VALUES (?, ?, ?)",
        )
        .bind(document_id)
        .bind(i64::from(expected_pages))
        .bind(chrono::Utc::now().timestamp_millis())
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;
        tx.commit().await.map_err(db_err)
    }

    async fn add_page(&self, document_id: &str, page: u32) -> StoreResult<CompletionOutcome> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        // Write first, so the transaction takes the write lock up front and
        // the count below sees every committed page.
        let inserted = sqlx::query(
            "INSERT OR IGNORE INTO job_pages (document_id, page) \
             SELECT document_id, ?2 FROM jobs \
             WHERE document_id = ?1 AND ?2 BETWEEN 1 AND expected_pages",
        )
        .bind(document_id)
        .bind(i64::from(page))
        .execute(&mut *tx)
        .await
        .map_err(db_err)?
        .rows_affected();

        let expected: Option<(i64,)> =
            sqlx::query_as("SELECT expected_pages FROM jobs WHERE document_id = ?")
                .bind(document_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_err)?;
        let Some((expected,)) = expected else {
            tx.rollback().await.map_err(db_err)?;
            return Ok(CompletionOutcome::Unknown);
        };
        let expected = u32::try_from(expected)
            .map_err(|_| corrupt(document_id, format!("expected_pages = {expected}")))?;

        let outcome = if inserted == 0 {
            if (1..=expected).contains(&page) {
                CompletionOutcome::Duplicate
            } else {
                CompletionOutcome::OutOfRange { expected }
            }
        } else {
            let (completed,): (i64,) =
                sqlx::query_as("SELECT COUNT(*) FROM job_pages WHERE document_id = ?")
                    .bind(document_id)
                    .fetch_one(&mut *tx)
                    .await
                    .map_err(db_err)?;
            let completed = u32::try_from(completed)
                .map_err(|_| corrupt(document_id, format!("page count = {completed}")))?;
            CompletionOutcome::Recorded {
                completed,
                expected,
            }
        };

        tx.commit().await.map_err(db_err)?;
        Ok(outcome)
    }

    async fn load(&self, document_id: &str) -> StoreResult<Option<JobState>> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let row: Option<(i64,)> =
            sqlx::query_as("SELECT expected_pages FROM jobs WHERE document_id = ?")
                .bind(document_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_err)?;
        let Some((expected,)) = row else {
            return Ok(None);
        };

        let pages: Vec<(i64,)> =
            sqlx::query_as("SELECT page FROM job_pages WHERE document_id = ? ORDER BY page")
                .bind(document_id)
                .fetch_all(&mut *tx)
                .await
                .map_err(db_err)?;
        tx.commit().await.map_err(db_err)?;

        let expected_pages = u32::try_from(expected)
            .map_err(|_| corrupt(document_id, format!("expected_pages = {expected}")))?;
        let completed_pages = pages
            .into_iter()
            .map(|(p,)| {
                u32::try_from(p).map_err(|_| corrupt(document_id, format!("page = {p}")))
            })
            .collect::<Result<BTreeSet<u32>, _>>()?;

        Ok(Some(JobState {
            document_id: document_id.to_string(),
            expected_pages,
            completed_pages,
        }))
    }

    async fn delete(&self, document_id: &str) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        sqlx::query("DELETE FROM job_pages WHERE document_id = ?")
            .bind(document_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        let removed = sqlx::query("DELETE FROM jobs WHERE document_id = ?")
            .bind(document_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?
            .rows_affected();
        tx.commit().await.map_err(db_err)?;
        Ok(removed > 0)
    }

    fn backend(&self) -> &'static str {
        "sqlite"
    }
}
