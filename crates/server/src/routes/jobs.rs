// crates/server/src/routes/jobs.rs
//! API routes for fan-out jobs.
//!
//! - POST /jobs?amount=N - Create a job of N pages (default when N is unusable)
//! - GET /jobs/{document_id} - Completion status of a job

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use pagefan_core::JobSnapshot;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Query string for job creation. `amount` stays a raw string so that
/// malformed values fall back to the default instead of failing extraction.
#[derive(Debug, Default, Deserialize)]
pub struct CreateJobQuery {
    pub amount: Option<String>,
}

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
pub struct CreateJobResponse {
    pub document_id: String,
    pub pages: u32,
}

/// POST /api/jobs - Create and enqueue a job.
async fn create_job(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CreateJobQuery>,
) -> ApiResult<(StatusCode, Json<CreateJobResponse>)> {
    let (document_id, pages) = state
        .dispatcher
        .dispatch_requested(query.amount.as_deref())
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(CreateJobResponse { document_id, pages }),
    ))
}

/// GET /api/jobs/{document_id} - Current status. Unknown ids read as empty.
async fn get_status(
    State(state): State<Arc<AppState>>,
    Path(document_id): Path<String>,
) -> ApiResult<Json<JobSnapshot>> {
    if document_id.trim().is_empty() {
        return Err(ApiError::BadRequest("document id is empty".into()));
    }
    Ok(Json(state.tracker.snapshot(&document_id).await?))
}

/// Build the jobs router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/jobs", post(create_job))
        .route("/jobs/{document_id}", get(get_status))
}
