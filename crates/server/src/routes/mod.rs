//! API route handlers for the pagefan server.

pub mod health;
pub mod jobs;
pub mod metrics;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

/// Create the combined router: API routes under /api plus the metrics scrape path.
///
/// Routes:
/// - GET  /api/health - Health check
/// - POST /api/jobs?amount=N - Create a job of N pages
/// - GET  /api/jobs/{document_id} - Job completion status
/// - GET  /metrics - Prometheus metrics
pub fn api_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", health::router())
        .nest("/api", jobs::router())
        .merge(metrics::router())
        .with_state(state)
}
