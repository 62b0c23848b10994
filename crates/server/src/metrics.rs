//! Application metrics for Prometheus monitoring.
//!
//! The core crate records through the `metrics` facade; this module installs
//! the Prometheus recorder once and renders it for `GET /metrics`.

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

/// Global Prometheus handle for rendering metrics.
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// Call once at startup, before any metrics are recorded.
/// Returns `true` if initialization succeeded, `false` if already initialized.
pub fn init_metrics() -> bool {
    if PROMETHEUS_HANDLE.get().is_some() {
        return false;
    }

    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();

    if metrics::set_global_recorder(recorder).is_err() {
        tracing::warn!("Failed to set global metrics recorder (already set)");
        return false;
    }

    if PROMETHEUS_HANDLE.set(handle).is_err() {
        tracing::warn!("Failed to store Prometheus handle (already set)");
    }

    describe_metrics();

    tracing::info!("Prometheus metrics initialized");
    true
}

fn describe_metrics() {
    describe_counter!(
        "pagefan_jobs_dispatched_total",
        "Jobs created and fully enqueued"
    );
    describe_counter!(
        "pagefan_pages_completed_total",
        "Distinct page completions recorded"
    );
    describe_counter!(
        "pagefan_duplicate_completions_total",
        "Page completions absorbed as duplicates"
    );
    describe_counter!(
        "pagefan_jobs_completed_total",
        "Terminal end items observed by workers"
    );
    describe_counter!(
        "pagefan_redeliveries_total",
        "Work items handed back to the queue after a retryable failure"
    );
    describe_histogram!(
        "pagefan_job_duration_seconds",
        "Time from dispatch to the terminal end item"
    );
}

/// Render current metrics in Prometheus text format.
///
/// Returns `None` if metrics are not initialized.
pub fn render_metrics() -> Option<String> {
    PROMETHEUS_HANDLE.get().map(|h| h.render())
}
