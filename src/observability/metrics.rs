//! Prometheus metrics for the document pipeline.
//!
//! Recording goes through the `metrics` facade; without an installed
//! recorder every call is a no-op, so library code records unconditionally.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::fmt;
use std::sync::OnceLock;
use tracing::info;

/// Enum representing all metric names used by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Fetch metrics
    FetchAttempts,
    FetchPayloadBytes,

    // Storage metrics
    StorageUploadsSuccess,
    StorageUploadsError,
    StorageUploadBytes,
    StorageBucketsCreated,

    // Submission metrics
    SubmissionsCompleted,
    SubmissionsFailed,
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::FetchAttempts => "facility_docs_fetch_attempts_total",
            MetricName::FetchPayloadBytes => "facility_docs_fetch_payload_bytes",

            MetricName::StorageUploadsSuccess => "facility_docs_storage_uploads_success_total",
            MetricName::StorageUploadsError => "facility_docs_storage_uploads_error_total",
            MetricName::StorageUploadBytes => "facility_docs_storage_upload_bytes",
            MetricName::StorageBucketsCreated => "facility_docs_storage_buckets_created_total",

            MetricName::SubmissionsCompleted => "facility_docs_submissions_completed_total",
            MetricName::SubmissionsFailed => "facility_docs_submissions_failed_total",
        }
    }

    pub fn all_metrics() -> impl Iterator<Item = MetricName> {
        use MetricName::*;
        [
            FetchAttempts,
            FetchPayloadBytes,
            StorageUploadsSuccess,
            StorageUploadsError,
            StorageUploadBytes,
            StorageBucketsCreated,
            SubmissionsCompleted,
            SubmissionsFailed,
        ]
        .into_iter()
    }
}

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Safe to call more than once.
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    if METRICS_HANDLE.get().is_some() {
        return Ok(());
    }
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {}", e))?;
    METRICS_HANDLE.set(handle).ok();
    info!("Metrics system initialized");
    Ok(())
}

/// Render the current metrics in Prometheus text format, if installed.
pub fn render() -> Option<String> {
    METRICS_HANDLE.get().map(|handle| handle.render())
}

pub mod fetch {
    use super::MetricName;

    /// Record one strategy attempt; `outcome` is accepted, failed or rejected
    pub fn attempt(strategy_id: &str, outcome: &'static str) {
        ::metrics::counter!(
            MetricName::FetchAttempts.as_str(),
            "strategy" => strategy_id.to_string(),
            "outcome" => outcome
        )
        .increment(1);
    }

    pub fn payload_bytes(bytes: u64) {
        ::metrics::histogram!(MetricName::FetchPayloadBytes.as_str()).record(bytes as f64);
    }
}

pub mod storage {
    use super::MetricName;

    pub fn upload_success(bytes: u64) {
        ::metrics::counter!(MetricName::StorageUploadsSuccess.as_str()).increment(1);
        ::metrics::histogram!(MetricName::StorageUploadBytes.as_str()).record(bytes as f64);
    }

    pub fn upload_error() {
        ::metrics::counter!(MetricName::StorageUploadsError.as_str()).increment(1);
    }

    pub fn bucket_created() {
        ::metrics::counter!(MetricName::StorageBucketsCreated.as_str()).increment(1);
    }
}

pub mod submissions {
    use super::MetricName;

    pub fn completed(provenance: &'static str) {
        ::metrics::counter!(MetricName::SubmissionsCompleted.as_str(), "provenance" => provenance)
            .increment(1);
    }

    pub fn failed(kind: &'static str) {
        ::metrics::counter!(MetricName::SubmissionsFailed.as_str(), "kind" => kind).increment(1);
    }
}
