// Observability: Prometheus metrics for fetch, storage and submissions.
// Logging setup lives in crate::logging.

pub mod metrics;

pub use metrics::{init, render, MetricName};
