//! Pipeline metrics.
//!
//! Recording goes through the `metrics` facade and is a no-op until a
//! recorder is installed. The service binary installs the Prometheus one.

use std::sync::OnceLock;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

use crate::aggregate::ParseStats;

// ============================================================================
// Metric Names
// ============================================================================

/// Data rows read from payloads.
pub const ROWS_TOTAL: &str = "firelog_rows_total";

/// Rows with a tracked severity.
pub const ROWS_TRACKED_TOTAL: &str = "firelog_rows_tracked_total";

/// Malformed rows skipped under the lenient policy.
pub const ROWS_SKIPPED_TOTAL: &str = "firelog_rows_skipped_total";

/// Hourly aggregates written to the store.
pub const AGGREGATES_WRITTEN_TOTAL: &str = "firelog_aggregates_written_total";

/// Day exports that failed after a successful commit.
pub const EXPORT_FAILURES_TOTAL: &str = "firelog_export_failures_total";

/// Invocations by outcome (`success` or the failing stage).
pub const INVOCATIONS_TOTAL: &str = "firelog_invocations_total";

/// Wall time of one invocation in seconds.
pub const INVOCATION_DURATION: &str = "firelog_invocation_duration_seconds";

// ============================================================================
// Prometheus Recorder
// ============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Installs the global Prometheus recorder and registers metric descriptions.
///
/// Calls after the first successful one return the existing handle.
///
/// # Errors
///
/// Returns an error if another recorder is already installed.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;

    describe_counter!(ROWS_TOTAL, "Data rows read from payloads");
    describe_counter!(ROWS_TRACKED_TOTAL, "Rows with a tracked severity");
    describe_counter!(ROWS_SKIPPED_TOTAL, "Malformed rows skipped");
    describe_counter!(AGGREGATES_WRITTEN_TOTAL, "Hourly aggregates written");
    describe_counter!(EXPORT_FAILURES_TOTAL, "Day exports that failed");
    describe_counter!(INVOCATIONS_TOTAL, "Pipeline invocations by outcome");
    describe_histogram!(INVOCATION_DURATION, "Duration of pipeline invocations in seconds");

    tracing::info!("Prometheus metrics recorder initialized");
    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle).clone())
}

/// Returns the global Prometheus handle, if initialized.
#[must_use]
pub fn prometheus_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// ============================================================================
// Metric Recording
// ============================================================================

/// Records row counters for one payload.
pub fn record_parse(stats: &ParseStats) {
    counter!(ROWS_TOTAL).increment(stats.total_rows);
    counter!(ROWS_TRACKED_TOTAL).increment(stats.tracked_rows);
    if stats.skipped_rows > 0 {
        counter!(ROWS_SKIPPED_TOTAL).increment(stats.skipped_rows);
    }
}

/// Records committed aggregates.
pub fn record_aggregates_written(count: usize) {
    counter!(AGGREGATES_WRITTEN_TOTAL).increment(count as u64);
}

/// Records a soft-failed export.
pub fn record_export_failure() {
    counter!(EXPORT_FAILURES_TOTAL).increment(1);
}

/// Records one finished invocation.
pub fn record_invocation(outcome: &'static str, duration_secs: f64) {
    counter!(INVOCATIONS_TOTAL, "outcome" => outcome).increment(1);
    histogram!(INVOCATION_DURATION, "outcome" => outcome).record(duration_secs);
}
