//! Prometheus metrics exposition
//!
//! Registers and exposes the poller's metrics:
//!
//! - `poller_fetch_requests_total` (counter): label `outcome` (ok/error)
//! - `poller_fetch_duration_seconds` (histogram): label `outcome`
//! - `poller_videos_ingested_total` (counter)
//! - `poller_keys_exhausted_total` (counter)

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and return a handle for rendering metrics.
///
/// Configures `poller_fetch_duration_seconds` with explicit buckets so it
/// renders as a Prometheus histogram (with `_bucket` lines for
/// `histogram_quantile()` queries) rather than the default summary. The
/// range covers a fast cached response up to a request riding the full
/// configurable timeout.
pub fn install_recorder() -> PrometheusHandle {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            metrics_exporter_prometheus::Matcher::Full(
                "poller_fetch_duration_seconds".to_string(),
            ),
            &[0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0],
        )
        .expect("failed to set histogram buckets")
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}

/// Record one completed page fetch with its outcome.
pub fn record_fetch(outcome: &str, duration_secs: f64) {
    let outcome = outcome.to_string();
    metrics::counter!("poller_fetch_requests_total", "outcome" => outcome.clone()).increment(1);
    metrics::histogram!("poller_fetch_duration_seconds", "outcome" => outcome)
        .record(duration_secs);
}

/// Record how many videos one poll cycle stored.
pub fn record_videos_ingested(count: u64) {
    metrics::counter!("poller_videos_ingested_total").increment(count);
}

/// Record one key being parked for quota exhaustion.
pub fn record_key_exhausted() {
    metrics::counter!("poller_keys_exhausted_total").increment(1);
}
