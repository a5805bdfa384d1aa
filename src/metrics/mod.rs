//! Metrics for the aggregation pipeline
//!
//! Each phase owns a small submodule of recording functions; metric names
//! live in `MetricName` so there are no magic strings at call sites.

pub mod aggregator;
pub mod sources;

use std::fmt;
use std::sync::{Once, OnceLock};
use tracing::{info, warn};

static INIT: Once = Once::new();
static HANDLE: OnceLock<metrics_exporter_prometheus::PrometheusHandle> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Sources metrics
    SourcesRequestsSuccess,
    SourcesRequestsError,
    SourcesRequestDuration,
    SourcesPayloadBytes,
    SourcesEventsEmitted,
    SourcesFailures,
    SourcesTimeouts,

    // Aggregator metrics
    AggregatorRuns,
    AggregatorEvents,
    AggregatorDuration,
    AggregatorCacheHits,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::SourcesRequestsSuccess => "hazard_sources_requests_success_total",
            MetricName::SourcesRequestsError => "hazard_sources_requests_error_total",
            MetricName::SourcesRequestDuration => "hazard_sources_request_duration_seconds",
            MetricName::SourcesPayloadBytes => "hazard_sources_payload_bytes",
            MetricName::SourcesEventsEmitted => "hazard_sources_events_emitted_total",
            MetricName::SourcesFailures => "hazard_sources_failures_total",
            MetricName::SourcesTimeouts => "hazard_sources_timeouts_total",

            MetricName::AggregatorRuns => "hazard_aggregator_runs_total",
            MetricName::AggregatorEvents => "hazard_aggregator_events",
            MetricName::AggregatorDuration => "hazard_aggregator_duration_seconds",
            MetricName::AggregatorCacheHits => "hazard_aggregator_cache_hits_total",
        }
    }

    pub fn all_metrics() -> impl Iterator<Item = MetricName> {
        use MetricName::*;
        [
            SourcesRequestsSuccess,
            SourcesRequestsError,
            SourcesRequestDuration,
            SourcesPayloadBytes,
            SourcesEventsEmitted,
            SourcesFailures,
            SourcesTimeouts,
            AggregatorRuns,
            AggregatorEvents,
            AggregatorDuration,
            AggregatorCacheHits,
        ]
        .into_iter()
    }

    fn is_histogram(&self) -> bool {
        let name = self.as_str();
        name.ends_with("_seconds") || name.ends_with("_bytes") || name.ends_with("_events")
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Install the Prometheus recorder once and keep its handle for `/metrics`.
///
/// Idempotent. Recording functions are no-ops until this runs, which keeps
/// tests free of global setup.
pub fn init_metrics() {
    INIT.call_once(|| {
        match metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder() {
            Ok(handle) => {
                if HANDLE.set(handle).is_err() {
                    warn!("Prometheus handle was already stored");
                }
                register_all_metrics();
                info!("Prometheus recorder installed");
            }
            Err(e) => {
                warn!("Failed to install Prometheus recorder: {}", e);
            }
        }
    });
}

/// Text exposition of every recorded metric, if the recorder is installed.
pub fn render() -> Option<String> {
    HANDLE.get().map(|handle| handle.render())
}

// Pre-register so every series shows up in /metrics before first use
fn register_all_metrics() {
    for name in MetricName::all_metrics() {
        if name.is_histogram() {
            let _ = ::metrics::histogram!(name.as_str());
        } else {
            let _ = ::metrics::counter!(name.as_str());
        }
    }
}
