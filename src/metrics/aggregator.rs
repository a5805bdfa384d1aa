use super::MetricName;

pub fn run_completed(events: usize, duration_secs: f64) {
    ::metrics::counter!(MetricName::AggregatorRuns.as_str()).increment(1);
    ::metrics::histogram!(MetricName::AggregatorEvents.as_str()).record(events as f64);
    ::metrics::histogram!(MetricName::AggregatorDuration.as_str()).record(duration_secs);
}

pub fn cache_hit() {
    ::metrics::counter!(MetricName::AggregatorCacheHits.as_str()).increment(1);
}
