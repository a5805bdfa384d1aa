//! Upstream request and adapter outcome metrics

use super::MetricName;

pub fn request_success() {
    ::metrics::counter!(MetricName::SourcesRequestsSuccess.as_str()).increment(1);
}

pub fn request_error() {
    ::metrics::counter!(MetricName::SourcesRequestsError.as_str()).increment(1);
}

pub fn request_duration(secs: f64) {
    ::metrics::histogram!(MetricName::SourcesRequestDuration.as_str()).record(secs);
}

pub fn payload_bytes(bytes: usize) {
    ::metrics::histogram!(MetricName::SourcesPayloadBytes.as_str()).record(bytes as f64);
}

pub fn events_emitted(source: &'static str, count: usize) {
    ::metrics::counter!(MetricName::SourcesEventsEmitted.as_str(), "source" => source)
        .increment(count as u64);
}

pub fn failure(source: &'static str) {
    ::metrics::counter!(MetricName::SourcesFailures.as_str(), "source" => source).increment(1);
}

pub fn timeout(source: &'static str) {
    ::metrics::counter!(MetricName::SourcesTimeouts.as_str(), "source" => source).increment(1);
}
