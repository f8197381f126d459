//! Metrics for the aggregation pipeline, following Prometheus naming
//! conventions. Recording is fire-and-forget; with no exporter installed
//! every call is a no-op.

use std::fmt;

/// All metric names used in the system, to avoid magic strings at call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Aggregation
    SearchesStarted,
    SearchesFailed,
    SearchDuration,
    EventsReturned,

    // Provider adapters
    ProviderRequestsSuccess,
    ProviderRequestsError,
    ProviderRequestDuration,
    ProviderEventsFetched,
    ProviderItemsSkipped,
    ProviderRateLimited,

    // Geocoding
    GeocodeCacheHits,
    GeocodeCacheMisses,
    GeocodeFailures,

    // Deduplication
    DedupCandidates,
    DedupMerged,

    // Persistence sink
    SinkRecordsWritten,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::SearchesStarted => "event_scout_searches_total",
            MetricName::SearchesFailed => "event_scout_searches_failed_total",
            MetricName::SearchDuration => "event_scout_search_duration_seconds",
            MetricName::EventsReturned => "event_scout_events_returned",
            MetricName::ProviderRequestsSuccess => "event_scout_provider_requests_success_total",
            MetricName::ProviderRequestsError => "event_scout_provider_requests_error_total",
            MetricName::ProviderRequestDuration => "event_scout_provider_request_duration_seconds",
            MetricName::ProviderEventsFetched => "event_scout_provider_events_fetched_total",
            MetricName::ProviderItemsSkipped => "event_scout_provider_items_skipped_total",
            MetricName::ProviderRateLimited => "event_scout_provider_rate_limited_total",
            MetricName::GeocodeCacheHits => "event_scout_geocode_cache_hits_total",
            MetricName::GeocodeCacheMisses => "event_scout_geocode_cache_misses_total",
            MetricName::GeocodeFailures => "event_scout_geocode_failures_total",
            MetricName::DedupCandidates => "event_scout_dedup_candidates_total",
            MetricName::DedupMerged => "event_scout_dedup_merged_total",
            MetricName::SinkRecordsWritten => "event_scout_sink_records_written_total",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Install the Prometheus exporter on the given port. Call once at startup
/// when metrics are enabled in config.
pub fn init_prometheus(port: u16) -> anyhow::Result<()> {
    use metrics_exporter_prometheus::PrometheusBuilder;
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()?;
    Ok(())
}

pub mod aggregation {
    use super::MetricName;

    pub fn search_started() {
        ::metrics::counter!(MetricName::SearchesStarted.as_str()).increment(1);
    }

    pub fn search_failed() {
        ::metrics::counter!(MetricName::SearchesFailed.as_str()).increment(1);
    }

    pub fn search_duration(secs: f64) {
        ::metrics::histogram!(MetricName::SearchDuration.as_str()).record(secs);
    }

    pub fn events_returned(count: usize) {
        ::metrics::histogram!(MetricName::EventsReturned.as_str()).record(count as f64);
    }
}

pub mod providers {
    use super::MetricName;

    pub fn request_success() {
        ::metrics::counter!(MetricName::ProviderRequestsSuccess.as_str()).increment(1);
    }

    pub fn request_error() {
        ::metrics::counter!(MetricName::ProviderRequestsError.as_str()).increment(1);
    }

    pub fn request_duration(secs: f64) {
        ::metrics::histogram!(MetricName::ProviderRequestDuration.as_str()).record(secs);
    }

    pub fn events_fetched(provider: &str, count: u64) {
        ::metrics::counter!(
            MetricName::ProviderEventsFetched.as_str(),
            "provider" => provider.to_string()
        )
        .increment(count);
    }

    pub fn item_skipped(provider: &str) {
        ::metrics::counter!(
            MetricName::ProviderItemsSkipped.as_str(),
            "provider" => provider.to_string()
        )
        .increment(1);
    }

    pub fn rate_limited(provider: &str) {
        ::metrics::counter!(
            MetricName::ProviderRateLimited.as_str(),
            "provider" => provider.to_string()
        )
        .increment(1);
    }
}

pub mod geocoding {
    use super::MetricName;

    pub fn cache_hit() {
        ::metrics::counter!(MetricName::GeocodeCacheHits.as_str()).increment(1);
    }

    pub fn cache_miss() {
        ::metrics::counter!(MetricName::GeocodeCacheMisses.as_str()).increment(1);
    }

    pub fn failure() {
        ::metrics::counter!(MetricName::GeocodeFailures.as_str()).increment(1);
    }
}

pub mod dedup {
    use super::MetricName;

    pub fn candidates(count: u64) {
        ::metrics::counter!(MetricName::DedupCandidates.as_str()).increment(count);
    }

    pub fn merged(count: u64) {
        ::metrics::counter!(MetricName::DedupMerged.as_str()).increment(count);
    }
}

pub mod sink {
    use super::MetricName;

    pub fn records_written(count: u64) {
        ::metrics::counter!(MetricName::SinkRecordsWritten.as_str()).increment(count);
    }
}
