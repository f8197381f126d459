//! Aggregation orchestrator: the top-level entry point that fans a search
//! out to every configured provider, merges and ranks the results, and
//! always returns a well-formed envelope.

use chrono::{Timelike, Utc};
use futures::future::join_all;
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};

use crate::apis::price::{parse_display_amounts, price_is_free};
use crate::apis::EventProvider;
use crate::common::error::AggregatorError;
use crate::common::types::{
    PricePreference, ResultEnvelope, SearchRequest, SortKey, SourcedEvent, TimePreference,
};
use crate::geocoding::GeocodingResolver;
use crate::observability::metrics;
use crate::pipeline::dedup::DedupEngine;
use crate::pipeline::scoring;
use crate::pipeline::utils::haversine_miles;

/// The merged, filtered, sorted result set before pagination and metadata
/// stripping.
struct AggregationOutcome {
    events: Vec<SourcedEvent>,
    sources: Vec<String>,
}

pub struct Aggregator {
    geocoder: Arc<GeocodingResolver>,
    providers: Vec<Arc<dyn EventProvider>>,
    dedup: DedupEngine,
}

impl Aggregator {
    pub fn new(geocoder: Arc<GeocodingResolver>, providers: Vec<Arc<dyn EventProvider>>) -> Self {
        Self {
            geocoder,
            providers,
            dedup: DedupEngine::new(),
        }
    }

    /// Run the full pipeline. Never panics and never propagates a provider
    /// error; failures surface only through the envelope's `error` field.
    #[instrument(skip(self, request))]
    pub async fn aggregate(&self, request: &SearchRequest) -> ResultEnvelope {
        let started = Instant::now();
        metrics::aggregation::search_started();

        let outcome = match self.run(request).await {
            Ok(outcome) => outcome,
            Err(message) => {
                metrics::aggregation::search_failed();
                warn!(error = %message, "aggregation failed");
                return ResultEnvelope::failure(message);
            }
        };

        let size = request.size.max(1) as usize;
        let page = request.page.max(1);
        let total_count = outcome.events.len();
        let total_pages = ((total_count + size - 1) / size) as u32;

        let page_events: Vec<_> = outcome
            .events
            .into_iter()
            .skip((page as usize - 1) * size)
            .take(size)
            // Internal source metadata stops here
            .map(SourcedEvent::into_event)
            .collect();

        metrics::aggregation::search_duration(started.elapsed().as_secs_f64());
        metrics::aggregation::events_returned(page_events.len());
        info!(
            total = total_count,
            page_size = page_events.len(),
            sources = outcome.sources.len(),
            "aggregation complete"
        );

        ResultEnvelope {
            events: page_events,
            total_count,
            page: request.page,
            total_pages,
            sources: outcome.sources,
            error: None,
        }
    }

    /// The full merged result set with source metadata intact, for the
    /// offline population tooling. Pagination does not apply.
    pub async fn collect_sourced(
        &self,
        request: &SearchRequest,
    ) -> crate::common::error::Result<Vec<SourcedEvent>> {
        self.run(request)
            .await
            .map(|outcome| outcome.events)
            .map_err(|message| AggregatorError::Provider { message })
    }

    async fn run(&self, request: &SearchRequest) -> Result<AggregationOutcome, String> {
        let origin = match &request.location {
            Some(query) => self.geocoder.resolve(query).await,
            None => None,
        };
        let Some(origin) = origin else {
            return Err("Could not determine a search location".to_string());
        };

        let configured: Vec<&Arc<dyn EventProvider>> = self
            .providers
            .iter()
            .filter(|p| p.is_configured())
            .collect();
        if configured.is_empty() {
            return Err("No event providers are configured".to_string());
        }

        // Fire all adapters, wait for all, never let one failure cancel
        // the others. A failed adapter contributes an empty list.
        let searches = configured.iter().map(|provider| {
            let provider = Arc::clone(provider);
            let request = request.clone();
            async move {
                match provider.search(&request, origin).await {
                    Ok(events) => (provider.provider_name(), events, false),
                    Err(e) => {
                        warn!(
                            provider = provider.provider_name(),
                            error = %e,
                            "provider search failed"
                        );
                        (provider.provider_name(), Vec::new(), true)
                    }
                }
            }
        });
        let outcomes = join_all(searches).await;

        if outcomes.iter().all(|(_, _, failed)| *failed) {
            return Err("All event providers failed".to_string());
        }

        let mut events: Vec<SourcedEvent> =
            outcomes.into_iter().flat_map(|(_, events, _)| events).collect();

        let now = Utc::now();
        for event in &mut events {
            event.distance_miles = event
                .event
                .coordinates
                .map(|coords| haversine_miles(origin, coords));
            event.relevance = scoring::score(event.start_at, event.distance_miles, now);
        }

        let mut deduped = self.dedup.dedupe(events);

        let preferences = request.preferences.as_ref();
        for event in &mut deduped {
            event.relevance =
                scoring::apply_preference_boost(event.relevance, event.event.category, preferences);
        }

        let mut filtered: Vec<SourcedEvent> = deduped
            .into_iter()
            .filter(|event| passes_filters(event, request))
            .collect();
        sort_events(&mut filtered, request.sort);

        let sources: Vec<String> = configured
            .iter()
            .map(|provider| provider.provider_name())
            .filter(|name| filtered.iter().any(|e| e.source.provider == *name))
            .map(|name| name.to_string())
            .collect();

        Ok(AggregationOutcome {
            events: filtered,
            sources,
        })
    }
}

/// Hard excludes: free/paid preference, time-of-day preference, numeric
/// price range, and keyword. Events with unknown price or time are kept;
/// exclusion requires positive evidence.
fn passes_filters(event: &SourcedEvent, request: &SearchRequest) -> bool {
    if let Some(preferences) = &request.preferences {
        match preferences.price_preference {
            PricePreference::Free => {
                if !price_is_free(&event.event.price) {
                    return false;
                }
            }
            PricePreference::Paid => {
                if price_is_free(&event.event.price) {
                    return false;
                }
            }
            PricePreference::Any => {}
        }

        if preferences.time_preference != TimePreference::Any {
            if let Some(local_start) = event.local_start {
                let hour = local_start.hour();
                let matches = match preferences.time_preference {
                    TimePreference::Morning => (5..12).contains(&hour),
                    TimePreference::Afternoon => (12..17).contains(&hour),
                    TimePreference::Evening => hour >= 17,
                    TimePreference::Any => true,
                };
                if !matches {
                    return false;
                }
            }
        }
    }

    if let Some(range) = &request.price_range {
        if let Some((min, max)) = parse_display_amounts(&event.event.price) {
            if max < range.min || min > range.max {
                return false;
            }
        }
    }

    if let Some(keyword) = request.keyword.as_deref().filter(|k| !k.trim().is_empty()) {
        let needle = keyword.trim().to_lowercase();
        let haystack = format!(
            "{} {} {}",
            event.event.title,
            event.event.description,
            event.event.tags.join(" ")
        )
        .to_lowercase();
        if !haystack.contains(&needle) {
            return false;
        }
    }

    true
}

fn compare_distance(a: &SourcedEvent, b: &SourcedEvent) -> Ordering {
    match (a.distance_miles, b.distance_miles) {
        (Some(da), Some(db)) => da.partial_cmp(&db).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn compare_relevance(a: &SourcedEvent, b: &SourcedEvent) -> Ordering {
    b.relevance
        .partial_cmp(&a.relevance)
        .unwrap_or(Ordering::Equal)
}

/// Relevance sort breaks ties by ascending distance, then by descending
/// source confidence.
fn sort_events(events: &mut [SourcedEvent], sort: SortKey) {
    match sort {
        SortKey::Relevance => events.sort_by(|a, b| {
            compare_relevance(a, b)
                .then_with(|| compare_distance(a, b))
                .then_with(|| {
                    b.source
                        .confidence
                        .partial_cmp(&a.source.confidence)
                        .unwrap_or(Ordering::Equal)
                })
        }),
        SortKey::Distance => {
            events.sort_by(|a, b| compare_distance(a, b).then_with(|| compare_relevance(a, b)))
        }
        SortKey::Date => events.sort_by(|a, b| match (a.start_at, b.start_at) {
            (Some(sa), Some(sb)) => sa.cmp(&sb).then_with(|| compare_relevance(a, b)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => compare_relevance(a, b),
        }),
    }
}
