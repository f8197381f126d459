//! RapidAPI-style realtime event search adapter. The upstream search is
//! coarse (one free-text query string), so a request without a keyword is
//! widened into several category-synonym queries, deduplicated and issued
//! sequentially with a small delay between them.

use chrono::{DateTime, Timelike, Utc};
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::apis::price::{extract_price, PriceHints};
use crate::apis::{classify, format_event_date, format_time_range, parse_event_datetime, EventProvider};
use crate::common::constants::{NO_DESCRIPTION, REALTIME_EVENTS_API, REALTIME_EVENTS_CONFIDENCE, VENUE_TBA};
use crate::common::error::{AggregatorError, Result};
use crate::common::types::{
    Coordinates, LocationQuery, NormalizedEvent, Organizer, SearchRequest, SourceMetadata,
    SourcedEvent, TicketLink, stable_event_id,
};
use crate::config::ProviderConfig;
use crate::infra::http::HttpFetcher;
use crate::infra::rate_limit::RateLimiter;
use crate::observability::metrics;

const CATEGORY_SYNONYMS: &[&str] = &[
    "events",
    "concerts",
    "sports games",
    "art shows",
    "food festivals",
];

#[derive(Debug, Default, Deserialize)]
struct RawRealtimeVenue {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    full_address: Option<String>,
    #[serde(default)]
    latitude: Option<f64>,
    #[serde(default)]
    longitude: Option<f64>,
    #[serde(default)]
    subtype: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawLink {
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    link: Option<String>,
}

/// Raw item shape for the realtime events search API. Parsed per item so a
/// malformed entry is skipped without dropping the batch.
#[derive(Debug, Deserialize)]
struct RawRealtimeEvent {
    event_id: String,
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    start_time: Option<String>,
    #[serde(default)]
    end_time: Option<String>,
    #[serde(default)]
    thumbnail: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    is_free: Option<bool>,
    #[serde(default)]
    min_price: Option<f64>,
    #[serde(default)]
    max_price: Option<f64>,
    #[serde(default)]
    venue: Option<RawRealtimeVenue>,
    #[serde(default)]
    ticket_links: Vec<RawLink>,
    #[serde(default)]
    info_links: Vec<RawLink>,
}

pub struct RealtimeEventsProvider {
    config: ProviderConfig,
    fetcher: Arc<HttpFetcher>,
    limiter: RateLimiter,
    api_key: Option<String>,
}

impl RealtimeEventsProvider {
    pub fn new(config: ProviderConfig, api_key: Option<String>, fetcher: Arc<HttpFetcher>) -> Self {
        let limiter = RateLimiter::per_minute(config.requests_per_minute);
        Self {
            config,
            fetcher,
            limiter,
            api_key,
        }
    }

    pub fn from_env(config: ProviderConfig, fetcher: Arc<HttpFetcher>) -> Self {
        let api_key = std::env::var("REALTIME_EVENTS_API_KEY").ok();
        Self::new(config, api_key, fetcher)
    }

    /// One query per keyword or category synonym, deduplicated before
    /// dispatch.
    fn build_queries(request: &SearchRequest, origin: Coordinates) -> Vec<String> {
        let place = match &request.location {
            Some(LocationQuery::Text(text)) => text.trim().to_string(),
            _ => format!("{:.4},{:.4}", origin.lat, origin.lng),
        };

        let subjects: Vec<String> = match &request.keyword {
            Some(keyword) if !keyword.trim().is_empty() => vec![keyword.trim().to_string()],
            _ => CATEGORY_SYNONYMS.iter().map(|s| s.to_string()).collect(),
        };

        let mut seen = HashSet::new();
        let mut queries = Vec::new();
        for subject in subjects {
            let query = format!("{} in {}", subject, place);
            if seen.insert(query.to_lowercase()) {
                queries.push(query);
            }
        }
        queries
    }

    fn parse_response(&self, body: &serde_json::Value, now: DateTime<Utc>) -> Vec<SourcedEvent> {
        let items = match body.get("data").and_then(|d| d.as_array()) {
            Some(items) => items,
            None => {
                warn!(provider = REALTIME_EVENTS_API, "response missing data array");
                return Vec::new();
            }
        };

        let mut events = Vec::new();
        for item in items {
            match serde_json::from_value::<RawRealtimeEvent>(item.clone()) {
                Ok(raw) => {
                    if let Some(event) = self.map_event(raw, now) {
                        events.push(event);
                    }
                }
                Err(e) => {
                    metrics::providers::item_skipped(REALTIME_EVENTS_API);
                    warn!(provider = REALTIME_EVENTS_API, error = %e, "skipping malformed item");
                }
            }
        }
        events
    }

    fn map_event(&self, raw: RawRealtimeEvent, now: DateTime<Utc>) -> Option<SourcedEvent> {
        if raw.name.trim().is_empty() {
            metrics::providers::item_skipped(REALTIME_EVENTS_API);
            return None;
        }
        // An event with no parseable start is not listable
        let (local_start, start_utc) = raw
            .start_time
            .as_deref()
            .and_then(parse_event_datetime)
            .or_else(|| {
                metrics::providers::item_skipped(REALTIME_EVENTS_API);
                debug!(provider = REALTIME_EVENTS_API, event = %raw.name, "no start time, skipping");
                None
            })?;
        let end = raw.end_time.as_deref().and_then(parse_event_datetime);

        let venue = raw.venue.unwrap_or_default();
        let location = venue
            .name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| VENUE_TBA.to_string());
        let coordinates = match (venue.latitude, venue.longitude) {
            (Some(lat), Some(lng)) => Coordinates::new(lat, lng),
            _ => None,
        };

        let description = raw
            .description
            .clone()
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| NO_DESCRIPTION.to_string());

        let category = classify::classify(
            &raw.tags,
            venue.subtype.as_deref(),
            &raw.name,
            &description,
            Some(local_start.hour()),
        );

        let purchasable: Vec<&RawLink> = raw
            .ticket_links
            .iter()
            .filter(|l| l.link.is_some())
            .collect();
        let price = extract_price(&PriceHints {
            is_free: raw.is_free.unwrap_or(false),
            flat_min: raw.min_price,
            flat_max: raw.max_price,
            ticket_urls: purchasable
                .iter()
                .filter_map(|l| l.link.clone())
                .collect(),
            has_purchasable_link: !purchasable.is_empty(),
            info_source: raw.info_links.first().and_then(|l| l.source.clone()),
            text: format!("{} {}", raw.name, description),
            venue_tier: venue.subtype.clone().or_else(|| venue.name.clone()),
            ..Default::default()
        });

        // Purchasable links first, informational links as the fallback
        let mut ticket_links: Vec<TicketLink> = purchasable
            .iter()
            .filter_map(|l| {
                Some(TicketLink {
                    source: l.source.clone().unwrap_or_else(|| REALTIME_EVENTS_API.to_string()),
                    link: l.link.clone()?,
                })
            })
            .collect();
        if ticket_links.is_empty() {
            ticket_links.extend(raw.info_links.iter().filter_map(|l| {
                Some(TicketLink {
                    source: l.source.clone().unwrap_or_else(|| REALTIME_EVENTS_API.to_string()),
                    link: l.link.clone()?,
                })
            }));
        }

        let event = NormalizedEvent {
            id: stable_event_id(REALTIME_EVENTS_API, &raw.event_id),
            title: raw.name.clone(),
            description,
            category,
            date: format_event_date(local_start),
            time: format_time_range(local_start, end.map(|(naive, _)| naive)),
            location: location.clone(),
            address: venue.full_address.clone().unwrap_or_default(),
            coordinates,
            price,
            organizer: Organizer {
                name: location,
                avatar: None,
            },
            attendees: None,
            image_url: raw.thumbnail.clone(),
            ticket_links,
            tags: raw.tags.clone(),
        };

        let mut sourced = SourcedEvent::new(
            event,
            SourceMetadata {
                provider: REALTIME_EVENTS_API.to_string(),
                original_id: raw.event_id,
                confidence: REALTIME_EVENTS_CONFIDENCE,
                last_updated: now,
            },
        );
        sourced.start_at = Some(start_utc);
        sourced.end_at = end.map(|(_, utc)| utc);
        sourced.local_start = Some(local_start);
        Some(sourced)
    }
}

#[async_trait::async_trait]
impl EventProvider for RealtimeEventsProvider {
    fn provider_name(&self) -> &'static str {
        REALTIME_EVENTS_API
    }

    fn confidence(&self) -> f64 {
        REALTIME_EVENTS_CONFIDENCE
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    #[instrument(skip(self, request))]
    async fn search(
        &self,
        request: &SearchRequest,
        origin: Coordinates,
    ) -> Result<Vec<SourcedEvent>> {
        let key = self.api_key.as_deref().ok_or_else(|| {
            AggregatorError::Config("REALTIME_EVENTS_API_KEY not set".to_string())
        })?;
        let host = reqwest::Url::parse(&self.config.base_url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_string()))
            .ok_or_else(|| AggregatorError::Config("invalid realtime_events base_url".to_string()))?;

        let queries = Self::build_queries(request, origin);
        let url = format!("{}/search-events", self.config.base_url.trim_end_matches('/'));
        let now = Utc::now();

        let mut events: Vec<SourcedEvent> = Vec::new();
        let mut seen_ids: HashSet<String> = HashSet::new();

        for (index, query) in queries.iter().enumerate() {
            if index > 0 {
                // Deliberate sequential throttle between widened queries
                tokio::time::sleep(Duration::from_millis(self.config.delay_ms)).await;
            }
            if !self.limiter.try_acquire().await {
                metrics::providers::rate_limited(REALTIME_EVENTS_API);
                if index == 0 {
                    return Err(AggregatorError::RateLimited {
                        provider: REALTIME_EVENTS_API,
                    });
                }
                warn!(provider = REALTIME_EVENTS_API, "quota exhausted mid-expansion, stopping");
                break;
            }

            let body = match self
                .fetcher
                .get_json(
                    &url,
                    &[("query", query.clone()), ("start", "0".to_string())],
                    &[("X-RapidAPI-Key", key), ("X-RapidAPI-Host", &host)],
                )
                .await
            {
                Ok(body) => body,
                Err(e) => {
                    warn!(provider = REALTIME_EVENTS_API, query = %query, error = %e, "query failed");
                    continue;
                }
            };

            for event in self.parse_response(&body, now) {
                if seen_ids.insert(event.source.original_id.clone()) {
                    events.push(event);
                }
            }
        }

        metrics::providers::events_fetched(REALTIME_EVENTS_API, events.len() as u64);
        info!(
            provider = REALTIME_EVENTS_API,
            count = events.len(),
            queries = queries.len(),
            "fetched events"
        );
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn provider() -> RealtimeEventsProvider {
        let config = ProviderConfig {
            enabled: true,
            base_url: "https://real-time-events-search.p.rapidapi.com".to_string(),
            timeout_seconds: 5,
            delay_ms: 0,
            requests_per_minute: 10,
        };
        let fetcher = Arc::new(HttpFetcher::new(Duration::from_secs(5)).unwrap());
        RealtimeEventsProvider::new(config, Some("test-key".to_string()), fetcher)
    }

    fn sample_body() -> serde_json::Value {
        json!({
            "data": [
                {
                    "event_id": "rt-100",
                    "name": "Jazz Night Downtown",
                    "description": "An evening of live jazz.",
                    "start_time": "2023-07-28T19:00:00",
                    "end_time": "2023-07-28T22:00:00",
                    "tags": ["jazz", "music"],
                    "venue": {
                        "name": "Blue Note",
                        "full_address": "131 W 3rd St, Chicago, IL",
                        "latitude": 41.88,
                        "longitude": -87.63,
                        "subtype": "jazz_club"
                    },
                    "ticket_links": [
                        {"source": "ticket_shop", "link": "https://shop.example.com/e/100"}
                    ]
                },
                {
                    "event_id": "rt-101",
                    "name": "Mystery Meetup",
                    "start_time": "not a date"
                },
                {
                    "event_id": 42,
                    "name": "Malformed: id is a number"
                }
            ]
        })
    }

    #[test]
    fn parse_response_skips_malformed_and_dateless_items() {
        let provider = provider();
        let events = provider.parse_response(&sample_body(), Utc::now());
        assert_eq!(events.len(), 1);

        let sourced = &events[0];
        assert_eq!(sourced.event.title, "Jazz Night Downtown");
        assert_eq!(sourced.event.date, "July 28, 2023");
        assert_eq!(sourced.event.time, "7:00 PM - 10:00 PM");
        assert_eq!(sourced.event.price, "Tickets Available");
        assert_eq!(sourced.source.provider, REALTIME_EVENTS_API);
        assert!(sourced.event.coordinates.is_some());
    }

    #[test]
    fn missing_fields_fall_back_to_sentinels() {
        let provider = provider();
        let body = json!({
            "data": [{
                "event_id": "rt-200",
                "name": "Pop Up Show",
                "start_time": "2023-08-01T18:00:00"
            }]
        });
        let events = provider.parse_response(&body, Utc::now());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event.location, VENUE_TBA);
        assert_eq!(events[0].event.description, NO_DESCRIPTION);
        assert_eq!(events[0].event.price, "Price TBA");
        assert!(events[0].event.ticket_links.is_empty());
    }

    #[test]
    fn queries_widen_without_keyword_and_dedupe() {
        let origin = Coordinates { lat: 41.88, lng: -87.63 };
        let request = SearchRequest {
            location: Some(LocationQuery::Text("Chicago".to_string())),
            ..Default::default()
        };
        let queries = RealtimeEventsProvider::build_queries(&request, origin);
        assert_eq!(queries.len(), CATEGORY_SYNONYMS.len());
        assert!(queries.contains(&"concerts in Chicago".to_string()));

        let keyword_request = SearchRequest {
            keyword: Some("jazz".to_string()),
            location: Some(LocationQuery::Text("Chicago".to_string())),
            ..Default::default()
        };
        let queries = RealtimeEventsProvider::build_queries(&keyword_request, origin);
        assert_eq!(queries, vec!["jazz in Chicago".to_string()]);
    }

    #[test]
    fn stable_ids_survive_repeated_parses() {
        let provider = provider();
        let a = provider.parse_response(&sample_body(), Utc::now());
        let b = provider.parse_response(&sample_body(), Utc::now());
        assert_eq!(a[0].event.id, b[0].event.id);
    }
}
