//! Ticketmaster Discovery API adapter. The highest-trust source: structured
//! price ranges, venue geometry, and purchasable ticket URLs.

use chrono::{DateTime, Timelike, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::apis::price::{extract_price, PriceHints};
use crate::apis::{classify, format_event_date, format_time_range, parse_event_datetime, EventProvider};
use crate::common::constants::{NO_DESCRIPTION, TICKETMASTER_API, TICKETMASTER_CONFIDENCE, VENUE_TBA};
use crate::common::error::{AggregatorError, Result};
use crate::common::types::{
    Coordinates, NormalizedEvent, Organizer, SearchRequest, SourceMetadata, SourcedEvent,
    TicketLink, stable_event_id,
};
use crate::config::ProviderConfig;
use crate::infra::http::HttpFetcher;
use crate::infra::rate_limit::RateLimiter;
use crate::observability::metrics;

#[derive(Debug, Deserialize)]
struct RawTmResponse {
    #[serde(rename = "_embedded")]
    embedded: Option<RawTmEmbedded>,
}

#[derive(Debug, Deserialize)]
struct RawTmEmbedded {
    #[serde(default)]
    events: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawTmEvent {
    id: String,
    name: String,
    #[serde(default)]
    info: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    images: Vec<RawTmImage>,
    dates: Option<RawTmDates>,
    #[serde(default, rename = "priceRanges")]
    price_ranges: Vec<RawTmPriceRange>,
    #[serde(default)]
    classifications: Vec<RawTmClassification>,
    #[serde(rename = "_embedded")]
    embedded: Option<RawTmEventEmbedded>,
}

#[derive(Debug, Deserialize)]
struct RawTmImage {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawTmDates {
    start: Option<RawTmStart>,
}

#[derive(Debug, Deserialize)]
struct RawTmStart {
    #[serde(rename = "dateTime")]
    date_time: Option<String>,
    #[serde(rename = "localDate")]
    local_date: Option<String>,
    #[serde(rename = "localTime")]
    local_time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawTmPriceRange {
    min: Option<f64>,
    max: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawTmClassification {
    segment: Option<RawTmNamed>,
    genre: Option<RawTmNamed>,
}

#[derive(Debug, Deserialize)]
struct RawTmNamed {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawTmEventEmbedded {
    #[serde(default)]
    venues: Vec<RawTmVenue>,
}

#[derive(Debug, Default, Deserialize)]
struct RawTmVenue {
    name: Option<String>,
    address: Option<RawTmAddress>,
    city: Option<RawTmNamed>,
    state: Option<RawTmState>,
    location: Option<RawTmLocation>,
}

#[derive(Debug, Deserialize)]
struct RawTmAddress {
    line1: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawTmState {
    #[serde(rename = "stateCode")]
    state_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawTmLocation {
    latitude: Option<String>,
    longitude: Option<String>,
}

pub struct TicketmasterProvider {
    config: ProviderConfig,
    fetcher: Arc<HttpFetcher>,
    limiter: RateLimiter,
    api_key: Option<String>,
}

impl TicketmasterProvider {
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
        let api_key = std::env::var("TICKETMASTER_API_KEY").ok();
        Self::new(config, api_key, fetcher)
    }

    fn parse_response(&self, body: &serde_json::Value, now: DateTime<Utc>) -> Vec<SourcedEvent> {
        let response: RawTmResponse = match serde_json::from_value(body.clone()) {
            Ok(response) => response,
            Err(e) => {
                warn!(provider = TICKETMASTER_API, error = %e, "unexpected response schema");
                return Vec::new();
            }
        };
        let items = response.embedded.map(|e| e.events).unwrap_or_default();

        let mut events = Vec::new();
        for item in items {
            match serde_json::from_value::<RawTmEvent>(item) {
                Ok(raw) => {
                    if let Some(event) = self.map_event(raw, now) {
                        events.push(event);
                    }
                }
                Err(e) => {
                    metrics::providers::item_skipped(TICKETMASTER_API);
                    warn!(provider = TICKETMASTER_API, error = %e, "skipping malformed item");
                }
            }
        }
        events
    }

    fn start_timestamp(dates: Option<&RawTmDates>) -> Option<String> {
        let start = dates?.start.as_ref()?;
        if let Some(dt) = &start.date_time {
            return Some(dt.clone());
        }
        let date = start.local_date.as_ref()?;
        match &start.local_time {
            Some(time) => Some(format!("{}T{}", date, time)),
            None => Some(date.clone()),
        }
    }

    fn map_event(&self, raw: RawTmEvent, now: DateTime<Utc>) -> Option<SourcedEvent> {
        let (local_start, start_utc) = Self::start_timestamp(raw.dates.as_ref())
            .as_deref()
            .and_then(parse_event_datetime)?;

        let empty_venue = RawTmVenue::default();
        let venue = raw
            .embedded
            .as_ref()
            .and_then(|e| e.venues.first())
            .unwrap_or(&empty_venue);

        let location = venue
            .name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| VENUE_TBA.to_string());
        let address = {
            let mut parts: Vec<String> = Vec::new();
            if let Some(line1) = venue.address.as_ref().and_then(|a| a.line1.clone()) {
                parts.push(line1);
            }
            if let Some(city) = venue.city.as_ref().and_then(|c| c.name.clone()) {
                parts.push(city);
            }
            if let Some(state) = venue.state.as_ref().and_then(|s| s.state_code.clone()) {
                parts.push(state);
            }
            parts.join(", ")
        };
        let coordinates = venue.location.as_ref().and_then(|l| {
            let lat: f64 = l.latitude.as_deref()?.parse().ok()?;
            let lng: f64 = l.longitude.as_deref()?.parse().ok()?;
            Coordinates::new(lat, lng)
        });

        let description = raw
            .info
            .clone()
            .or_else(|| raw.description.clone())
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| NO_DESCRIPTION.to_string());

        let tags: Vec<String> = raw
            .classifications
            .iter()
            .flat_map(|c| {
                [
                    c.segment.as_ref().and_then(|s| s.name.clone()),
                    c.genre.as_ref().and_then(|g| g.name.clone()),
                ]
            })
            .flatten()
            .map(|t| t.to_lowercase())
            .collect();

        let category = classify::classify(
            &tags,
            None,
            &raw.name,
            &description,
            Some(local_start.hour()),
        );

        let structured_min = raw
            .price_ranges
            .iter()
            .filter_map(|r| r.min)
            .fold(None::<f64>, |acc, v| Some(acc.map_or(v, |a| a.min(v))));
        let structured_max = raw
            .price_ranges
            .iter()
            .filter_map(|r| r.max)
            .fold(None::<f64>, |acc, v| Some(acc.map_or(v, |a| a.max(v))));

        let price = extract_price(&PriceHints {
            structured_min,
            structured_max,
            has_purchasable_link: raw.url.is_some(),
            text: format!("{} {}", raw.name, description),
            venue_tier: venue.name.clone(),
            ..Default::default()
        });

        let ticket_links = raw
            .url
            .iter()
            .map(|url| TicketLink {
                source: TICKETMASTER_API.to_string(),
                link: url.clone(),
            })
            .collect();

        let event = NormalizedEvent {
            id: stable_event_id(TICKETMASTER_API, &raw.id),
            title: raw.name.clone(),
            description,
            category,
            date: format_event_date(local_start),
            time: format_time_range(local_start, None),
            location: location.clone(),
            address,
            coordinates,
            price,
            organizer: Organizer {
                name: location,
                avatar: None,
            },
            attendees: None,
            image_url: raw.images.first().and_then(|i| i.url.clone()),
            ticket_links,
            tags,
        };

        let mut sourced = SourcedEvent::new(
            event,
            SourceMetadata {
                provider: TICKETMASTER_API.to_string(),
                original_id: raw.id,
                confidence: TICKETMASTER_CONFIDENCE,
                last_updated: now,
            },
        );
        sourced.start_at = Some(start_utc);
        sourced.local_start = Some(local_start);
        Some(sourced)
    }
}

#[async_trait::async_trait]
impl EventProvider for TicketmasterProvider {
    fn provider_name(&self) -> &'static str {
        TICKETMASTER_API
    }

    fn confidence(&self) -> f64 {
        TICKETMASTER_CONFIDENCE
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
            AggregatorError::Config("TICKETMASTER_API_KEY not set".to_string())
        })?;

        if !self.limiter.try_acquire().await {
            metrics::providers::rate_limited(TICKETMASTER_API);
            return Err(AggregatorError::RateLimited {
                provider: TICKETMASTER_API,
            });
        }

        let url = format!("{}/events.json", self.config.base_url.trim_end_matches('/'));
        let mut query: Vec<(&str, String)> = vec![
            ("apikey", key.to_string()),
            ("latlong", format!("{},{}", origin.lat, origin.lng)),
            ("radius", format!("{}", request.radius_miles.round() as i64)),
            ("unit", "miles".to_string()),
            ("size", "50".to_string()),
            ("sort", "relevance,desc".to_string()),
        ];
        if let Some(keyword) = request.keyword.as_deref().filter(|k| !k.trim().is_empty()) {
            query.push(("keyword", keyword.trim().to_string()));
        }

        let body = self.fetcher.get_json(&url, &query, &[]).await?;
        let events = self.parse_response(&body, Utc::now());

        metrics::providers::events_fetched(TICKETMASTER_API, events.len() as u64);
        info!(provider = TICKETMASTER_API, count = events.len(), "fetched events");
        Ok(events)
    }
}
