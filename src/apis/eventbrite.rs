//! Eventbrite adapter. Prices come from ticket availability when expanded;
//! event pages are informational links rather than direct ticket purchases,
//! so unpriced events read "See Eventbrite".

use chrono::{DateTime, Timelike, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::apis::price::{extract_price, PriceHints};
use crate::apis::{classify, format_event_date, format_time_range, parse_event_datetime, EventProvider};
use crate::common::constants::{EVENTBRITE_API, EVENTBRITE_CONFIDENCE, NO_DESCRIPTION, VENUE_TBA};
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
struct RawEbText {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawEbTime {
    #[serde(default)]
    local: Option<String>,
    #[serde(default)]
    utc: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawEbLogo {
    url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawEbVenue {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    address: Option<RawEbAddress>,
    #[serde(default)]
    latitude: Option<String>,
    #[serde(default)]
    longitude: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawEbAddress {
    #[serde(default)]
    localized_address_display: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawEbPrice {
    #[serde(default)]
    major_value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawEbTicketAvailability {
    #[serde(default)]
    minimum_ticket_price: Option<RawEbPrice>,
    #[serde(default)]
    maximum_ticket_price: Option<RawEbPrice>,
}

#[derive(Debug, Deserialize)]
struct RawEbEvent {
    id: String,
    name: Option<RawEbText>,
    #[serde(default)]
    description: Option<RawEbText>,
    #[serde(default)]
    url: Option<String>,
    start: Option<RawEbTime>,
    #[serde(default)]
    end: Option<RawEbTime>,
    #[serde(default)]
    is_free: Option<bool>,
    #[serde(default)]
    logo: Option<RawEbLogo>,
    #[serde(default)]
    venue: Option<RawEbVenue>,
    #[serde(default)]
    ticket_availability: Option<RawEbTicketAvailability>,
    #[serde(default)]
    capacity: Option<u32>,
    #[serde(default)]
    tags: Vec<String>,
}

pub struct EventbriteProvider {
    config: ProviderConfig,
    fetcher: Arc<HttpFetcher>,
    limiter: RateLimiter,
    api_token: Option<String>,
}

impl EventbriteProvider {
    pub fn new(config: ProviderConfig, api_token: Option<String>, fetcher: Arc<HttpFetcher>) -> Self {
        let limiter = RateLimiter::per_minute(config.requests_per_minute);
        Self {
            config,
            fetcher,
            limiter,
            api_token,
        }
    }

    pub fn from_env(config: ProviderConfig, fetcher: Arc<HttpFetcher>) -> Self {
        let api_token = std::env::var("EVENTBRITE_API_TOKEN").ok();
        Self::new(config, api_token, fetcher)
    }

    fn parse_response(&self, body: &serde_json::Value, now: DateTime<Utc>) -> Vec<SourcedEvent> {
        let items = match body.get("events").and_then(|e| e.as_array()) {
            Some(items) => items,
            None => {
                warn!(provider = EVENTBRITE_API, "response missing events array");
                return Vec::new();
            }
        };

        let mut events = Vec::new();
        for item in items {
            match serde_json::from_value::<RawEbEvent>(item.clone()) {
                Ok(raw) => {
                    if let Some(event) = self.map_event(raw, now) {
                        events.push(event);
                    }
                }
                Err(e) => {
                    metrics::providers::item_skipped(EVENTBRITE_API);
                    warn!(provider = EVENTBRITE_API, error = %e, "skipping malformed item");
                }
            }
        }
        events
    }

    fn map_event(&self, raw: RawEbEvent, now: DateTime<Utc>) -> Option<SourcedEvent> {
        let title = raw
            .name
            .as_ref()
            .and_then(|n| n.text.clone())
            .filter(|t| !t.trim().is_empty())?;

        let start_raw = raw.start.as_ref()?;
        let (local_start, _) = start_raw
            .local
            .as_deref()
            .or(start_raw.utc.as_deref())
            .and_then(parse_event_datetime)?;
        let start_utc = start_raw
            .utc
            .as_deref()
            .and_then(parse_event_datetime)
            .map(|(_, utc)| utc);
        let local_end = raw
            .end
            .as_ref()
            .and_then(|t| t.local.as_deref().or(t.utc.as_deref()))
            .and_then(parse_event_datetime)
            .map(|(naive, _)| naive);

        let venue = raw.venue.unwrap_or_default();
        let location = venue
            .name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| VENUE_TBA.to_string());
        let coordinates = {
            let lat = venue.latitude.as_deref().and_then(|v| v.parse::<f64>().ok());
            let lng = venue.longitude.as_deref().and_then(|v| v.parse::<f64>().ok());
            match (lat, lng) {
                (Some(lat), Some(lng)) => Coordinates::new(lat, lng),
                _ => None,
            }
        };

        let description = raw
            .description
            .as_ref()
            .and_then(|d| d.text.clone())
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| NO_DESCRIPTION.to_string());

        let category = classify::classify(
            &raw.tags,
            None,
            &title,
            &description,
            Some(local_start.hour()),
        );

        let parse_major = |price: &Option<RawEbPrice>| {
            price
                .as_ref()
                .and_then(|p| p.major_value.as_deref())
                .and_then(|v| v.parse::<f64>().ok())
        };
        let (structured_min, structured_max) = raw
            .ticket_availability
            .as_ref()
            .map(|t| {
                (
                    parse_major(&t.minimum_ticket_price),
                    parse_major(&t.maximum_ticket_price),
                )
            })
            .unwrap_or((None, None));

        let price = extract_price(&PriceHints {
            is_free: raw.is_free.unwrap_or(false),
            structured_min,
            structured_max,
            info_source: Some("Eventbrite".to_string()),
            text: format!("{} {}", title, description),
            ..Default::default()
        });

        // Event pages are informational; kept as the ticket-link fallback
        let ticket_links: Vec<TicketLink> = raw
            .url
            .iter()
            .map(|url| TicketLink {
                source: EVENTBRITE_API.to_string(),
                link: url.clone(),
            })
            .collect();

        let event = NormalizedEvent {
            id: stable_event_id(EVENTBRITE_API, &raw.id),
            title: title.clone(),
            description,
            category,
            date: format_event_date(local_start),
            time: format_time_range(local_start, local_end),
            location: location.clone(),
            address: venue
                .address
                .as_ref()
                .and_then(|a| a.localized_address_display.clone())
                .unwrap_or_default(),
            coordinates,
            price,
            organizer: Organizer {
                name: location,
                avatar: None,
            },
            attendees: raw.capacity,
            image_url: raw.logo.as_ref().and_then(|l| l.url.clone()),
            ticket_links,
            tags: raw.tags.clone(),
        };

        let mut sourced = SourcedEvent::new(
            event,
            SourceMetadata {
                provider: EVENTBRITE_API.to_string(),
                original_id: raw.id,
                confidence: EVENTBRITE_CONFIDENCE,
                last_updated: now,
            },
        );
        sourced.start_at = start_utc;
        sourced.local_start = Some(local_start);
        Some(sourced)
    }
}

#[async_trait::async_trait]
impl EventProvider for EventbriteProvider {
    fn provider_name(&self) -> &'static str {
        EVENTBRITE_API
    }

    fn confidence(&self) -> f64 {
        EVENTBRITE_CONFIDENCE
    }

    fn is_configured(&self) -> bool {
        self.api_token.is_some()
    }

    #[instrument(skip(self, request))]
    async fn search(
        &self,
        request: &SearchRequest,
        origin: Coordinates,
    ) -> Result<Vec<SourcedEvent>> {
        let token = self.api_token.as_deref().ok_or_else(|| {
            AggregatorError::Config("EVENTBRITE_API_TOKEN not set".to_string())
        })?;

        if !self.limiter.try_acquire().await {
            metrics::providers::rate_limited(EVENTBRITE_API);
            return Err(AggregatorError::RateLimited {
                provider: EVENTBRITE_API,
            });
        }

        let url = format!(
            "{}/events/search/",
            self.config.base_url.trim_end_matches('/')
        );
        let mut query: Vec<(&str, String)> = vec![
            ("location.latitude", origin.lat.to_string()),
            ("location.longitude", origin.lng.to_string()),
            (
                "location.within",
                format!("{}mi", request.radius_miles.round() as i64),
            ),
            ("expand", "venue,ticket_availability".to_string()),
        ];
        if let Some(keyword) = request.keyword.as_deref().filter(|k| !k.trim().is_empty()) {
            query.push(("q", keyword.trim().to_string()));
        }
        let auth = format!("Bearer {}", token);

        let body = self
            .fetcher
            .get_json(&url, &query, &[("Authorization", &auth)])
            .await?;
        let events = self.parse_response(&body, Utc::now());

        metrics::providers::events_fetched(EVENTBRITE_API, events.len() as u64);
        info!(provider = EVENTBRITE_API, count = events.len(), "fetched events");
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn provider() -> EventbriteProvider {
        let config = ProviderConfig {
            enabled: true,
            base_url: "https://www.eventbriteapi.com/v3".to_string(),
            timeout_seconds: 5,
            delay_ms: 0,
            requests_per_minute: 10,
        };
        let fetcher = Arc::new(HttpFetcher::new(Duration::from_secs(5)).unwrap());
        EventbriteProvider::new(config, Some("test-token".to_string()), fetcher)
    }

    fn sample_body() -> serde_json::Value {
        json!({
            "events": [
                {
                    "id": "eb-900",
                    "name": {"text": "Community Food Festival"},
                    "description": {"text": "Local vendors and tastings."},
                    "url": "https://www.eventbrite.com/e/eb-900",
                    "start": {"local": "2023-08-12T11:00:00", "utc": "2023-08-12T18:00:00Z"},
                    "end": {"local": "2023-08-12T16:00:00"},
                    "is_free": true,
                    "ticket_availability": {
                        "minimum_ticket_price": {"major_value": "10.00"}
                    },
                    "venue": {
                        "name": "Riverfront Park",
                        "address": {"localized_address_display": "500 River Rd, Chicago, IL"},
                        "latitude": "41.87",
                        "longitude": "-87.64"
                    }
                }
            ]
        })
    }

    #[test]
    fn free_flag_short_circuits_ticket_prices() {
        let provider = provider();
        let events = provider.parse_response(&sample_body(), Utc::now());
        assert_eq!(events.len(), 1);

        let sourced = &events[0];
        assert_eq!(sourced.event.price, "Free");
        assert_eq!(sourced.event.title, "Community Food Festival");
        assert_eq!(sourced.event.time, "11:00 AM - 4:00 PM");
        assert_eq!(sourced.event.category, crate::common::types::Category::Food);
        assert_eq!(sourced.source.provider, EVENTBRITE_API);
    }

    #[test]
    fn unpriced_events_point_at_the_informational_source() {
        let provider = provider();
        let body = json!({
            "events": [{
                "id": "eb-901",
                "name": {"text": "Untitled Gathering"},
                "url": "https://www.eventbrite.com/e/eb-901",
                "start": {"local": "2023-08-20T18:00:00"}
            }]
        });
        let events = provider.parse_response(&body, Utc::now());
        assert_eq!(events[0].event.price, "See Eventbrite");
        assert_eq!(events[0].event.ticket_links.len(), 1);
    }

    #[test]
    fn items_without_title_or_start_are_skipped() {
        let provider = provider();
        let body = json!({
            "events": [
                {"id": "eb-902", "name": {"text": ""}, "start": {"local": "2023-08-20T18:00:00"}},
                {"id": "eb-903", "name": {"text": "No Start"}},
                {"id": "eb-904"}
            ]
        });
        assert!(provider.parse_response(&body, Utc::now()).is_empty());
    }

    #[test]
    fn utc_instant_is_kept_for_scoring() {
        let provider = provider();
        let events = provider.parse_response(&sample_body(), Utc::now());
        let start = events[0].start_at.unwrap();
        assert_eq!(start.format("%H:%M").to_string(), "18:00");
        assert_eq!(events[0].local_start.unwrap().hour(), 11);
    }
}
