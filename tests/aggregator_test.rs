use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;

use event_scout::apis::EventProvider;
use event_scout::common::constants::{NO_DESCRIPTION, REALTIME_EVENTS_API, TICKETMASTER_API};
use event_scout::common::error::{AggregatorError, Result};
use event_scout::common::types::{
    stable_event_id, Category, Coordinates, LocationQuery, NormalizedEvent, Organizer,
    PricePreference, SearchRequest, SortKey, SourceMetadata, SourcedEvent, UserPreferences,
};
use event_scout::geocoding::GeocodingResolver;
use event_scout::Aggregator;

fn origin() -> Coordinates {
    Coordinates { lat: 41.8781, lng: -87.6298 }
}

struct EventSeed {
    title: &'static str,
    date: &'static str,
    location: &'static str,
    price: &'static str,
    coords: Option<Coordinates>,
    days_out: i64,
}

impl Default for EventSeed {
    fn default() -> Self {
        Self {
            title: "Sample Event",
            date: "July 28, 2023",
            location: "Sample Venue",
            price: "Price TBA",
            coords: None,
            days_out: 3,
        }
    }
}

fn sourced(seed: EventSeed, provider: &str, confidence: f64) -> SourcedEvent {
    let event = NormalizedEvent {
        id: stable_event_id(provider, seed.title),
        title: seed.title.to_string(),
        description: NO_DESCRIPTION.to_string(),
        category: Category::Music,
        date: seed.date.to_string(),
        time: "7:00 PM onwards".to_string(),
        location: seed.location.to_string(),
        address: String::new(),
        coordinates: seed.coords,
        price: seed.price.to_string(),
        organizer: Organizer {
            name: seed.location.to_string(),
            avatar: None,
        },
        attendees: None,
        image_url: None,
        ticket_links: Vec::new(),
        tags: Vec::new(),
    };
    let mut sourced = SourcedEvent::new(
        event,
        SourceMetadata {
            provider: provider.to_string(),
            original_id: seed.title.to_string(),
            confidence,
            last_updated: Utc::now(),
        },
    );
    let start = Utc::now() + ChronoDuration::days(seed.days_out);
    sourced.start_at = Some(start);
    sourced.local_start = Some(start.naive_utc());
    sourced
}

struct MockProvider {
    name: &'static str,
    confidence: f64,
    events: Vec<SourcedEvent>,
    fail: bool,
}

impl MockProvider {
    fn with_events(
        name: &'static str,
        confidence: f64,
        events: Vec<SourcedEvent>,
    ) -> Arc<dyn EventProvider> {
        Arc::new(Self {
            name,
            confidence,
            events,
            fail: false,
        })
    }

    fn failing(name: &'static str) -> Arc<dyn EventProvider> {
        Arc::new(Self {
            name,
            confidence: 0.5,
            events: Vec::new(),
            fail: true,
        })
    }
}

#[async_trait]
impl EventProvider for MockProvider {
    fn provider_name(&self) -> &'static str {
        self.name
    }

    fn confidence(&self) -> f64 {
        self.confidence
    }

    fn is_configured(&self) -> bool {
        true
    }

    async fn search(
        &self,
        _request: &SearchRequest,
        _origin: Coordinates,
    ) -> Result<Vec<SourcedEvent>> {
        if self.fail {
            return Err(AggregatorError::Provider {
                message: "simulated outage".to_string(),
            });
        }
        Ok(self.events.clone())
    }
}

fn aggregator(providers: Vec<Arc<dyn EventProvider>>) -> Aggregator {
    // No geocoding backends: only coordinate inputs resolve
    Aggregator::new(Arc::new(GeocodingResolver::new(vec![])), providers)
}

fn coords_request() -> SearchRequest {
    SearchRequest {
        location: Some(LocationQuery::Coords(origin())),
        ..Default::default()
    }
}

#[tokio::test]
async fn envelope_is_well_formed_and_paginated() {
    let titles = ["One", "Two", "Three", "Four", "Five"];
    let events: Vec<SourcedEvent> = titles
        .iter()
        .enumerate()
        .map(|(i, title)| {
            sourced(
                EventSeed {
                    title,
                    date: "August 1, 2023",
                    location: "Hall",
                    days_out: i as i64 + 1,
                    ..Default::default()
                },
                REALTIME_EVENTS_API,
                0.7,
            )
        })
        .collect();
    // Distinct titles and venues, so nothing merges
    let provider = MockProvider::with_events(REALTIME_EVENTS_API, 0.7, events);
    let aggregator = aggregator(vec![provider]);

    let request = SearchRequest {
        page: 2,
        size: 2,
        ..coords_request()
    };
    let envelope = aggregator.aggregate(&request).await;

    assert!(envelope.error.is_none());
    assert_eq!(envelope.total_count, 5);
    assert_eq!(envelope.page, 2);
    assert_eq!(envelope.total_pages, 3);
    assert!(envelope.events.len() <= 2);
    assert_eq!(envelope.events.len(), 2);
    assert_eq!(envelope.sources, vec![REALTIME_EVENTS_API.to_string()]);
}

#[tokio::test]
async fn all_failing_providers_still_yield_a_valid_envelope() {
    let aggregator = aggregator(vec![
        MockProvider::failing("broken_one"),
        MockProvider::failing("broken_two"),
    ]);

    let envelope = aggregator.aggregate(&coords_request()).await;

    assert!(envelope.events.is_empty());
    assert_eq!(envelope.total_count, 0);
    assert!(envelope.sources.is_empty());
    assert!(envelope.error.is_some());
}

#[tokio::test]
async fn one_provider_failure_does_not_abort_the_search() {
    let healthy = MockProvider::with_events(
        TICKETMASTER_API,
        0.9,
        vec![sourced(
            EventSeed {
                title: "Arena Show",
                ..Default::default()
            },
            TICKETMASTER_API,
            0.9,
        )],
    );
    let aggregator = aggregator(vec![
        MockProvider::failing(REALTIME_EVENTS_API),
        healthy,
    ]);

    let envelope = aggregator.aggregate(&coords_request()).await;

    assert!(envelope.error.is_none());
    assert_eq!(envelope.total_count, 1);
    assert_eq!(envelope.sources, vec![TICKETMASTER_API.to_string()]);
}

#[tokio::test]
async fn unresolvable_location_fails_fast_with_an_error_envelope() {
    let provider = MockProvider::with_events(REALTIME_EVENTS_API, 0.7, Vec::new());
    let aggregator = aggregator(vec![provider]);

    let request = SearchRequest {
        location: Some(LocationQuery::Text("Atlantis".to_string())),
        ..Default::default()
    };
    let envelope = aggregator.aggregate(&request).await;

    assert!(envelope.events.is_empty());
    assert_eq!(envelope.total_count, 0);
    assert_eq!(envelope.page, 0);
    assert_eq!(envelope.total_pages, 0);
    assert!(envelope.sources.is_empty());
    assert!(!envelope.error.as_deref().unwrap_or("").is_empty());
}

#[tokio::test]
async fn duplicate_listings_collapse_to_the_higher_confidence_source() {
    let seed = || EventSeed {
        title: "Jazz Night Downtown",
        date: "July 28, 2023",
        location: "Blue Note, Chicago",
        ..Default::default()
    };
    let low = MockProvider::with_events(
        REALTIME_EVENTS_API,
        0.7,
        vec![sourced(seed(), REALTIME_EVENTS_API, 0.7)],
    );
    let high = MockProvider::with_events(
        TICKETMASTER_API,
        0.9,
        vec![sourced(seed(), TICKETMASTER_API, 0.9)],
    );
    let aggregator = aggregator(vec![low, high]);

    let envelope = aggregator.aggregate(&coords_request()).await;

    assert!(envelope.error.is_none());
    assert_eq!(envelope.total_count, 1);
    assert_eq!(envelope.events[0].title, "Jazz Night Downtown");
    // Only the surviving source is reported
    assert_eq!(envelope.sources, vec![TICKETMASTER_API.to_string()]);
}

#[tokio::test]
async fn free_price_preference_excludes_paid_events() {
    let events = vec![
        sourced(
            EventSeed {
                title: "Free Park Concert",
                price: "Free",
                ..Default::default()
            },
            REALTIME_EVENTS_API,
            0.7,
        ),
        sourced(
            EventSeed {
                title: "Paid Gala",
                price: "$120",
                location: "Grand Hall",
                ..Default::default()
            },
            REALTIME_EVENTS_API,
            0.7,
        ),
        sourced(
            EventSeed {
                title: "Unpriced Meetup",
                price: "Tickets Available",
                location: "Side Room",
                ..Default::default()
            },
            REALTIME_EVENTS_API,
            0.7,
        ),
    ];
    let provider = MockProvider::with_events(REALTIME_EVENTS_API, 0.7, events);
    let aggregator = aggregator(vec![provider]);

    let request = SearchRequest {
        preferences: Some(UserPreferences {
            price_preference: PricePreference::Free,
            ..Default::default()
        }),
        ..coords_request()
    };
    let envelope = aggregator.aggregate(&request).await;

    assert_eq!(envelope.total_count, 1);
    assert_eq!(envelope.events[0].title, "Free Park Concert");
}

#[tokio::test]
async fn relevance_sort_prefers_near_and_soon_events() {
    let near = sourced(
        EventSeed {
            title: "Near Show",
            coords: Coordinates::new(41.8785, -87.6300),
            days_out: 2,
            ..Default::default()
        },
        REALTIME_EVENTS_API,
        0.7,
    );
    let far = sourced(
        EventSeed {
            title: "Far Show",
            location: "Distant Hall",
            coords: Coordinates::new(42.10, -88.00),
            days_out: 2,
            ..Default::default()
        },
        REALTIME_EVENTS_API,
        0.7,
    );
    let unknown = sourced(
        EventSeed {
            title: "Unknown Venue Show",
            location: "Somewhere",
            days_out: 60,
            ..Default::default()
        },
        REALTIME_EVENTS_API,
        0.7,
    );

    let provider =
        MockProvider::with_events(REALTIME_EVENTS_API, 0.7, vec![unknown, far, near]);
    let aggregator = aggregator(vec![provider]);

    let request = SearchRequest {
        sort: SortKey::Relevance,
        ..coords_request()
    };
    let envelope = aggregator.aggregate(&request).await;

    let titles: Vec<&str> = envelope.events.iter().map(|e| e.title.as_str()).collect();
    assert_eq!(titles, vec!["Near Show", "Far Show", "Unknown Venue Show"]);
}

#[tokio::test]
async fn stripped_envelope_serialization_has_no_source_metadata() {
    let provider = MockProvider::with_events(
        TICKETMASTER_API,
        0.9,
        vec![sourced(EventSeed::default(), TICKETMASTER_API, 0.9)],
    );
    let aggregator = aggregator(vec![provider]);

    let envelope = aggregator.aggregate(&coords_request()).await;
    let json = serde_json::to_string(&envelope).unwrap();

    assert!(!json.contains("confidence"));
    assert!(!json.contains("original_id"));
    assert!(!json.contains("relevance"));
}
