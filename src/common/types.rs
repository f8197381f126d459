//! Canonical data model for the aggregation pipeline.
//!
//! Every provider response is mapped into [`NormalizedEvent`]; the
//! aggregation-internal wrapper [`SourcedEvent`] carries source metadata and
//! scoring fields that are stripped before results leave the orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::common::constants::{NO_DESCRIPTION, PRICE_TBA};

/// A latitude/longitude pair. Valid instances are finite and in range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Option<Self> {
        let coords = Self { lat, lng };
        coords.is_valid().then_some(coords)
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

/// Closed set of display categories derived from free-text provider tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Music,
    Arts,
    Sports,
    Food,
    Business,
    ClubEvents,
    DayParties,
    Parties,
    General,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Category::Music => "Music",
            Category::Arts => "Arts",
            Category::Sports => "Sports",
            Category::Food => "Food",
            Category::Business => "Business",
            Category::ClubEvents => "Club Events",
            Category::DayParties => "Day Parties",
            Category::Parties => "Parties",
            Category::General => "General Events",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organizer {
    pub name: String,
    pub avatar: Option<String>,
}

/// A purchasable or informational link for an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketLink {
    pub source: String,
    pub link: String,
}

/// The canonical internal event record all provider responses map into.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedEvent {
    /// Stable identifier derived from the provider's native id.
    pub id: u64,
    pub title: String,
    /// May hold the "No description available" sentinel when the provider
    /// omits a description.
    pub description: String,
    pub category: Category,
    /// Human-formatted date, e.g. "July 28, 2023".
    pub date: String,
    /// Human-formatted time, e.g. "7:00 PM - 10:00 PM" or "6:00 PM onwards".
    pub time: String,
    /// Venue name; "Venue TBA" when absent.
    pub location: String,
    pub address: String,
    pub coordinates: Option<Coordinates>,
    /// Display string, never empty: "Free", "$20", "$20 - $50",
    /// "Tickets Available", "See <source>", or "Price TBA".
    pub price: String,
    pub organizer: Organizer,
    /// Real attendance figures only; None when the provider has no data.
    pub attendees: Option<u32>,
    pub image_url: Option<String>,
    pub ticket_links: Vec<TicketLink>,
    /// Raw provider tags, preserved for search and filtering.
    pub tags: Vec<String>,
}

impl NormalizedEvent {
    /// Whether the description is the placeholder sentinel rather than
    /// provider-supplied text.
    pub fn has_real_description(&self) -> bool {
        !self.description.is_empty() && self.description != NO_DESCRIPTION
    }

    pub fn has_known_price(&self) -> bool {
        self.price != PRICE_TBA
    }
}

/// Derive a stable 64-bit event id from a provider's native id. Repeated
/// fetches of the same source event always produce the same id.
pub fn stable_event_id(provider: &str, original_id: &str) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(provider.as_bytes());
    hasher.update(b":");
    hasher.update(original_id.as_bytes());
    let digest = hasher.finalize();
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(prefix)
}

/// Aggregation-internal provenance, stripped before events leave the
/// orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceMetadata {
    pub provider: String,
    pub original_id: String,
    /// Per-source trust weight in [0, 1], used to break dedup ties.
    pub confidence: f64,
    pub last_updated: DateTime<Utc>,
}

/// An event plus the aggregation-internal metadata the pipeline needs:
/// provenance, parsed start/end instants, distance from the search origin,
/// and the relevance score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcedEvent {
    pub event: NormalizedEvent,
    pub source: SourceMetadata,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    /// Wall-clock start at the venue, for hour-of-day filtering. Providers
    /// do not reliably report timezones, so this stays separate from
    /// `start_at`.
    pub local_start: Option<chrono::NaiveDateTime>,
    pub distance_miles: Option<f64>,
    pub relevance: f64,
}

impl SourcedEvent {
    pub fn new(event: NormalizedEvent, source: SourceMetadata) -> Self {
        Self {
            event,
            source,
            start_at: None,
            end_at: None,
            local_start: None,
            distance_miles: None,
            relevance: 0.0,
        }
    }

    /// Drop internal metadata, yielding the UI-facing record.
    pub fn into_event(self) -> NormalizedEvent {
        self.event
    }
}

/// Search origin: free text ("Seattle, WA", "47.6, -122.3") or explicit
/// coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LocationQuery {
    Coords(Coordinates),
    Text(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    Relevance,
    Distance,
    Date,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PricePreference {
    Free,
    Paid,
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimePreference {
    Morning,
    Afternoon,
    Evening,
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPreferences {
    #[serde(default)]
    pub favorite_categories: Vec<Category>,
    #[serde(default = "default_price_preference")]
    pub price_preference: PricePreference,
    #[serde(default = "default_time_preference")]
    pub time_preference: TimePreference,
}

fn default_price_preference() -> PricePreference {
    PricePreference::Any
}

fn default_time_preference() -> TimePreference {
    TimePreference::Any
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            favorite_categories: Vec::new(),
            price_preference: PricePreference::Any,
            time_preference: TimePreference::Any,
        }
    }
}

/// Input to the aggregation orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub keyword: Option<String>,
    pub location: Option<LocationQuery>,
    /// Search radius in miles.
    pub radius_miles: f64,
    /// 1-based page number.
    pub page: u32,
    pub size: u32,
    pub sort: SortKey,
    pub price_range: Option<PriceRange>,
    pub preferences: Option<UserPreferences>,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            keyword: None,
            location: None,
            radius_miles: crate::common::constants::DEFAULT_RADIUS_MILES,
            page: 1,
            size: crate::common::constants::DEFAULT_PAGE_SIZE,
            sort: SortKey::Relevance,
            price_range: None,
            preferences: None,
        }
    }
}

/// The sole output contract toward the UI layer and population tooling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultEnvelope {
    pub events: Vec<NormalizedEvent>,
    pub total_count: usize,
    pub page: u32,
    pub total_pages: u32,
    pub sources: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResultEnvelope {
    /// Empty envelope carrying a user-facing error. Callers distinguish
    /// "no results" from "system error" via the `error` field.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            events: Vec::new(),
            total_count: 0,
            page: 0,
            total_pages: 0,
            sources: Vec::new(),
            error: Some(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_id_is_deterministic() {
        let a = stable_event_id("ticketmaster", "G5vYZ9271ou-y");
        let b = stable_event_id("ticketmaster", "G5vYZ9271ou-y");
        assert_eq!(a, b);
    }

    #[test]
    fn stable_id_varies_by_provider_and_native_id() {
        let a = stable_event_id("ticketmaster", "abc");
        let b = stable_event_id("eventbrite", "abc");
        let c = stable_event_id("ticketmaster", "abd");
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn coordinates_reject_out_of_range_values() {
        assert!(Coordinates::new(47.6, -122.3).is_some());
        assert!(Coordinates::new(91.0, 0.0).is_none());
        assert!(Coordinates::new(0.0, -181.0).is_none());
        assert!(Coordinates::new(f64::NAN, 0.0).is_none());
    }

    #[test]
    fn placeholder_description_is_distinguishable() {
        let organizer = Organizer {
            name: "Venue".to_string(),
            avatar: None,
        };
        let mut event = NormalizedEvent {
            id: 1,
            title: "Show".to_string(),
            description: NO_DESCRIPTION.to_string(),
            category: Category::Music,
            date: "July 28, 2023".to_string(),
            time: "7:00 PM onwards".to_string(),
            location: "Blue Note".to_string(),
            address: "131 W 3rd St".to_string(),
            coordinates: None,
            price: "Free".to_string(),
            organizer,
            attendees: None,
            image_url: None,
            ticket_links: Vec::new(),
            tags: Vec::new(),
        };
        assert!(!event.has_real_description());
        event.description = "An evening of live jazz.".to_string();
        assert!(event.has_real_description());
    }
}
