//! Shared constants: provider identifiers, display sentinels, defaults.

// Provider identifiers as they appear in envelope `sources` and logs
pub const REALTIME_EVENTS_API: &str = "realtime_events";
pub const TICKETMASTER_API: &str = "ticketmaster";
pub const EVENTBRITE_API: &str = "eventbrite";

// Per-source trust weights used to break ties during deduplication
pub const REALTIME_EVENTS_CONFIDENCE: f64 = 0.7;
pub const TICKETMASTER_CONFIDENCE: f64 = 0.9;
pub const EVENTBRITE_CONFIDENCE: f64 = 0.75;

/// The ticketing platform outranks general-purpose search adapters when
/// confidences tie during dedup.
pub const HIGH_TRUST_PROVIDER: &str = TICKETMASTER_API;

// Display sentinels. `NO_DESCRIPTION` must stay distinguishable from real
// descriptions in filtering logic.
pub const NO_DESCRIPTION: &str = "No description available";
pub const VENUE_TBA: &str = "Venue TBA";
pub const PRICE_TBA: &str = "Price TBA";
pub const TICKETS_AVAILABLE: &str = "Tickets Available";

pub const DEFAULT_RADIUS_MILES: f64 = 25.0;
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Geocoding cache entries expire after this many hours.
pub const GEOCODE_CACHE_TTL_HOURS: u64 = 24;
