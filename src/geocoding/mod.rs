//! Geocoding resolver: turns a free-text location or raw coordinate pair
//! into canonical coordinates, trying providers in priority order with a
//! 24-hour in-memory cache and a static major-city fallback.

pub mod providers;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::common::constants::GEOCODE_CACHE_TTL_HOURS;
use crate::common::error::Result;
use crate::common::types::{Coordinates, LocationQuery};
use crate::observability::metrics;

/// A single geocoding backend. Unconfigured providers report unavailable
/// and are skipped by the resolver.
#[async_trait]
pub trait GeocodeProvider: Send + Sync {
    fn provider_name(&self) -> &'static str;

    fn is_configured(&self) -> bool {
        true
    }

    async fn geocode(&self, query: &str) -> Result<Option<Coordinates>>;

    async fn reverse_geocode(&self, _coords: Coordinates) -> Result<Option<String>> {
        Ok(None)
    }
}

static COORD_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(-?\d{1,3}(?:\.\d+)?)\s*,\s*(-?\d{1,3}(?:\.\d+)?)\s*$")
        .expect("coordinate pattern is valid")
});

/// Parse a `"<lat>, <lng>"` string without any network call.
pub fn parse_coordinate_text(text: &str) -> Option<Coordinates> {
    let captures = COORD_PATTERN.captures(text)?;
    let lat: f64 = captures.get(1)?.as_str().parse().ok()?;
    let lng: f64 = captures.get(2)?.as_str().parse().ok()?;
    Coordinates::new(lat, lng)
}

struct CachedCoordinates {
    coords: Coordinates,
    stored_at: Instant,
}

/// Resolver over a priority-ordered provider chain. Constructed once at
/// startup and shared; the cache sits behind a mutex.
pub struct GeocodingResolver {
    providers: Vec<Box<dyn GeocodeProvider>>,
    cache: Mutex<HashMap<String, CachedCoordinates>>,
    ttl: Duration,
}

impl GeocodingResolver {
    pub fn new(providers: Vec<Box<dyn GeocodeProvider>>) -> Self {
        Self::with_ttl(
            providers,
            Duration::from_secs(GEOCODE_CACHE_TTL_HOURS * 60 * 60),
        )
    }

    pub fn with_ttl(providers: Vec<Box<dyn GeocodeProvider>>, ttl: Duration) -> Self {
        Self {
            providers,
            cache: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Resolve a location query to coordinates, or `None` when every
    /// provider fails. Callers must treat `None` as "cannot search".
    pub async fn resolve(&self, query: &LocationQuery) -> Option<Coordinates> {
        match query {
            LocationQuery::Coords(coords) => coords.is_valid().then_some(*coords),
            LocationQuery::Text(text) => self.resolve_text(text).await,
        }
    }

    async fn resolve_text(&self, text: &str) -> Option<Coordinates> {
        // A raw "<lat>, <lng>" string never needs a provider
        if let Some(coords) = parse_coordinate_text(text) {
            return Some(coords);
        }

        {
            let mut cache = self.cache.lock().await;
            if let Some(entry) = cache.get(text) {
                if entry.stored_at.elapsed() < self.ttl {
                    metrics::geocoding::cache_hit();
                    return Some(entry.coords);
                }
                cache.remove(text);
            }
        }
        metrics::geocoding::cache_miss();

        for provider in &self.providers {
            if !provider.is_configured() {
                debug!(provider = provider.provider_name(), "geocoder not configured, skipping");
                continue;
            }
            match provider.geocode(text).await {
                Ok(Some(coords)) => {
                    let mut cache = self.cache.lock().await;
                    cache.insert(
                        text.to_string(),
                        CachedCoordinates {
                            coords,
                            stored_at: Instant::now(),
                        },
                    );
                    return Some(coords);
                }
                Ok(None) => {
                    debug!(provider = provider.provider_name(), query = text, "no geocoding match");
                }
                Err(e) => {
                    warn!(
                        provider = provider.provider_name(),
                        query = text,
                        error = %e,
                        "geocoding provider failed"
                    );
                }
            }
        }

        metrics::geocoding::failure();
        None
    }

    /// Best-effort reverse lookup of a human-readable address.
    pub async fn reverse_geocode(&self, coords: Coordinates) -> Option<String> {
        if !coords.is_valid() {
            return None;
        }
        for provider in &self.providers {
            if !provider.is_configured() {
                continue;
            }
            match provider.reverse_geocode(coords).await {
                Ok(Some(address)) => return Some(address),
                Ok(None) => {}
                Err(e) => {
                    warn!(
                        provider = provider.provider_name(),
                        error = %e,
                        "reverse geocoding failed"
                    );
                }
            }
        }
        None
    }
}
