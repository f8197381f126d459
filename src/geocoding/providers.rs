//! Concrete geocoding backends: Mapbox (primary), TomTom (secondary), and a
//! static major-city table as the last-resort fallback.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use std::sync::Arc;

use crate::common::error::{AggregatorError, Result};
use crate::common::types::Coordinates;
use crate::geocoding::GeocodeProvider;
use crate::infra::http::HttpFetcher;

pub struct MapboxGeocoder {
    fetcher: Arc<HttpFetcher>,
    api_key: Option<String>,
    base_url: String,
}

impl MapboxGeocoder {
    pub fn new(api_key: Option<String>, fetcher: Arc<HttpFetcher>) -> Self {
        Self {
            fetcher,
            api_key,
            base_url: "https://api.mapbox.com/geocoding/v5/mapbox.places".to_string(),
        }
    }

    pub fn from_env(fetcher: Arc<HttpFetcher>) -> Self {
        Self::new(std::env::var("MAPBOX_API_KEY").ok(), fetcher)
    }

    fn endpoint(&self, resource: &str) -> Result<String> {
        let mut url =
            reqwest::Url::parse(&self.base_url).map_err(|e| AggregatorError::Provider {
                message: format!("invalid mapbox base url: {}", e),
            })?;
        url.path_segments_mut()
            .map_err(|_| AggregatorError::Provider {
                message: "mapbox base url cannot be a base".to_string(),
            })?
            .push(resource);
        Ok(url.to_string())
    }
}

#[async_trait]
impl GeocodeProvider for MapboxGeocoder {
    fn provider_name(&self) -> &'static str {
        "mapbox"
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn geocode(&self, query: &str) -> Result<Option<Coordinates>> {
        let key = self.api_key.as_deref().ok_or_else(|| {
            AggregatorError::Config("MAPBOX_API_KEY not set".to_string())
        })?;
        let url = self.endpoint(&format!("{}.json", query))?;
        let body = self
            .fetcher
            .get_json(
                &url,
                &[("access_token", key.to_string()), ("limit", "1".to_string())],
                &[],
            )
            .await?;

        let center = body
            .pointer("/features/0/center")
            .and_then(|c| c.as_array());
        let coords = center.and_then(|c| {
            let lng = c.first()?.as_f64()?;
            let lat = c.get(1)?.as_f64()?;
            Coordinates::new(lat, lng)
        });
        Ok(coords)
    }

    async fn reverse_geocode(&self, coords: Coordinates) -> Result<Option<String>> {
        let key = self.api_key.as_deref().ok_or_else(|| {
            AggregatorError::Config("MAPBOX_API_KEY not set".to_string())
        })?;
        let url = self.endpoint(&format!("{},{}.json", coords.lng, coords.lat))?;
        let body = self
            .fetcher
            .get_json(
                &url,
                &[("access_token", key.to_string()), ("limit", "1".to_string())],
                &[],
            )
            .await?;

        Ok(body
            .pointer("/features/0/place_name")
            .and_then(|p| p.as_str())
            .map(|s| s.to_string()))
    }
}

pub struct TomTomGeocoder {
    fetcher: Arc<HttpFetcher>,
    api_key: Option<String>,
    base_url: String,
}

impl TomTomGeocoder {
    pub fn new(api_key: Option<String>, fetcher: Arc<HttpFetcher>) -> Self {
        Self {
            fetcher,
            api_key,
            base_url: "https://api.tomtom.com/search/2".to_string(),
        }
    }

    pub fn from_env(fetcher: Arc<HttpFetcher>) -> Self {
        Self::new(std::env::var("TOMTOM_API_KEY").ok(), fetcher)
    }

    fn endpoint(&self, segments: &[&str]) -> Result<String> {
        let mut url =
            reqwest::Url::parse(&self.base_url).map_err(|e| AggregatorError::Provider {
                message: format!("invalid tomtom base url: {}", e),
            })?;
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| AggregatorError::Provider {
                    message: "tomtom base url cannot be a base".to_string(),
                })?;
            for segment in segments {
                path.push(segment);
            }
        }
        Ok(url.to_string())
    }
}

#[async_trait]
impl GeocodeProvider for TomTomGeocoder {
    fn provider_name(&self) -> &'static str {
        "tomtom"
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn geocode(&self, query: &str) -> Result<Option<Coordinates>> {
        let key = self.api_key.as_deref().ok_or_else(|| {
            AggregatorError::Config("TOMTOM_API_KEY not set".to_string())
        })?;
        let url = self.endpoint(&["geocode", &format!("{}.json", query)])?;
        let body = self
            .fetcher
            .get_json(
                &url,
                &[("key", key.to_string()), ("limit", "1".to_string())],
                &[],
            )
            .await?;

        let coords = body.pointer("/results/0/position").and_then(|p| {
            let lat = p.get("lat")?.as_f64()?;
            let lng = p.get("lon")?.as_f64()?;
            Coordinates::new(lat, lng)
        });
        Ok(coords)
    }

    async fn reverse_geocode(&self, coords: Coordinates) -> Result<Option<String>> {
        let key = self.api_key.as_deref().ok_or_else(|| {
            AggregatorError::Config("TOMTOM_API_KEY not set".to_string())
        })?;
        let url = self.endpoint(&[
            "reverseGeocode",
            &format!("{},{}.json", coords.lat, coords.lng),
        ])?;
        let body = self
            .fetcher
            .get_json(&url, &[("key", key.to_string())], &[])
            .await?;

        Ok(body
            .pointer("/addresses/0/address/freeformAddress")
            .and_then(|a| a.as_str())
            .map(|s| s.to_string()))
    }
}

static MAJOR_CITIES: Lazy<Vec<(&'static str, Coordinates)>> = Lazy::new(|| {
    vec![
        ("new york", Coordinates { lat: 40.7128, lng: -74.0060 }),
        ("los angeles", Coordinates { lat: 34.0522, lng: -118.2437 }),
        ("chicago", Coordinates { lat: 41.8781, lng: -87.6298 }),
        ("houston", Coordinates { lat: 29.7604, lng: -95.3698 }),
        ("phoenix", Coordinates { lat: 33.4484, lng: -112.0740 }),
        ("philadelphia", Coordinates { lat: 39.9526, lng: -75.1652 }),
        ("san antonio", Coordinates { lat: 29.4241, lng: -98.4936 }),
        ("san diego", Coordinates { lat: 32.7157, lng: -117.1611 }),
        ("dallas", Coordinates { lat: 32.7767, lng: -96.7970 }),
        ("san jose", Coordinates { lat: 37.3382, lng: -121.8863 }),
        ("austin", Coordinates { lat: 30.2672, lng: -97.7431 }),
        ("seattle", Coordinates { lat: 47.6062, lng: -122.3321 }),
        ("denver", Coordinates { lat: 39.7392, lng: -104.9903 }),
        ("boston", Coordinates { lat: 42.3601, lng: -71.0589 }),
        ("miami", Coordinates { lat: 25.7617, lng: -80.1918 }),
        ("atlanta", Coordinates { lat: 33.7490, lng: -84.3880 }),
        ("san francisco", Coordinates { lat: 37.7749, lng: -122.4194 }),
        ("portland", Coordinates { lat: 45.5152, lng: -122.6784 }),
        ("las vegas", Coordinates { lat: 36.1699, lng: -115.1398 }),
        ("washington", Coordinates { lat: 38.9072, lng: -77.0369 }),
    ]
});

/// Offline fallback matching well-known city names; never fails, never
/// needs configuration.
pub struct StaticCityTable;

#[async_trait]
impl GeocodeProvider for StaticCityTable {
    fn provider_name(&self) -> &'static str {
        "static_cities"
    }

    async fn geocode(&self, query: &str) -> Result<Option<Coordinates>> {
        let needle = query.to_lowercase();
        Ok(MAJOR_CITIES
            .iter()
            .find(|(name, _)| needle.contains(name))
            .map(|(_, coords)| *coords))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_table_matches_city_with_state_suffix() {
        let table = StaticCityTable;
        let coords = table.geocode("Seattle, WA").await.unwrap().unwrap();
        assert!((coords.lat - 47.6062).abs() < 1e-6);
    }

    #[tokio::test]
    async fn static_table_misses_unknown_places() {
        let table = StaticCityTable;
        assert!(table.geocode("Middle of Nowhere").await.unwrap().is_none());
    }

    #[test]
    fn unconfigured_mapbox_reports_unavailable() {
        let fetcher = Arc::new(HttpFetcher::new(std::time::Duration::from_secs(5)).unwrap());
        let geocoder = MapboxGeocoder::new(None, fetcher);
        assert!(!geocoder.is_configured());
    }
}
