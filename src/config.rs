use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::common::error::{AggregatorError, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub geocoding: GeocodingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_radius_miles")]
    pub default_radius_miles: f64,
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeocodingConfig {
    #[serde(default = "default_cache_ttl_hours")]
    pub cache_ttl_hours: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default = "ProviderConfig::realtime_events_default")]
    pub realtime_events: ProviderConfig,
    #[serde(default = "ProviderConfig::ticketmaster_default")]
    pub ticketmaster: ProviderConfig,
    #[serde(default = "ProviderConfig::eventbrite_default")]
    pub eventbrite: ProviderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub base_url: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
}

impl ProviderConfig {
    fn with_base_url(base_url: &str) -> Self {
        Self {
            enabled: true,
            base_url: base_url.to_string(),
            timeout_seconds: default_timeout_seconds(),
            delay_ms: default_delay_ms(),
            requests_per_minute: default_requests_per_minute(),
        }
    }

    fn realtime_events_default() -> Self {
        Self::with_base_url("https://real-time-events-search.p.rapidapi.com")
    }

    fn ticketmaster_default() -> Self {
        Self::with_base_url("https://app.ticketmaster.com/discovery/v2")
    }

    fn eventbrite_default() -> Self {
        Self::with_base_url("https://www.eventbriteapi.com/v3")
    }
}

fn default_true() -> bool {
    true
}

fn default_radius_miles() -> f64 {
    crate::common::constants::DEFAULT_RADIUS_MILES
}

fn default_page_size() -> u32 {
    crate::common::constants::DEFAULT_PAGE_SIZE
}

fn default_cache_ttl_hours() -> u64 {
    crate::common::constants::GEOCODE_CACHE_TTL_HOURS
}

fn default_metrics_port() -> u16 {
    9898
}

fn default_timeout_seconds() -> u64 {
    10
}

fn default_delay_ms() -> u64 {
    250
}

fn default_requests_per_minute() -> u32 {
    30
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_radius_miles: default_radius_miles(),
            default_page_size: default_page_size(),
        }
    }
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            cache_ttl_hours: default_cache_ttl_hours(),
        }
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            realtime_events: ProviderConfig::realtime_events_default(),
            ticketmaster: ProviderConfig::ticketmaster_default(),
            eventbrite: ProviderConfig::eventbrite_default(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            search: SearchConfig::default(),
            geocoding: GeocodingConfig::default(),
            metrics: MetricsConfig::default(),
            providers: ProvidersConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from("config.toml")
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            AggregatorError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_falls_back_to_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.search.default_page_size, 20);
        assert!((config.search.default_radius_miles - 25.0).abs() < f64::EPSILON);
        assert!(config.providers.ticketmaster.enabled);
        assert_eq!(config.geocoding.cache_ttl_hours, 24);
    }

    #[test]
    fn provider_overrides_are_honored() {
        let config: Config = toml::from_str(
            r#"
            [providers.ticketmaster]
            enabled = false
            base_url = "http://localhost:9000"
            requests_per_minute = 5
            "#,
        )
        .unwrap();
        assert!(!config.providers.ticketmaster.enabled);
        assert_eq!(config.providers.ticketmaster.base_url, "http://localhost:9000");
        assert_eq!(config.providers.ticketmaster.requests_per_minute, 5);
        // Untouched providers keep their defaults
        assert!(config.providers.eventbrite.enabled);
    }
}
