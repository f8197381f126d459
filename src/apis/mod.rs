//! Provider adapters: one per external event source, each translating a
//! normalized search request into the provider's wire format and the raw
//! response back into [`SourcedEvent`]s.

pub mod classify;
pub mod eventbrite;
pub mod price;
pub mod realtime_events;
pub mod ticketmaster;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;

use crate::common::error::Result;
use crate::common::types::{Coordinates, SearchRequest, SourcedEvent};
use crate::config::Config;
use crate::infra::http::HttpFetcher;

/// Contract every event source implements. Adapters are timeboxed by their
/// HTTP client and report errors as `Err`; the orchestrator maps failures
/// to empty result sets so one provider never aborts the aggregate search.
#[async_trait]
pub trait EventProvider: Send + Sync {
    /// Identifier used in envelope `sources`, logs, and dedup tie-breaks.
    fn provider_name(&self) -> &'static str;

    /// Per-source trust weight in [0, 1].
    fn confidence(&self) -> f64;

    /// False when required API keys are absent; unconfigured providers are
    /// skipped silently.
    fn is_configured(&self) -> bool;

    async fn search(
        &self,
        request: &SearchRequest,
        origin: Coordinates,
    ) -> Result<Vec<SourcedEvent>>;
}

/// Parse a provider-supplied timestamp. Returns the wall-clock form for
/// display and hour-of-day logic plus a UTC instant for scoring. Naive
/// inputs are treated as UTC for scoring purposes.
pub(crate) fn parse_event_datetime(raw: &str) -> Option<(NaiveDateTime, DateTime<Utc>)> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some((dt.naive_local(), dt.with_timezone(&Utc)));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some((naive, Utc.from_utc_datetime(&naive)));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        let naive = date.and_hms_opt(0, 0, 0)?;
        return Some((naive, Utc.from_utc_datetime(&naive)));
    }
    None
}

/// "July 28, 2023"
pub(crate) fn format_event_date(start: NaiveDateTime) -> String {
    start.format("%B %-d, %Y").to_string()
}

/// "7:00 PM - 10:00 PM" with an end time, "6:00 PM onwards" without one.
pub(crate) fn format_time_range(start: NaiveDateTime, end: Option<NaiveDateTime>) -> String {
    let start_text = start.format("%-I:%M %p").to_string();
    match end {
        Some(end) => format!("{} - {}", start_text, end.format("%-I:%M %p")),
        None => format!("{} onwards", start_text),
    }
}

/// Build every configured provider adapter from config and environment.
pub fn build_providers(config: &Config) -> Result<Vec<Arc<dyn EventProvider>>> {
    let realtime = config.providers.realtime_events.clone();
    let ticketmaster = config.providers.ticketmaster.clone();
    let eventbrite = config.providers.eventbrite.clone();

    let mut providers: Vec<Arc<dyn EventProvider>> = Vec::new();

    if realtime.enabled {
        let fetcher = Arc::new(HttpFetcher::new(Duration::from_secs(realtime.timeout_seconds))?);
        providers.push(Arc::new(realtime_events::RealtimeEventsProvider::from_env(
            realtime, fetcher,
        )));
    }
    if ticketmaster.enabled {
        let fetcher = Arc::new(HttpFetcher::new(Duration::from_secs(
            ticketmaster.timeout_seconds,
        ))?);
        providers.push(Arc::new(ticketmaster::TicketmasterProvider::from_env(
            ticketmaster,
            fetcher,
        )));
    }
    if eventbrite.enabled {
        let fetcher = Arc::new(HttpFetcher::new(Duration::from_secs(
            eventbrite.timeout_seconds,
        ))?);
        providers.push(Arc::new(eventbrite::EventbriteProvider::from_env(
            eventbrite, fetcher,
        )));
    }

    Ok(providers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfc3339_keeps_wall_clock_and_utc_instant() {
        let (local, utc) = parse_event_datetime("2023-07-28T19:00:00-05:00").unwrap();
        assert_eq!(local.format("%H:%M").to_string(), "19:00");
        assert_eq!(utc.format("%H:%M").to_string(), "00:00");
    }

    #[test]
    fn naive_and_date_only_forms_parse() {
        assert!(parse_event_datetime("2023-07-28T19:00:00").is_some());
        assert!(parse_event_datetime("2023-07-28 19:00:00").is_some());
        assert!(parse_event_datetime("2023-07-28").is_some());
        assert!(parse_event_datetime("next friday").is_none());
    }

    #[test]
    fn display_formats_match_ui_conventions() {
        let (start, _) = parse_event_datetime("2023-07-28T19:00:00").unwrap();
        let (end, _) = parse_event_datetime("2023-07-28T22:00:00").unwrap();
        assert_eq!(format_event_date(start), "July 28, 2023");
        assert_eq!(format_time_range(start, Some(end)), "7:00 PM - 10:00 PM");
        assert_eq!(format_time_range(start, None), "7:00 PM onwards");
    }
}
