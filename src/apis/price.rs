//! Price extraction: a fallback chain from structured provider fields down
//! to free-text scanning and venue-tier estimates. The output is always a
//! non-empty display string, never a bare number.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::common::constants::{PRICE_TBA, TICKETS_AVAILABLE};

/// Everything an adapter could learn about pricing from one raw item.
/// Stages are tried in order; the first stage that yields a price wins.
#[derive(Debug, Default)]
pub struct PriceHints {
    /// Explicit free flag; short-circuits everything else.
    pub is_free: bool,
    /// Structured price object from the provider.
    pub structured_min: Option<f64>,
    pub structured_max: Option<f64>,
    /// Flat min/max fields outside a structured object.
    pub flat_min: Option<f64>,
    pub flat_max: Option<f64>,
    /// Other named price-like fields (admission, cost, ...).
    pub named_amount: Option<f64>,
    /// Ticket link URLs, scanned for price query parameters.
    pub ticket_urls: Vec<String>,
    /// Whether a purchasable ticket link exists.
    pub has_purchasable_link: bool,
    /// Informational source to point at when nothing else is known.
    pub info_source: Option<String>,
    /// Name + description haystack for the free-text scan.
    pub text: String,
    /// Venue name/subtype used for tier-based estimation.
    pub venue_tier: Option<String>,
}

static URL_PRICE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[?&](?:min_?price|price|cost|amount)=(\d+(?:\.\d{1,2})?)")
        .expect("url price pattern is valid")
});

static TEXT_PRICE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\s*(\d+(?:\.\d{1,2})?)").expect("text price pattern is valid"));

static FREE_TEXT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bfree\b(?:\s+(?:admission|entry|event))?").expect("free pattern is valid")
});

/// Price estimates by venue tier for events with no price data at all.
static TIER_ESTIMATES: Lazy<Vec<(&'static [&'static str], (f64, f64))>> = Lazy::new(|| {
    vec![
        (&["arena", "amphitheater", "amphitheatre"][..], (45.0, 150.0)),
        (&["stadium", "coliseum"][..], (35.0, 120.0)),
        (&["theater", "theatre", "opera house", "playhouse"][..], (25.0, 85.0)),
        (&["club", "lounge", "ballroom"][..], (15.0, 40.0)),
        (&["bar", "tavern", "pub"][..], (10.0, 25.0)),
    ]
});

fn format_dollars(amount: f64) -> String {
    let amount = amount.max(0.0);
    if amount.fract() == 0.0 {
        format!("${}", amount as i64)
    } else {
        format!("${:.2}", amount)
    }
}

fn format_amount(amount: f64) -> String {
    if amount <= 0.0 {
        "Free".to_string()
    } else {
        format_dollars(amount)
    }
}

fn format_range(min: Option<f64>, max: Option<f64>) -> Option<String> {
    match (min, max) {
        (Some(lo), Some(hi)) => {
            if lo <= 0.0 && hi <= 0.0 {
                Some("Free".to_string())
            } else if (hi - lo).abs() < f64::EPSILON {
                Some(format_amount(lo))
            } else {
                Some(format!("{} - {}", format_dollars(lo), format_dollars(hi)))
            }
        }
        (Some(lo), None) => Some(format_amount(lo)),
        (None, Some(hi)) => Some(format_amount(hi)),
        (None, None) => None,
    }
}

fn price_from_urls(urls: &[String]) -> Option<String> {
    let mut amounts: Vec<f64> = Vec::new();
    for url in urls {
        for captures in URL_PRICE_PATTERN.captures_iter(url) {
            if let Ok(amount) = captures[1].parse::<f64>() {
                amounts.push(amount);
            }
        }
    }
    if amounts.is_empty() {
        return None;
    }
    let min = amounts.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = amounts.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    format_range(Some(min), Some(max))
}

fn price_from_text(text: &str) -> Option<String> {
    if FREE_TEXT_PATTERN.is_match(text) {
        return Some("Free".to_string());
    }
    let mut amounts: Vec<f64> = Vec::new();
    for captures in TEXT_PRICE_PATTERN.captures_iter(text) {
        if let Ok(amount) = captures[1].parse::<f64>() {
            amounts.push(amount);
        }
    }
    if amounts.is_empty() {
        return None;
    }
    let min = amounts.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = amounts.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    format_range(Some(min), Some(max))
}

fn price_from_tier(venue_tier: Option<&str>) -> Option<String> {
    let tier = venue_tier?.to_lowercase();
    for (keywords, (lo, hi)) in TIER_ESTIMATES.iter() {
        if keywords.iter().any(|k| tier.contains(k)) {
            return format_range(Some(*lo), Some(*hi));
        }
    }
    None
}

/// Run the extraction chain. Always returns a non-empty display string:
/// "Free", "$20", "$20 - $50", "Tickets Available", "See <source>", or
/// "Price TBA".
pub fn extract_price(hints: &PriceHints) -> String {
    if hints.is_free {
        return "Free".to_string();
    }
    if let Some(price) = format_range(hints.structured_min, hints.structured_max) {
        return price;
    }
    if let Some(price) = format_range(hints.flat_min, hints.flat_max) {
        return price;
    }
    if let Some(amount) = hints.named_amount {
        return format_amount(amount);
    }
    if let Some(price) = price_from_urls(&hints.ticket_urls) {
        return price;
    }
    if let Some(price) = price_from_text(&hints.text) {
        return price;
    }
    if hints.has_purchasable_link {
        return TICKETS_AVAILABLE.to_string();
    }
    if let Some(price) = price_from_tier(hints.venue_tier.as_deref()) {
        return price;
    }
    if let Some(source) = &hints.info_source {
        return format!("See {}", source);
    }
    PRICE_TBA.to_string()
}

/// Case-insensitive free check over the formatted display string; this is
/// the predicate the free/paid preference filter uses.
pub fn price_is_free(price: &str) -> bool {
    price.to_lowercase().contains("free")
}

/// Parse the numeric band back out of a formatted price string, for range
/// filtering. "Free" maps to (0, 0); non-numeric forms yield None.
pub fn parse_display_amounts(price: &str) -> Option<(f64, f64)> {
    if price_is_free(price) {
        return Some((0.0, 0.0));
    }
    let amounts: Vec<f64> = TEXT_PRICE_PATTERN
        .captures_iter(price)
        .filter_map(|c| c[1].parse::<f64>().ok())
        .collect();
    match amounts.as_slice() {
        [] => None,
        [single] => Some((*single, *single)),
        _ => {
            let min = amounts.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = amounts.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            Some((min, max))
        }
    }
}
