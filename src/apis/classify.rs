//! Best-effort category classification from free-text provider signals.
//!
//! Scans tags, then venue subtype, then name/description against a fixed
//! keyword table; the first match wins, with "General Events" as the
//! fallback. A time-of-day heuristic splits nightlife into club events,
//! day parties, and generic parties before the table is consulted.

use once_cell::sync::Lazy;

use crate::common::types::Category;

static CATEGORY_KEYWORDS: Lazy<Vec<(Category, Vec<&'static str>)>> = Lazy::new(|| {
    vec![
        (
            Category::Music,
            vec![
                "concert", "music", "band", "dj", "live music", "gig",
                "orchestra", "jazz", "rock", "hip hop", "karaoke", "singer",
            ],
        ),
        (
            Category::Arts,
            vec![
                "art", "theater", "theatre", "museum", "gallery", "exhibit", "film",
                "comedy", "dance", "opera", "poetry", "craft",
            ],
        ),
        (
            Category::Sports,
            vec![
                "sport", "game", "match", "race", "marathon", "basketball", "football",
                "baseball", "soccer", "hockey", "fitness", "yoga", "tournament",
            ],
        ),
        (
            Category::Food,
            vec![
                "food", "dinner", "tasting", "brunch", "wine", "beer", "cocktail",
                "restaurant", "culinary", "brewery", "bbq",
            ],
        ),
        (
            Category::Business,
            vec![
                "business", "networking", "conference", "seminar", "workshop", "tech",
                "startup", "expo", "summit", "career",
            ],
        ),
    ]
});

const CLUB_KEYWORDS: &[&str] = &["club", "nightclub", "nightlife"];
const PARTY_KEYWORDS: &[&str] = &["party", "parties", "rave"];

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

fn table_match(haystack: &str) -> Option<Category> {
    for (category, keywords) in CATEGORY_KEYWORDS.iter() {
        if keywords.iter().any(|k| haystack.contains(k)) {
            return Some(*category);
        }
    }
    None
}

/// Classify an event. `start_hour` is the local start hour (0-23) when the
/// provider supplied one; it only affects the party/club distinction.
pub fn classify(
    tags: &[String],
    venue_subtype: Option<&str>,
    name: &str,
    description: &str,
    start_hour: Option<u32>,
) -> Category {
    let tag_text = tags.join(" ").to_lowercase();

    // Nightlife split: club-tagged evening/late-night events, party-tagged
    // afternoon events, everything else party-tagged.
    if contains_any(&tag_text, CLUB_KEYWORDS) {
        if let Some(hour) = start_hour {
            if hour >= 18 || hour <= 6 {
                return Category::ClubEvents;
            }
        }
    }
    if contains_any(&tag_text, PARTY_KEYWORDS) {
        if let Some(hour) = start_hour {
            if (12..18).contains(&hour) {
                return Category::DayParties;
            }
        }
        return Category::Parties;
    }

    if let Some(category) = table_match(&tag_text) {
        return category;
    }
    if let Some(subtype) = venue_subtype {
        if let Some(category) = table_match(&subtype.to_lowercase()) {
            return category;
        }
    }
    let free_text = format!("{} {}", name, description).to_lowercase();
    if let Some(category) = table_match(&free_text) {
        return category;
    }

    Category::General
}
