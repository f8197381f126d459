//! Deduplication engine: collapses near-duplicate listings contributed by
//! different providers using fuzzy similarity over title, date, and venue.
//!
//! Greedy single pass against the accepted-unique list. Not guaranteed to
//! find a globally optimal partition, but deterministic for a fixed input
//! order, which the tests rely on.

use tracing::debug;

use crate::common::constants::HIGH_TRUST_PROVIDER;
use crate::common::types::SourcedEvent;
use crate::observability::metrics;
use crate::pipeline::utils::{normalize_for_match, similarity};

pub struct DedupEngine {
    title_threshold: f64,
    location_threshold: f64,
}

impl Default for DedupEngine {
    fn default() -> Self {
        Self {
            title_threshold: 0.8,
            location_threshold: 0.7,
        }
    }
}

impl DedupEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Two events describe the same happening iff their titles are close
    /// and either the display dates match exactly or the venues are close.
    /// Symmetric by construction.
    pub fn is_duplicate(&self, a: &SourcedEvent, b: &SourcedEvent) -> bool {
        let title_similarity = similarity(
            &normalize_for_match(&a.event.title),
            &normalize_for_match(&b.event.title),
        );
        if title_similarity <= self.title_threshold {
            return false;
        }
        if a.event.date == b.event.date {
            return true;
        }
        let location_similarity = similarity(
            &normalize_for_match(&a.event.location),
            &normalize_for_match(&b.event.location),
        );
        location_similarity > self.location_threshold
    }

    /// O(n²) pairwise collapse; result sets run in the low hundreds.
    pub fn dedupe(&self, events: Vec<SourcedEvent>) -> Vec<SourcedEvent> {
        metrics::dedup::candidates(events.len() as u64);

        let mut unique: Vec<SourcedEvent> = Vec::with_capacity(events.len());
        let mut merged_count: u64 = 0;

        for candidate in events {
            match unique.iter().position(|kept| self.is_duplicate(kept, &candidate)) {
                Some(index) => {
                    merged_count += 1;
                    debug!(
                        title = %candidate.event.title,
                        kept_provider = %unique[index].source.provider,
                        candidate_provider = %candidate.source.provider,
                        "merging duplicate listing"
                    );
                    if Self::outranks(&candidate, &unique[index]) {
                        let mut winner = candidate;
                        Self::absorb(&mut winner, &unique[index]);
                        unique[index] = winner;
                    } else {
                        let loser = candidate;
                        Self::absorb(&mut unique[index], &loser);
                    }
                }
                None => unique.push(candidate),
            }
        }

        metrics::dedup::merged(merged_count);
        unique
    }

    /// Winner selection: higher source confidence, with the ticketing
    /// platform breaking exact ties.
    fn outranks(challenger: &SourcedEvent, incumbent: &SourcedEvent) -> bool {
        if challenger.source.confidence > incumbent.source.confidence {
            return true;
        }
        if challenger.source.confidence < incumbent.source.confidence {
            return false;
        }
        challenger.source.provider == HIGH_TRUST_PROVIDER
            && incumbent.source.provider != HIGH_TRUST_PROVIDER
    }

    /// The winner opportunistically absorbs fields the loser knows better.
    fn absorb(winner: &mut SourcedEvent, loser: &SourcedEvent) {
        if !winner.event.has_real_description() && loser.event.has_real_description() {
            winner.event.description = loser.event.description.clone();
        }
        if winner.event.coordinates.is_none() {
            winner.event.coordinates = loser.event.coordinates;
            winner.distance_miles = loser.distance_miles;
        }
        if !winner.event.has_known_price() && loser.event.has_known_price() {
            winner.event.price = loser.event.price.clone();
        }
        if winner.event.image_url.is_none() {
            winner.event.image_url = loser.event.image_url.clone();
        }
        if winner.event.attendees.is_none() {
            winner.event.attendees = loser.event.attendees;
        }
        if winner.start_at.is_none() {
            winner.start_at = loser.start_at;
            winner.local_start = loser.local_start;
        }
        for link in &loser.event.ticket_links {
            if !winner.event.ticket_links.iter().any(|l| l.link == link.link) {
                winner.event.ticket_links.push(link.clone());
            }
        }
        for tag in &loser.event.tags {
            if !winner.event.tags.contains(tag) {
                winner.event.tags.push(tag.clone());
            }
        }
    }
}
