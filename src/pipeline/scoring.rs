//! Relevance scoring: a [0, 1] value combining proximity, recency, and
//! user-preference match.

use chrono::{DateTime, Utc};

use crate::common::types::{Category, UserPreferences};

/// Base score plus up to +0.3 for proximity and +0.2 for recency, clamped
/// to [0, 1]. `now` is injected so tests are deterministic.
pub fn score(
    start_at: Option<DateTime<Utc>>,
    distance_miles: Option<f64>,
    now: DateTime<Utc>,
) -> f64 {
    let mut score = 0.5;

    if let Some(distance) = distance_miles {
        score += if distance <= 5.0 {
            0.3
        } else if distance <= 15.0 {
            0.2
        } else if distance <= 30.0 {
            0.1
        } else {
            0.0
        };
    }

    if let Some(start) = start_at {
        if start >= now {
            let days_out = (start - now).num_days();
            score += if days_out <= 7 {
                0.2
            } else if days_out <= 30 {
                0.1
            } else {
                0.0
            };
        }
    }

    score.clamp(0.0, 1.0)
}

/// Flat +0.2 boost for a favorite-category hit, applied after initial
/// scoring and clamped again.
pub fn apply_preference_boost(
    score: f64,
    category: Category,
    preferences: Option<&UserPreferences>,
) -> f64 {
    match preferences {
        Some(prefs) if prefs.favorite_categories.contains(&category) => {
            (score + 0.2).clamp(0.0, 1.0)
        }
        _ => score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2023-07-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn base_score_without_signals() {
        assert_close(score(None, None, now()), 0.5);
    }

    #[test]
    fn proximity_tiers() {
        assert_close(score(None, Some(3.0), now()), 0.8);
        assert_close(score(None, Some(10.0), now()), 0.7);
        assert_close(score(None, Some(25.0), now()), 0.6);
        assert_close(score(None, Some(100.0), now()), 0.5);
    }

    #[test]
    fn recency_tiers() {
        let soon = now() + Duration::days(3);
        let this_month = now() + Duration::days(20);
        let far_out = now() + Duration::days(90);
        let past = now() - Duration::days(1);

        assert_close(score(Some(soon), None, now()), 0.7);
        assert_close(score(Some(this_month), None, now()), 0.6);
        assert_close(score(Some(far_out), None, now()), 0.5);
        assert_close(score(Some(past), None, now()), 0.5);
    }

    #[test]
    fn score_is_bounded_for_all_inputs() {
        let distances = [None, Some(0.0), Some(4.9), Some(14.9), Some(29.9), Some(1e6)];
        let starts = [
            None,
            Some(now() - Duration::days(400)),
            Some(now()),
            Some(now() + Duration::days(1)),
            Some(now() + Duration::days(29)),
            Some(now() + Duration::days(4000)),
        ];
        for d in distances {
            for s in starts {
                let value = score(s, d, now());
                assert!((0.0..=1.0).contains(&value), "score {value} out of bounds");
            }
        }
    }

    #[test]
    fn preference_boost_is_flat_and_clamped() {
        let prefs = UserPreferences {
            favorite_categories: vec![Category::Music],
            ..Default::default()
        };

        assert_close(apply_preference_boost(0.5, Category::Music, Some(&prefs)), 0.7);
        assert_close(apply_preference_boost(0.5, Category::Sports, Some(&prefs)), 0.5);
        assert_close(apply_preference_boost(0.5, Category::Music, None), 0.5);
        assert_close(apply_preference_boost(0.95, Category::Music, Some(&prefs)), 1.0);
    }
}
