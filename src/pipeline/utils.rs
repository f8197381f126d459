//! String similarity and geo helpers used by dedup and scoring.

use crate::common::types::Coordinates;

/// Mean Earth radius in miles. All distances in this crate are miles.
const EARTH_RADIUS_MILES: f64 = 3958.8;

/// Normalize a title or venue string for fuzzy matching: lowercase, strip
/// non-alphanumerics, collapse whitespace.
pub fn normalize_for_match(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_was_space = true;
    for ch in text.chars() {
        if ch.is_alphanumeric() {
            out.extend(ch.to_lowercase());
            last_was_space = false;
        } else if !last_was_space {
            out.push(' ');
            last_was_space = true;
        }
    }
    out.trim_end().to_string()
}

/// Normalized edit-distance similarity in [0, 1]:
/// `1 - levenshtein(a, b) / max(len(a), len(b))`. Symmetric.
pub fn similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }

    let len_a = a.chars().count();
    let len_b = b.chars().count();
    if len_a == 0 || len_b == 0 {
        return 0.0;
    }

    let distance = levenshtein_distance(a, b);
    1.0 - (distance as f64 / len_a.max(len_b) as f64)
}

fn levenshtein_distance(a: &str, b: &str) -> usize {
    let chars_a: Vec<char> = a.chars().collect();
    let chars_b: Vec<char> = b.chars().collect();
    let len_a = chars_a.len();
    let len_b = chars_b.len();

    let mut matrix = vec![vec![0; len_b + 1]; len_a + 1];

    for (i, row) in matrix.iter_mut().enumerate() {
        row[0] = i;
    }
    for j in 0..=len_b {
        matrix[0][j] = j;
    }

    for i in 1..=len_a {
        for j in 1..=len_b {
            let cost = if chars_a[i - 1] == chars_b[j - 1] { 0 } else { 1 };
            matrix[i][j] = (matrix[i - 1][j] + 1)
                .min(matrix[i][j - 1] + 1)
                .min(matrix[i - 1][j - 1] + cost);
        }
    }

    matrix[len_a][len_b]
}

/// Great-circle distance between two points, in miles.
pub fn haversine_miles(a: Coordinates, b: Coordinates) -> f64 {
    let lat_a = a.lat.to_radians();
    let lat_b = b.lat.to_radians();
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_MILES * h.sqrt().asin()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_punctuation_and_case() {
        assert_eq!(normalize_for_match("Jazz Night — Downtown!"), "jazz night downtown");
        assert_eq!(normalize_for_match("  The   Blue*Note  "), "the blue note");
    }

    #[test]
    fn similarity_is_symmetric() {
        let pairs = [
            ("jazz night downtown", "jazz nite downtown"),
            ("blue note chicago", "the blue note"),
            ("", "anything"),
        ];
        for (a, b) in pairs {
            assert_eq!(similarity(a, b), similarity(b, a));
        }
    }

    #[test]
    fn similarity_bounds() {
        assert_eq!(similarity("same", "same"), 1.0);
        assert_eq!(similarity("", ""), 1.0);
        assert_eq!(similarity("abc", ""), 0.0);
        let s = similarity("jazz night downtown", "jazz nite downtown");
        assert!(s > 0.8 && s < 1.0);
    }

    #[test]
    fn haversine_known_distance() {
        // Seattle to Portland is roughly 145 miles
        let seattle = Coordinates { lat: 47.6062, lng: -122.3321 };
        let portland = Coordinates { lat: 45.5152, lng: -122.6784 };
        let d = haversine_miles(seattle, portland);
        assert!((140.0..150.0).contains(&d), "got {d}");
    }

    #[test]
    fn haversine_zero_for_same_point() {
        let p = Coordinates { lat: 41.8781, lng: -87.6298 };
        assert_eq!(haversine_miles(p, p), 0.0);
    }
}
