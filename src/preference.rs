//! Distance preference and bounded average finishing position.

use crate::distance::to_furlongs;
use crate::position::FinishingPosition;

/// Preferred race distance in furlongs.
///
/// Races are bucketed by distance and each bucket scored by the mean of
/// `rank / field_size`. The lowest mean wins; ties go to the bucket seen
/// first (most recent). Entries without a field size are skipped.
pub fn preferred_distance<P, D>(positions: &[P], distances: &[D]) -> Option<f64>
where
    P: AsRef<str>,
    D: AsRef<str>,
{
    // (distance, sum of ratios, count), kept in encounter order
    let mut buckets: Vec<(f64, f64, usize)> = Vec::new();

    for (position, distance) in positions.iter().zip(distances) {
        let Some((rank, field)) = FinishingPosition::parse(position.as_ref()).rank_and_field()
        else {
            continue;
        };

        let furlongs = to_furlongs(distance.as_ref());
        let ratio = rank as f64 / field as f64;

        match buckets.iter_mut().find(|(d, _, _)| *d == furlongs) {
            Some(bucket) => {
                bucket.1 += ratio;
                bucket.2 += 1;
            }
            None => buckets.push((furlongs, ratio, 1)),
        }
    }

    let mut best: Option<(f64, f64)> = None;
    for (distance, sum, count) in buckets {
        let score = sum / count as f64;
        match best {
            Some((_, best_score)) if score >= best_score => {}
            _ => best = Some((distance, score)),
        }
    }

    best.map(|(distance, _)| distance)
}

/// Average of the rank numerators of the first `limit` positions.
///
/// `limit` is clamped to the available entries. Entries whose numerator
/// does not parse are skipped and excluded from the denominator.
pub fn average_position<P: AsRef<str>>(positions: &[P], limit: usize) -> Option<f64> {
    let take = limit.min(positions.len());

    let ranks: Vec<f64> = positions[..take]
        .iter()
        .filter_map(|p| {
            let numerator = p.as_ref().split('/').next()?.trim();
            numerator.parse::<i64>().ok()
        })
        .map(|r| r as f64)
        .collect();

    if ranks.is_empty() {
        return None;
    }

    Some(ranks.iter().sum::<f64>() / ranks.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average_position_bounded() {
        let positions = ["1/10", "2/10", "3/10"];
        assert_eq!(average_position(&positions, 2), Some(1.5));
    }

    #[test]
    fn test_average_position_clamps_limit() {
        let positions = ["1/10", "3/10"];
        assert_eq!(average_position(&positions, 10), Some(2.0));
        assert_eq!(average_position(&positions, 0), None);
    }

    #[test]
    fn test_average_position_skips_unparseable() {
        let positions = ["PU", "4/10", "2/10"];
        assert_eq!(average_position(&positions, 3), Some(3.0));
        assert_eq!(average_position(&["F"], 1), None);
    }

    #[test]
    fn test_preferred_distance_lowest_mean_ratio() {
        let positions = ["5/10", "1/10", "2/10", "8/10"];
        let distances = ["1m", "1m 2f", "1m 2f", "1m"];
        assert_eq!(preferred_distance(&positions, &distances), Some(10.0));
    }

    #[test]
    fn test_preferred_distance_tie_takes_first() {
        let positions = ["2/10", "1/5"];
        let distances = ["6f", "7f"];
        assert_eq!(preferred_distance(&positions, &distances), Some(6.0));
    }

    #[test]
    fn test_preferred_distance_skips_non_conforming() {
        let positions = ["1", "PU", "3/6"];
        let distances = ["5f", "6f", "2m"];
        assert_eq!(preferred_distance(&positions, &distances), Some(16.0));
        assert_eq!(preferred_distance(&["1", "F"], &["5f", "6f"]), None);
    }
}
