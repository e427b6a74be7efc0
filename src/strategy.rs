//! Pluggable ranking strategies.
//!
//! A strategy turns one race's field into a value per runner, higher is
//! better. The points scorer and the Monte Carlo simulation both
//! implement it, so the ranking pipeline can run either.

use serde::{Deserialize, Serialize};

use crate::form::AggregatedForm;
use crate::storage::Runner;

/// One runner in a race together with its folded form
#[derive(Debug, Clone, Copy)]
pub struct FieldEntry<'a> {
    pub runner: &'a Runner,
    pub form: &'a AggregatedForm,
}

/// The runners of a single race
#[derive(Debug, Clone)]
pub struct RaceField<'a> {
    pub entries: Vec<FieldEntry<'a>>,
    /// Number of recent runs each strategy may look at
    pub limit: usize,
}

/// A strategy's verdict for one runner
#[derive(Debug, Clone, PartialEq)]
pub struct Ranked {
    pub selection_id: i64,
    pub value: f64,
}

pub trait RankingStrategy {
    fn name(&self) -> &'static str;

    /// Rank the field, highest value first
    fn rank(&self, field: &RaceField<'_>) -> Vec<Ranked>;
}

/// Strategy selector used by configuration and requests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    #[default]
    Points,
    MonteCarlo,
}

/// Sort ranked values descending, ties by selection id
pub fn sort_ranked(ranked: &mut [Ranked]) {
    ranked.sort_by(|a, b| {
        b.value
            .partial_cmp(&a.value)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.selection_id.cmp(&b.selection_id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_ranked() {
        let mut ranked = vec![
            Ranked { selection_id: 3, value: 1.0 },
            Ranked { selection_id: 2, value: 5.0 },
            Ranked { selection_id: 1, value: 1.0 },
        ];
        sort_ranked(&mut ranked);
        let ids: Vec<i64> = ranked.iter().map(|r| r.selection_id).collect();
        assert_eq!(ids, vec![2, 1, 3]);
    }
}
