//! Form aggregation: fold a runner's historical rows into summary statistics.

use chrono::NaiveDate;
use serde::Serialize;

use crate::distance::to_furlongs;
use crate::parse::{parse_age, parse_price};
use crate::position::FinishingPosition;
use crate::storage::FormRecord;

/// Summary of all historical races for one selection.
///
/// Lists are ordered most recent first and all have `run_count` entries.
/// Averages are `None` when no row carries a usable value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregatedForm {
    /// 0 when the selection has no form (excluded from ranking)
    pub selection_id: i64,
    pub run_count: usize,
    pub win_count: usize,
    pub average_position: Option<f64>,
    pub average_rating: Option<f64>,
    /// Furlongs
    pub average_distance: Option<f64>,
    pub average_odds: Option<f64>,
    pub positions: Vec<String>,
    pub distances: Vec<String>,
    pub courses: Vec<String>,
    pub dates: Vec<NaiveDate>,
    pub last_run: Option<NaiveDate>,
    /// Days between the first and the most recent run
    pub duration_days: i64,
    pub age: Option<u32>,
    pub sex: Option<String>,
    pub trainer: Option<String>,
    pub sire: Option<String>,
    pub dam: Option<String>,
    pub owner: Option<String>,
}

impl AggregatedForm {
    /// Fold form rows for one selection.
    pub fn from_rows(selection_id: i64, rows: &[FormRecord]) -> Self {
        if rows.is_empty() {
            return Self::default();
        }

        let mut rows: Vec<&FormRecord> = rows.iter().collect();
        rows.sort_by(|a, b| b.race_date.cmp(&a.race_date));

        let parsed: Vec<FinishingPosition> = rows
            .iter()
            .map(|r| FinishingPosition::parse(&r.position))
            .collect();

        let last_run = rows.first().map(|r| r.race_date);
        let first_run = rows.last().map(|r| r.race_date);
        let duration_days = match (first_run, last_run) {
            (Some(first), Some(last)) => (last - first).num_days(),
            _ => 0,
        };

        Self {
            selection_id,
            run_count: rows.len(),
            win_count: parsed.iter().filter(|p| p.is_win()).count(),
            average_position: mean(parsed.iter().filter_map(|p| p.rank().map(f64::from))),
            average_rating: mean(rows.iter().filter_map(|r| r.rating)),
            average_distance: mean(
                rows.iter()
                    .map(|r| to_furlongs(&r.distance))
                    .filter(|d| *d > 0.0),
            ),
            average_odds: mean(
                rows.iter()
                    .filter_map(|r| r.starting_price.as_deref().and_then(parse_price)),
            ),
            positions: rows.iter().map(|r| r.position.clone()).collect(),
            distances: rows.iter().map(|r| r.distance.clone()).collect(),
            courses: rows
                .iter()
                .map(|r| r.course.clone().unwrap_or_default())
                .collect(),
            dates: rows.iter().map(|r| r.race_date).collect(),
            last_run,
            duration_days,
            age: latest(&rows, |r| r.age.as_deref().and_then(parse_age)),
            sex: latest(&rows, |r| r.sex.clone()),
            trainer: latest(&rows, |r| r.trainer.clone()),
            sire: latest(&rows, |r| r.sire.clone()),
            dam: latest(&rows, |r| r.dam.clone()),
            owner: latest(&rows, |r| r.owner.clone()),
        }
    }

    pub fn has_form(&self) -> bool {
        self.selection_id != 0 && self.run_count > 0
    }

    pub fn years_in_competition(&self) -> f64 {
        self.duration_days as f64 / 365.25
    }
}

/// Arithmetic mean, `None` for an empty iterator
pub fn mean<I: IntoIterator<Item = f64>>(values: I) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}

/// First non-empty value, most recent row first
fn latest<T, F>(rows: &[&FormRecord], f: F) -> Option<T>
where
    F: Fn(&FormRecord) -> Option<T>,
{
    rows.iter().find_map(|r| f(r))
}
