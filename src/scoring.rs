//! Additive points scorer.
//!
//! Every rule is evaluated independently and the points are summed.
//! Unparseable inputs simply contribute nothing.

use serde::Serialize;

use crate::distance::{to_furlongs, LONG_DISTANCE_FURLONGS};
use crate::form::{mean, AggregatedForm};
use crate::position::FinishingPosition;
use crate::preference::average_position;
use crate::storage::Runner;
use crate::strategy::{sort_ranked, RaceField, Ranked, RankingStrategy};

const GELDING_POINTS: f64 = 5.0;
const LONGEVITY_POINTS: f64 = 5.0;
const LONGEVITY_MAX_YEARS: f64 = 4.0;
const AGE_FIT_POINTS: f64 = 5.0;
const EXPERIENCE_POINTS: f64 = 5.0;
const EXPERIENCE_MAX_RUNS: usize = 10;
const ODDS_POINTS: f64 = 5.0;
const ODDS_MAX: f64 = 10.0;
const NON_FINISH_PENALTY: f64 = -5.0;
const MALFORMED_PENALTY: f64 = -1.0;
const POSITION_MULTIPLIER: f64 = 10.0;
const DISTANCE_EPSILON: f64 = 1e-9;

/// Race-day inputs to the scorer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaceParams {
    /// Current race distance in furlongs
    pub distance: f64,
}

impl RaceParams {
    pub fn for_runner(runner: &Runner) -> Self {
        Self {
            distance: to_furlongs(&runner.distance),
        }
    }
}

/// Points per rule
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub sex: f64,
    pub longevity: f64,
    pub age_distance: f64,
    pub experience: f64,
    pub rating: f64,
    pub odds: f64,
    pub distance_fit: f64,
    pub position_history: f64,
}

impl ScoreBreakdown {
    pub fn total(&self) -> f64 {
        self.sex
            + self.longevity
            + self.age_distance
            + self.experience
            + self.rating
            + self.odds
            + self.distance_fit
            + self.position_history
    }
}

/// Score one selection against the current race.
///
/// `limit` bounds how many recent runs feed the distance-fit and
/// position-history rules.
pub fn score(form: &AggregatedForm, race: &RaceParams, limit: usize) -> f64 {
    breakdown(form, race, limit).total()
}

pub fn breakdown(form: &AggregatedForm, race: &RaceParams, limit: usize) -> ScoreBreakdown {
    ScoreBreakdown {
        sex: sex_points(form.sex.as_deref()),
        longevity: longevity_points(form),
        age_distance: age_distance_points(form.age, race.distance),
        experience: experience_points(form.run_count),
        rating: form.average_rating.map(rating_points).unwrap_or(0.0),
        odds: match form.average_odds {
            Some(odds) if odds < ODDS_MAX => ODDS_POINTS,
            _ => 0.0,
        },
        distance_fit: distance_fit(form, race.distance, limit),
        position_history: position_history_points(&form.positions, limit),
    }
}

fn sex_points(sex: Option<&str>) -> f64 {
    match sex {
        Some(s) if s.trim().eq_ignore_ascii_case("gelding") => GELDING_POINTS,
        _ => 0.0,
    }
}

fn longevity_points(form: &AggregatedForm) -> f64 {
    if form.run_count > 0 && form.years_in_competition() < LONGEVITY_MAX_YEARS {
        LONGEVITY_POINTS
    } else {
        0.0
    }
}

fn age_distance_points(age: Option<u32>, race_distance: f64) -> f64 {
    let Some(age) = age else {
        return 0.0;
    };
    if race_distance <= 0.0 {
        return 0.0;
    }

    let fits = if race_distance < LONG_DISTANCE_FURLONGS {
        age <= 7
    } else {
        (4..=8).contains(&age)
    };

    if fits {
        AGE_FIT_POINTS
    } else {
        0.0
    }
}

fn experience_points(run_count: usize) -> f64 {
    if run_count < EXPERIENCE_MAX_RUNS {
        EXPERIENCE_POINTS
    } else {
        0.0
    }
}

/// Rating bands: (0,10) 2.5, [10,20) 5, [20,40) 7.5, [40,inf) 10
pub fn rating_points(rating: f64) -> f64 {
    if rating >= 40.0 {
        10.0
    } else if rating >= 20.0 {
        7.5
    } else if rating >= 10.0 {
        5.0
    } else if rating > 0.0 {
        2.5
    } else {
        0.0
    }
}

fn distance_fit(form: &AggregatedForm, race_distance: f64, limit: usize) -> f64 {
    if race_distance <= 0.0 {
        return 0.0;
    }

    let recent = mean(
        form.distances
            .iter()
            .take(limit)
            .map(|d| to_furlongs(d))
            .filter(|d| *d > 0.0),
    );

    match recent {
        Some(avg) => distance_fit_points((avg - race_distance).abs(), race_distance),
        None => 0.0,
    }
}

/// Points for the gap between historical and current distance (furlongs).
///
/// Longer races tolerate a wider gap.
pub fn distance_fit_points(gap: f64, race_distance: f64) -> f64 {
    let (close, near, fair) = if race_distance <= LONG_DISTANCE_FURLONGS {
        (0.5, 1.0, 1.5)
    } else {
        (1.5, 2.0, 3.5)
    };

    if gap < DISTANCE_EPSILON {
        30.0
    } else if gap <= close {
        15.0
    } else if gap <= near {
        10.0
    } else if gap <= fair {
        8.0
    } else {
        5.0
    }
}

/// Sum of per-race points over the most recent `limit` finishes
pub fn position_history_points<P: AsRef<str>>(positions: &[P], limit: usize) -> f64 {
    positions
        .iter()
        .take(limit)
        .map(|p| match FinishingPosition::parse(p.as_ref()) {
            FinishingPosition::DidNotFinish(code) if code.is_penalised() => NON_FINISH_PENALTY,
            other => match other.rank_and_field() {
                Some((rank, field)) => (field as f64 / rank as f64).round() * POSITION_MULTIPLIER,
                None => MALFORMED_PENALTY,
            },
        })
        .sum()
}

/// A runner with its form and total score
#[derive(Debug, Clone, Serialize)]
pub struct ScoredSelection {
    pub runner: Runner,
    pub form: AggregatedForm,
    pub total_score: f64,
    pub trainer: Option<String>,
    pub average_rating: f64,
    pub average_position: f64,
}

impl ScoredSelection {
    pub fn new(runner: Runner, form: AggregatedForm, total_score: f64, limit: usize) -> Self {
        let average_position = average_position(&form.positions, limit)
            .or(form.average_position)
            .unwrap_or(0.0);
        Self {
            trainer: form.trainer.clone(),
            average_rating: round2(form.average_rating.unwrap_or(0.0)),
            average_position: round2(average_position),
            runner,
            form,
            total_score,
        }
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// The points scorer as a ranking strategy
#[derive(Debug, Clone, Copy, Default)]
pub struct PointsStrategy;

impl RankingStrategy for PointsStrategy {
    fn name(&self) -> &'static str {
        "points"
    }

    fn rank(&self, field: &RaceField<'_>) -> Vec<Ranked> {
        let mut ranked: Vec<Ranked> = field
            .entries
            .iter()
            .map(|e| Ranked {
                selection_id: e.runner.selection_id,
                value: score(e.form, &RaceParams::for_runner(e.runner), field.limit),
            })
            .collect();
        sort_ranked(&mut ranked);
        ranked
    }
}
