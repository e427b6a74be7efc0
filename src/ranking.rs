//! Ranking and selection pipeline.
//!
//! collected -> filtered -> distance-checked -> scored -> grouped -> persisted
//!
//! One parameterised pipeline serves the whole-day, single-meeting and
//! single-race flows, with top-N or threshold selection.

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::{debug, info};

use crate::config::{RankingConfig, SimulationConfig};
use crate::distance::to_furlongs;
use crate::form::AggregatedForm;
use crate::preference::preferred_distance;
use crate::scoring::{PointsStrategy, ScoredSelection};
use crate::simulation::MonteCarloStrategy;
use crate::storage::{FormRecord, Prediction, RaceRepository, Runner};
use crate::strategy::{FieldEntry, RaceField, RankingStrategy, StrategyKind};

/// How many runners are kept per race
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SelectionMode {
    /// Highest `n` values per race
    TopN(usize),
    /// Every runner scoring at least this much
    Threshold(f64),
}

/// Which runners of the day take part in a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
    pub event_name: Option<String>,
    pub event_time: Option<String>,
}

impl Scope {
    pub fn day() -> Self {
        Self::default()
    }

    pub fn new(event_name: Option<String>, event_time: Option<String>) -> Self {
        Self {
            event_name,
            event_time,
        }
    }
}

/// Why a runner was dropped before scoring
#[derive(Debug, Clone, PartialEq)]
pub enum DropReason {
    NoForm,
    RaceYearBlacklisted(i32),
    PositionBlacklisted(String),
    AgeBlacklisted(u32),
    TooOld(u32),
    HandicapRace,
    DistanceMismatch { preferred: Option<f64>, race: f64 },
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::NoForm => write!(f, "no historical form"),
            DropReason::RaceYearBlacklisted(year) => write!(f, "ran in blacklisted year {}", year),
            DropReason::PositionBlacklisted(pos) => {
                write!(f, "has blacklisted finishing position {}", pos)
            }
            DropReason::AgeBlacklisted(age) => write!(f, "blacklisted age {}", age),
            DropReason::TooOld(age) => write!(f, "too old ({})", age),
            DropReason::HandicapRace => write!(f, "handicap race"),
            DropReason::DistanceMismatch { preferred, race } => match preferred {
                Some(p) => write!(f, "prefers {:.1}f, race is {:.1}f", p, race),
                None => write!(f, "no preferred distance, race is {:.1}f", race),
            },
        }
    }
}

/// Counts at each pipeline stage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RankingStats {
    pub collected: usize,
    pub filtered: usize,
    pub distance_checked: usize,
    pub scored: usize,
    pub selected: usize,
    pub persisted: usize,
}

/// Result of one ranking run
#[derive(Debug, Clone)]
pub struct RankingOutcome {
    pub selections: Vec<ScoredSelection>,
    pub predictions: Vec<Prediction>,
    pub stats: RankingStats,
}

/// The ranking pipeline
pub struct Ranker {
    config: RankingConfig,
    strategy: Box<dyn RankingStrategy + Send + Sync>,
}

impl Ranker {
    pub fn new(config: RankingConfig, strategy: Box<dyn RankingStrategy + Send + Sync>) -> Self {
        Self { config, strategy }
    }

    pub fn from_config(ranking: &RankingConfig, simulation: &SimulationConfig) -> Self {
        let strategy: Box<dyn RankingStrategy + Send + Sync> = match ranking.strategy {
            StrategyKind::Points => Box::new(PointsStrategy),
            StrategyKind::MonteCarlo => Box::new(MonteCarloStrategy {
                num_simulations: simulation.num_simulations,
                seed: simulation.seed,
            }),
        };
        Self::new(ranking.clone(), strategy)
    }

    /// Run the full pipeline against the repository.
    ///
    /// With `persist`, the scope's predictions for the date are replaced
    /// atomically by the new selections.
    pub fn run(
        &self,
        repo: &mut RaceRepository,
        date: NaiveDate,
        scope: &Scope,
        persist: bool,
    ) -> Result<RankingOutcome> {
        let runners = repo
            .get_runners(date, scope.event_name.as_deref(), scope.event_time.as_deref())
            .context("Failed to load runners")?;

        let ids: Vec<i64> = runners.iter().map(|r| r.selection_id).collect();
        let form = repo
            .get_form_for_selections(&ids)
            .context("Failed to load historical form")?;

        let mut outcome = self.rank_runners(runners, &form);

        if persist {
            outcome.stats.persisted = repo
                .replace_predictions(
                    date,
                    scope.event_name.as_deref(),
                    scope.event_time.as_deref(),
                    &outcome.predictions,
                )
                .context("Failed to persist predictions")?;
            info!(
                "Persisted {} predictions for {}",
                outcome.stats.persisted, date
            );
        }

        Ok(outcome)
    }

    /// Filter, score, group and select. Pure: no I/O.
    pub fn rank_runners(
        &self,
        runners: Vec<Runner>,
        form_rows: &HashMap<i64, Vec<FormRecord>>,
    ) -> RankingOutcome {
        let mut stats = RankingStats {
            collected: runners.len(),
            ..Default::default()
        };

        // Filter
        let mut survivors: Vec<(Runner, AggregatedForm)> = Vec::new();
        for runner in runners {
            let rows = form_rows
                .get(&runner.selection_id)
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            let form = AggregatedForm::from_rows(runner.selection_id, rows);

            match self.exclusion(&runner, &form) {
                Some(reason) => debug!(
                    "Dropping {} ({}): {}",
                    runner.selection_name, runner.selection_id, reason
                ),
                None => survivors.push((runner, form)),
            }
        }
        stats.filtered = survivors.len();

        // Distance fit
        survivors.retain(|(runner, form)| match self.distance_mismatch(runner, form) {
            Some(reason) => {
                debug!(
                    "Dropping {} ({}): {}",
                    runner.selection_name, runner.selection_id, reason
                );
                false
            }
            None => true,
        });
        stats.distance_checked = survivors.len();

        // Shared limit: the smallest run count among survivors
        let limit = survivors
            .iter()
            .map(|(_, form)| form.run_count)
            .min()
            .unwrap_or(0);

        // Group by race, then score each race's field
        let mut races: BTreeMap<(String, String), Vec<usize>> = BTreeMap::new();
        for (i, (runner, _)) in survivors.iter().enumerate() {
            races
                .entry((runner.event_time.clone(), runner.event_name.clone()))
                .or_default()
                .push(i);
        }

        let mut selections = Vec::new();
        for ((event_time, event_name), members) in &races {
            let field = RaceField {
                entries: members
                    .iter()
                    .map(|&i| FieldEntry {
                        runner: &survivors[i].0,
                        form: &survivors[i].1,
                    })
                    .collect(),
                limit,
            };

            let ranked = self.strategy.rank(&field);
            stats.scored += ranked.len();

            let kept: Vec<_> = match self.config.selection_mode() {
                SelectionMode::TopN(n) => ranked.into_iter().take(n).collect(),
                SelectionMode::Threshold(min) => {
                    ranked.into_iter().filter(|r| r.value >= min).collect()
                }
            };

            debug!(
                "{} {}: {} of {} runners selected by {}",
                event_time,
                event_name,
                kept.len(),
                members.len(),
                self.strategy.name()
            );

            for r in kept {
                if let Some(&i) = members
                    .iter()
                    .find(|&&i| survivors[i].0.selection_id == r.selection_id)
                {
                    let (runner, form) = &survivors[i];
                    selections.push(ScoredSelection::new(
                        runner.clone(),
                        form.clone(),
                        r.value,
                        limit,
                    ));
                }
            }
        }
        stats.selected = selections.len();

        info!(
            "Ranking: {} collected, {} filtered, {} distance-checked, {} scored, {} selected (limit {})",
            stats.collected,
            stats.filtered,
            stats.distance_checked,
            stats.scored,
            stats.selected,
            limit
        );

        let predictions = selections.iter().map(to_prediction).collect();

        RankingOutcome {
            selections,
            predictions,
            stats,
        }
    }

    /// Exclusion rules; any match drops the runner
    fn exclusion(&self, runner: &Runner, form: &AggregatedForm) -> Option<DropReason> {
        if !form.has_form() {
            return Some(DropReason::NoForm);
        }

        if let Some(year) = form
            .dates
            .iter()
            .map(|d| d.year())
            .find(|y| self.config.race_year_blacklist.contains(y))
        {
            return Some(DropReason::RaceYearBlacklisted(year));
        }

        if let Some(position) = form.positions.iter().find(|p| {
            self.config
                .position_blacklist
                .iter()
                .any(|b| b.trim().eq_ignore_ascii_case(p.trim()))
        }) {
            return Some(DropReason::PositionBlacklisted(position.clone()));
        }

        if let Some(age) = form.age {
            if self.config.age_blacklist.contains(&age) {
                return Some(DropReason::AgeBlacklisted(age));
            }
            if age > self.config.max_age {
                return Some(DropReason::TooOld(age));
            }
        }

        let term = self.config.excluded_race_link_term.to_lowercase();
        if !term.is_empty() {
            if let Some(link) = &runner.race_link {
                if link.to_lowercase().contains(&term) {
                    return Some(DropReason::HandicapRace);
                }
            }
        }

        None
    }

    fn distance_mismatch(&self, runner: &Runner, form: &AggregatedForm) -> Option<DropReason> {
        let race = to_furlongs(&runner.distance);
        let preferred = preferred_distance(&form.positions, &form.distances);

        match preferred {
            Some(p) if (p - race).abs() <= self.config.max_distance_gap => None,
            _ => Some(DropReason::DistanceMismatch { preferred, race }),
        }
    }
}

fn to_prediction(s: &ScoredSelection) -> Prediction {
    Prediction {
        event_date: s.runner.event_date,
        event_time: s.runner.event_time.clone(),
        event_name: s.runner.event_name.clone(),
        selection_id: s.runner.selection_id,
        selection_name: s.runner.selection_name.clone(),
        odds: s.runner.price.clone(),
        clean_bet_score: s.total_score,
        average_position: s.average_position,
        average_rating: s.average_rating,
        trainer: s.trainer.clone(),
        selection_position: None,
        current_event_price: None,
    }
}
