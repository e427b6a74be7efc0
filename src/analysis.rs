//! Single-race analyses: Monte Carlo win probabilities and race picks.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tracing::info;

use crate::config::SimulationConfig;
use crate::form::AggregatedForm;
use crate::picks::{is_exact_match, match_probability, FormProfile, OptimalParams};
use crate::simulation::MonteCarloStrategy;
use crate::storage::{RaceRepository, Runner};
use crate::strategy::{FieldEntry, RaceField, RankingStrategy};
use crate::types::{RacePick, SimulationEntry};

/// Runners of one race with their aggregated form
fn load_race(
    repo: &RaceRepository,
    date: NaiveDate,
    event_name: &str,
    event_time: &str,
) -> Result<Vec<(Runner, AggregatedForm)>> {
    let runners = repo
        .get_runners(date, Some(event_name), Some(event_time))
        .context("Failed to load runners")?;
    let ids: Vec<i64> = runners.iter().map(|r| r.selection_id).collect();
    let mut form = repo
        .get_form_for_selections(&ids)
        .context("Failed to load historical form")?;

    Ok(runners
        .into_iter()
        .map(|r| {
            let rows = form.remove(&r.selection_id).unwrap_or_default();
            let aggregated = AggregatedForm::from_rows(r.selection_id, &rows);
            (r, aggregated)
        })
        .collect())
}

/// Win probability per runner, highest first
pub fn monte_carlo(
    repo: &RaceRepository,
    config: &SimulationConfig,
    date: NaiveDate,
    event_name: &str,
    event_time: &str,
) -> Result<Vec<SimulationEntry>> {
    let race = load_race(repo, date, event_name, event_time)?;
    let field = RaceField {
        entries: race
            .iter()
            .map(|(runner, form)| FieldEntry { runner, form })
            .collect(),
        limit: 0,
    };

    let strategy = MonteCarloStrategy {
        num_simulations: config.num_simulations,
        seed: config.seed,
    };
    let ranked = strategy.rank(&field);

    let entries: Vec<SimulationEntry> = ranked
        .iter()
        .filter_map(|r| {
            let (runner, _) = race
                .iter()
                .find(|(runner, _)| runner.selection_id == r.selection_id)?;
            Some(SimulationEntry {
                selection_id: runner.selection_id,
                selection_name: runner.selection_name.clone(),
                event_name: runner.event_name.clone(),
                event_time: runner.event_time.clone(),
                odds: runner.price.clone(),
                win_probability: r.value,
            })
        })
        .collect();

    info!(
        "Simulated {} {} on {}: {} runners, {} trials",
        event_time,
        event_name,
        date,
        entries.len(),
        config.num_simulations
    );
    Ok(entries)
}

/// Runners matching every optimal parameter
pub fn race_picks(
    repo: &RaceRepository,
    date: NaiveDate,
    event_name: &str,
    event_time: &str,
    params: &OptimalParams,
) -> Result<Vec<RacePick>> {
    let race = load_race(repo, date, event_name, event_time)?;
    let total = race.len();

    let picks: Vec<RacePick> = race
        .into_iter()
        .filter(|(_, form)| form.has_form())
        .filter_map(|(runner, form)| {
            let profile = FormProfile::from(&form);
            let probability = match_probability(&profile, params);
            if !is_exact_match(probability) {
                return None;
            }
            Some(RacePick {
                selection_id: runner.selection_id,
                selection_name: runner.selection_name,
                event_name: runner.event_name,
                event_time: runner.event_time,
                odds: runner.price,
                num_runs: form.run_count,
                num_years_in_competition: profile.num_years_in_competition,
                num_wins: form.win_count,
                rating: profile.rating,
                position: profile.position,
                distance: profile.distance,
                probability,
            })
        })
        .collect();

    info!(
        "Race picks {} {} on {}: {} of {} runners match",
        event_time,
        event_name,
        date,
        picks.len(),
        total
    );
    Ok(picks)
}
