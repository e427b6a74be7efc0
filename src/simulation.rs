//! Monte Carlo win simulation.
//!
//! Each runner gets an unnormalised weight from its form (inverse average
//! finishing position scaled by distance closeness). Every trial draws one
//! winner by weighted selection; the empirical win frequency is the
//! runner's win probability.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::distance::to_furlongs;
use crate::form::AggregatedForm;
use crate::strategy::{sort_ranked, RaceField, Ranked, RankingStrategy};

pub const DEFAULT_NUM_SIMULATIONS: usize = 10_000;

/// Unnormalised win weight for one runner.
///
/// Zero when the runner has no usable form.
pub fn runner_weight(form: &AggregatedForm, race_distance: f64) -> f64 {
    if !form.has_form() {
        return 0.0;
    }

    let Some(avg_position) = form.average_position.filter(|p| *p > 0.0) else {
        return 0.0;
    };

    let closeness = match form.average_distance {
        Some(avg) if race_distance > 0.0 => 1.0 / (1.0 + (avg - race_distance).abs()),
        _ => 1.0,
    };

    (1.0 / avg_position) * closeness
}

/// Pick an index by weighted selection against a uniform draw.
///
/// Falls back to the last index when the weights sum to zero.
pub fn weighted_pick<R: Rng>(weights: &[f64], total: f64, rng: &mut R) -> usize {
    let target = rng.gen::<f64>() * total;
    let mut cumulative = 0.0;

    for (i, w) in weights.iter().enumerate() {
        cumulative += w;
        if target < cumulative {
            return i;
        }
    }

    weights.len().saturating_sub(1)
}

/// Run `num_simulations` trials and return win counts per runner
pub fn simulate_wins<R: Rng>(
    weights: &[f64],
    num_simulations: usize,
    rng: &mut R,
) -> Vec<usize> {
    let mut wins = vec![0usize; weights.len()];
    if weights.is_empty() {
        return wins;
    }

    let total: f64 = weights.iter().sum();
    for _ in 0..num_simulations {
        wins[weighted_pick(weights, total, rng)] += 1;
    }

    wins
}

/// Seed from the wall clock when no fixed seed is configured
pub fn make_rng(seed: Option<u64>) -> StdRng {
    let seed = seed.unwrap_or_else(|| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0)
    });
    StdRng::seed_from_u64(seed)
}

/// Monte Carlo as a ranking strategy.
///
/// One generator per `rank` call; no re-seeding inside the trial loop.
#[derive(Debug, Clone, Copy)]
pub struct MonteCarloStrategy {
    pub num_simulations: usize,
    pub seed: Option<u64>,
}

impl Default for MonteCarloStrategy {
    fn default() -> Self {
        Self {
            num_simulations: DEFAULT_NUM_SIMULATIONS,
            seed: None,
        }
    }
}

impl RankingStrategy for MonteCarloStrategy {
    fn name(&self) -> &'static str {
        "monte_carlo"
    }

    fn rank(&self, field: &RaceField<'_>) -> Vec<Ranked> {
        if field.entries.is_empty() || self.num_simulations == 0 {
            return Vec::new();
        }

        let weights: Vec<f64> = field
            .entries
            .iter()
            .map(|e| runner_weight(e.form, to_furlongs(&e.runner.distance)))
            .collect();

        let mut rng = make_rng(self.seed);
        let wins = simulate_wins(&weights, self.num_simulations, &mut rng);

        let mut ranked: Vec<Ranked> = field
            .entries
            .iter()
            .zip(wins)
            .map(|(e, w)| Ranked {
                selection_id: e.runner.selection_id,
                value: w as f64 / self.num_simulations as f64,
            })
            .collect();
        sort_ranked(&mut ranked);
        ranked
    }
}
