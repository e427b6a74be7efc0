//! Race picks: match runners against a set of optimal form parameters.

use serde::{Deserialize, Serialize};

use crate::form::AggregatedForm;

const CRITERIA: f64 = 6.0;

/// Target values for each form feature, with a shared tolerance
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptimalParams {
    pub optimal_num_runs: f64,
    pub optimal_num_years_in_competition: f64,
    pub optimal_num_wins: f64,
    pub optimal_rating: f64,
    pub optimal_position: f64,
    /// Furlongs
    pub optimal_distance: f64,
    #[serde(default)]
    pub tolerance: f64,
}

/// Feature values compared against `OptimalParams`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FormProfile {
    pub num_runs: f64,
    pub num_years_in_competition: f64,
    pub num_wins: f64,
    pub rating: f64,
    pub position: f64,
    pub distance: f64,
}

impl From<&AggregatedForm> for FormProfile {
    fn from(form: &AggregatedForm) -> Self {
        Self {
            num_runs: form.run_count as f64,
            num_years_in_competition: form.years_in_competition(),
            num_wins: form.win_count as f64,
            rating: form.average_rating.unwrap_or(0.0),
            position: form.average_position.unwrap_or(0.0),
            distance: form.average_distance.unwrap_or(0.0),
        }
    }
}

/// Fraction of the six criteria within tolerance of the optimum
pub fn match_probability(profile: &FormProfile, params: &OptimalParams) -> f64 {
    let tolerance = params.tolerance.abs();
    let within = |value: f64, optimum: f64| (value - optimum).abs() <= tolerance;

    let matched = [
        within(profile.num_runs, params.optimal_num_runs),
        within(
            profile.num_years_in_competition,
            params.optimal_num_years_in_competition,
        ),
        within(profile.num_wins, params.optimal_num_wins),
        within(profile.rating, params.optimal_rating),
        within(profile.position, params.optimal_position),
        within(profile.distance, params.optimal_distance),
    ]
    .iter()
    .filter(|m| **m)
    .count();

    matched as f64 / CRITERIA
}

pub fn is_exact_match(probability: f64) -> bool {
    (probability - 1.0).abs() < f64::EPSILON
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> FormProfile {
        FormProfile {
            num_runs: 6.0,
            num_years_in_competition: 2.0,
            num_wins: 2.0,
            rating: 50.0,
            position: 3.0,
            distance: 10.0,
        }
    }

    fn params(tolerance: f64) -> OptimalParams {
        OptimalParams {
            optimal_num_runs: 5.0,
            optimal_num_years_in_competition: 2.0,
            optimal_num_wins: 2.0,
            optimal_rating: 49.0,
            optimal_position: 3.0,
            optimal_distance: 10.0,
            tolerance,
        }
    }

    #[test]
    fn test_exact_match_within_tolerance() {
        let p = match_probability(&profile(), &params(1.0));
        assert!(is_exact_match(p));
    }

    #[test]
    fn test_partial_match() {
        let p = match_probability(&profile(), &params(0.0));
        assert!((p - 4.0 / 6.0).abs() < 1e-12);
        assert!(!is_exact_match(p));
    }

    #[test]
    fn test_profile_from_empty_form() {
        let profile = FormProfile::from(&AggregatedForm::default());
        assert_eq!(profile.num_runs, 0.0);
        assert_eq!(profile.rating, 0.0);
    }
}
