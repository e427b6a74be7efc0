//! Request and response types for the racing API.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::picks::OptimalParams;
use crate::ranking::RankingStats;
use crate::storage::Prediction;

/// Monte Carlo request for one race
#[derive(Debug, Clone, Deserialize)]
pub struct MonteCarloRequest {
    pub event_name: String,
    pub event_time: String,
    /// Defaults to today
    #[serde(default)]
    pub event_date: Option<NaiveDate>,
}

/// One runner's simulated win probability
#[derive(Debug, Clone, Serialize)]
pub struct SimulationEntry {
    pub selection_id: i64,
    pub selection_name: String,
    pub event_name: String,
    pub event_time: String,
    pub odds: Option<String>,
    pub win_probability: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonteCarloResponse {
    pub data: Vec<SimulationEntry>,
}

/// Race picks request: the race plus the optimal parameters
#[derive(Debug, Clone, Deserialize)]
pub struct RacePicksRequest {
    pub event_name: String,
    pub event_date: NaiveDate,
    pub event_time: String,
    #[serde(flatten)]
    pub params: OptimalParams,
}

/// A runner matching every optimal parameter
#[derive(Debug, Clone, Serialize)]
pub struct RacePick {
    pub selection_id: i64,
    pub selection_name: String,
    pub event_name: String,
    pub event_time: String,
    pub odds: Option<String>,
    pub num_runs: usize,
    pub num_years_in_competition: f64,
    pub num_wins: usize,
    pub rating: f64,
    pub position: f64,
    pub distance: f64,
    pub probability: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RacePicksResponse {
    pub simulation_results: Vec<RacePick>,
}

/// Ranking run for a date, optionally one meeting or race
#[derive(Debug, Clone, Deserialize)]
pub struct MeetingPredictionRequest {
    pub event_date: NaiveDate,
    #[serde(default)]
    pub event_name: Option<String>,
    #[serde(default)]
    pub event_time: Option<String>,
    /// Rank without persisting
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictionsResponse {
    pub event_date: NaiveDate,
    pub predictions: Vec<Prediction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<RankingStats>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordResultsResponse {
    pub updated: usize,
    pub pending: usize,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
