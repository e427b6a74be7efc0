//! API route handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Local, NaiveDate};
use std::sync::{Arc, Mutex};

use crate::analysis;
use crate::config::AppConfig;
use crate::ranking::{Ranker, Scope};
use crate::results::record_results as record_winners;
use crate::scraper::WebResultSource;
use crate::storage::{self, RaceRepository};
use crate::types::{
    ErrorResponse, HealthResponse, MeetingPredictionRequest, MonteCarloRequest,
    MonteCarloResponse, PredictionsResponse, RacePicksRequest, RacePicksResponse,
    RecordResultsResponse,
};

/// Application state shared across handlers.
pub struct AppState {
    pub repo: Mutex<RaceRepository>,
    pub config: AppConfig,
    pub results: WebResultSource,
}

/// Error type for API handlers.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.into(),
        }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.into(),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        tracing::error!("Request failed: {:#}", e);
        Self::internal(format!("{:#}", e))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.status.to_string(),
            message: self.message,
        });
        (self.status, body).into_response()
    }
}

fn require(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::bad_request(format!("{} must not be empty", field)));
    }
    Ok(())
}

fn parse_date(raw: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| ApiError::bad_request(format!("Invalid date '{}', expected YYYY-MM-DD", raw)))
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Run repository and simulation work off the async workers
async fn blocking<T, F>(state: &Arc<AppState>, work: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&AppState) -> Result<T, ApiError> + Send + 'static,
{
    let state = Arc::clone(state);
    tokio::task::spawn_blocking(move || work(&state))
        .await
        .map_err(|e| ApiError::internal(format!("Worker task failed: {}", e)))?
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Monte Carlo win probabilities for one race.
pub async fn monte_carlo_simulation(
    State(state): State<Arc<AppState>>,
    Json(req): Json<MonteCarloRequest>,
) -> Result<Json<MonteCarloResponse>, ApiError> {
    require("event_name", &req.event_name)?;
    require("event_time", &req.event_time)?;
    let date = req.event_date.unwrap_or_else(today);

    let data = blocking(&state, move |state| {
        let repo = storage::lock(&state.repo)?;
        Ok(analysis::monte_carlo(
            &repo,
            &state.config.simulation,
            date,
            &req.event_name,
            &req.event_time,
        )?)
    })
    .await?;

    Ok(Json(MonteCarloResponse { data }))
}

/// Runners matching every optimal parameter.
pub async fn race_picks_simulation(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RacePicksRequest>,
) -> Result<Json<RacePicksResponse>, ApiError> {
    require("event_name", &req.event_name)?;
    require("event_time", &req.event_time)?;
    if req.params.tolerance < 0.0 {
        return Err(ApiError::bad_request("tolerance must not be negative"));
    }

    let simulation_results = blocking(&state, move |state| {
        let repo = storage::lock(&state.repo)?;
        Ok(analysis::race_picks(
            &repo,
            req.event_date,
            &req.event_name,
            &req.event_time,
            &req.params,
        )?)
    })
    .await?;

    Ok(Json(RacePicksResponse { simulation_results }))
}

async fn run_ranking(
    state: &Arc<AppState>,
    date: NaiveDate,
    scope: Scope,
    dry_run: bool,
) -> Result<PredictionsResponse, ApiError> {
    blocking(state, move |state| {
        let ranker = Ranker::from_config(&state.config.ranking, &state.config.simulation);
        let mut repo = storage::lock(&state.repo)?;
        let outcome = ranker.run(&mut repo, date, &scope, !dry_run)?;

        Ok(PredictionsResponse {
            event_date: date,
            predictions: outcome.predictions,
            stats: Some(outcome.stats),
        })
    })
    .await
}

/// Rank a day, meeting or race and store the picks.
pub async fn meeting_predictions(
    State(state): State<Arc<AppState>>,
    Json(req): Json<MeetingPredictionRequest>,
) -> Result<Json<PredictionsResponse>, ApiError> {
    if let Some(name) = &req.event_name {
        require("event_name", name)?;
    }
    if let Some(time) = &req.event_time {
        require("event_time", time)?;
    }

    let scope = Scope::new(req.event_name, req.event_time);
    run_ranking(&state, req.event_date, scope, req.dry_run)
        .await
        .map(Json)
}

/// Rank every runner of today's card.
pub async fn today_predictions(
    State(state): State<Arc<AppState>>,
) -> Result<Json<PredictionsResponse>, ApiError> {
    run_ranking(&state, today(), Scope::day(), false)
        .await
        .map(Json)
}

/// Stored predictions for a date.
pub async fn get_predictions(
    State(state): State<Arc<AppState>>,
    Path(date): Path<String>,
) -> Result<Json<PredictionsResponse>, ApiError> {
    let date = parse_date(&date)?;
    let predictions = storage::lock(&state.repo)?.get_predictions(date)?;

    Ok(Json(PredictionsResponse {
        event_date: date,
        predictions,
        stats: None,
    }))
}

/// Record published results onto a date's predictions.
pub async fn record_results(
    State(state): State<Arc<AppState>>,
    Path(date): Path<String>,
) -> Result<Json<RecordResultsResponse>, ApiError> {
    let date = parse_date(&date)?;
    let summary = record_winners(&state.repo, &state.results, date).await?;

    if summary.predictions == 0 {
        return Err(ApiError::not_found(format!("No predictions stored for {}", date)));
    }

    Ok(Json(RecordResultsResponse {
        updated: summary.updated,
        pending: summary.pending,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::picks::OptimalParams;
    use crate::storage::repository::fixtures::{date, form, runner};

    fn state() -> Arc<AppState> {
        let repo = RaceRepository::in_memory().unwrap();
        repo.insert_runner(&runner(1, "Epsom", "14:30")).unwrap();
        repo.insert_runner(&runner(2, "Epsom", "14:30")).unwrap();
        repo.insert_form(&form(1, date(2024, 1, 1), "1/10", "1m 2f")).unwrap();
        repo.insert_form(&form(2, date(2024, 1, 1), "5/10", "1m 2f")).unwrap();

        let mut config = AppConfig::default();
        config.simulation.seed = Some(5);
        config.simulation.num_simulations = 2_000;

        Arc::new(AppState {
            repo: Mutex::new(repo),
            results: WebResultSource::new(&config.scraper).unwrap(),
            config,
        })
    }

    fn picks_request(tolerance: f64) -> RacePicksRequest {
        RacePicksRequest {
            event_name: "Epsom".to_string(),
            event_date: date(2024, 6, 1),
            event_time: "14:30".to_string(),
            params: OptimalParams {
                optimal_num_runs: 1.0,
                optimal_num_years_in_competition: 0.0,
                optimal_num_wins: 1.0,
                optimal_rating: 45.0,
                optimal_position: 1.0,
                optimal_distance: 10.0,
                tolerance,
            },
        }
    }

    fn meeting(dry_run: bool) -> MeetingPredictionRequest {
        MeetingPredictionRequest {
            event_date: date(2024, 6, 1),
            event_name: Some("Epsom".to_string()),
            event_time: None,
            dry_run,
        }
    }

    #[tokio::test]
    async fn test_health() {
        let Json(resp) = health().await;
        assert_eq!(resp.status, "ok");
    }

    #[tokio::test]
    async fn test_meeting_predictions_persist_and_read_back() {
        let state = state();
        let Json(resp) = meeting_predictions(State(state.clone()), Json(meeting(false)))
            .await
            .unwrap();
        assert_eq!(resp.predictions.len(), 1);
        assert_eq!(resp.predictions[0].selection_id, 1);

        let Json(stored) = get_predictions(State(state), Path("2024-06-01".to_string()))
            .await
            .unwrap();
        assert_eq!(stored.predictions, resp.predictions);
    }

    #[tokio::test]
    async fn test_dry_run_does_not_persist() {
        let state = state();
        let Json(resp) = meeting_predictions(State(state.clone()), Json(meeting(true)))
            .await
            .unwrap();
        assert_eq!(resp.predictions.len(), 1);

        let stored = state.repo.lock().unwrap().get_predictions(date(2024, 6, 1)).unwrap();
        assert!(stored.is_empty());
    }

    #[tokio::test]
    async fn test_empty_event_name_rejected() {
        let mut req = meeting(false);
        req.event_name = Some("  ".to_string());
        let err = meeting_predictions(State(state()), Json(req)).await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_monte_carlo_endpoint() {
        let req = MonteCarloRequest {
            event_name: "Epsom".to_string(),
            event_time: "14:30".to_string(),
            event_date: Some(date(2024, 6, 1)),
        };
        let Json(resp) = monte_carlo_simulation(State(state()), Json(req)).await.unwrap();
        assert_eq!(resp.data.len(), 2);
        assert_eq!(resp.data[0].selection_id, 1);
        assert_eq!(resp.data[0].odds.as_deref(), Some("5/1"));
    }

    #[tokio::test]
    async fn test_malformed_date_is_bad_request() {
        let err = get_predictions(State(state()), Path("01-06-2024".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_record_results_without_predictions_is_not_found() {
        let err = record_results(State(state()), Path("2024-06-01".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_race_picks_endpoint_returns_exact_match() {
        let Json(resp) = race_picks_simulation(State(state()), Json(picks_request(0.0)))
            .await
            .unwrap();
        assert_eq!(resp.simulation_results.len(), 1);
        let pick = &resp.simulation_results[0];
        assert_eq!(pick.selection_id, 1);
        assert_eq!(pick.num_runs, 1);
        assert_eq!(pick.num_wins, 1);
        assert_eq!(pick.rating, 45.0);
        assert_eq!(pick.probability, 1.0);
    }

    #[tokio::test]
    async fn test_race_picks_negative_tolerance_is_bad_request() {
        let err = race_picks_simulation(State(state()), Json(picks_request(-0.5)))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_today_predictions_ranks_todays_card() {
        let state = state();
        {
            let repo = state.repo.lock().unwrap();
            let mut today_runner = runner(3, "Ascot", "16:00");
            today_runner.event_date = today();
            repo.insert_runner(&today_runner).unwrap();
            repo.insert_form(&form(3, date(2024, 1, 1), "1/10", "1m 2f")).unwrap();
        }

        let Json(resp) = today_predictions(State(state.clone())).await.unwrap();
        assert_eq!(resp.event_date, today());
        assert_eq!(resp.predictions.len(), 1);
        assert_eq!(resp.predictions[0].selection_id, 3);

        let stored = state.repo.lock().unwrap().get_predictions(today()).unwrap();
        assert_eq!(stored.len(), 1);
    }

    #[tokio::test]
    async fn test_storage_failure_is_internal_error() {
        let state = state();
        state
            .repo
            .lock()
            .unwrap()
            .connection()
            .execute_batch("DROP TABLE event_predictions")
            .unwrap();

        let err = get_predictions(State(state), Path("2024-06-01".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.message.contains("no such table"), "{}", err.message);
    }
}
