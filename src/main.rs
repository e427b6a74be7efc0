//! Racing API
//!
//! REST API and CLI for scoring and ranking race-day runners from their form.

mod analysis;
mod cli;
mod config;
mod distance;
mod form;
mod parse;
mod picks;
mod position;
mod preference;
mod ranking;
mod results;
mod retry;
mod routes;
mod scoring;
mod scraper;
mod simulation;
mod storage;
mod strategy;
mod types;

use axum::{routing::get, routing::post, Router};
use clap::Parser;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Commands};
use crate::config::AppConfig;
use crate::routes::AppState;
use crate::scraper::WebResultSource;
use crate::storage::RaceRepository;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = cli::load_config(cli.database)?;

    match cli.command {
        Commands::Serve { host, port } => run_server(config, host, port).await,
        Commands::Predict {
            date,
            event,
            time,
            dry_run,
            format,
        } => cli::run_predict(&config, date, event, time, dry_run, &format),
        Commands::Simulate {
            event,
            time,
            date,
            format,
        } => cli::run_simulate(&config, &event, &time, date, &format),
        Commands::RecordResults { date } => cli::run_record_results(&config, date).await,
        Commands::Import { input } => cli::run_import(&config, &input),
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "racing_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Run the API server.
async fn run_server(
    mut config: AppConfig,
    host: Option<String>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    // Override with CLI args
    if let Some(h) = host {
        config.server.host = h;
    }
    if let Some(p) = port {
        config.server.port = p;
    }

    tracing::info!("Configuration loaded");
    tracing::info!("Database path: {}", config.database.path);

    let repo = RaceRepository::new(Path::new(&config.database.path))?;
    tracing::info!(
        "Database ready: {} runners, {} form rows",
        repo.runner_count()?,
        repo.form_count()?
    );
    tracing::info!(
        "Ranking: {:?} strategy, {:?} selection",
        config.ranking.strategy,
        config.ranking.selection_mode()
    );

    let state = Arc::new(AppState {
        repo: Mutex::new(repo),
        results: WebResultSource::new(&config.scraper)?,
        config: config.clone(),
    });

    let app = Router::new()
        .route("/health", get(routes::health))
        .route(
            "/analysis/MonteCarloSimulation",
            post(routes::monte_carlo_simulation),
        )
        .route(
            "/analysis/RacePicksSimulation",
            post(routes::race_picks_simulation),
        )
        .route("/predictions/meeting", post(routes::meeting_predictions))
        .route("/predictions/today", post(routes::today_predictions))
        .route("/predictions/:date", get(routes::get_predictions))
        .route("/predictions/:date/results", post(routes::record_results))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
