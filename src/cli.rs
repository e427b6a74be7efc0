//! CLI commands for racing-api.
//!
//! Supports API server mode plus one-shot ranking, simulation, result
//! recording and data import.

use anyhow::Context;
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::analysis;
use crate::config::AppConfig;
use crate::ranking::{Ranker, RankingOutcome, Scope};
use crate::results::record_results;
use crate::scraper::WebResultSource;
use crate::storage::{FormRecord, RaceRepository, Runner};
use crate::types::SimulationEntry;

#[derive(Parser)]
#[command(name = "racing-api")]
#[command(version, about = "Horse racing form scoring API and CLI", long_about = None)]
pub struct Cli {
    /// Database path override
    #[arg(long, global = true, value_name = "PATH")]
    pub database: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the API server
    Serve {
        /// Host to bind to
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Rank a day's runners and store the picks
    Predict {
        /// Race date (YYYY-MM-DD), defaults to today
        #[arg(short, long)]
        date: Option<NaiveDate>,

        /// Restrict to one meeting
        #[arg(short, long)]
        event: Option<String>,

        /// Restrict to one race time (HH:MM)
        #[arg(short, long)]
        time: Option<String>,

        /// Rank without storing
        #[arg(long)]
        dry_run: bool,

        /// Output format (json, table)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Monte Carlo win probabilities for one race
    Simulate {
        #[arg(short, long)]
        event: String,

        #[arg(short, long)]
        time: String,

        /// Race date (YYYY-MM-DD), defaults to today
        #[arg(short, long)]
        date: Option<NaiveDate>,

        /// Output format (json, table)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Record published results onto stored predictions
    RecordResults {
        /// Race date (YYYY-MM-DD)
        #[arg(short, long)]
        date: NaiveDate,
    },

    /// Load runners and form from a JSON file
    Import {
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },
}

/// Seed file layout
#[derive(Debug, Deserialize)]
pub struct ImportFile {
    #[serde(default)]
    pub runners: Vec<Runner>,
    #[serde(default)]
    pub form: Vec<FormRecord>,
}

/// Load configuration and apply the database override
pub fn load_config(database: Option<PathBuf>) -> anyhow::Result<AppConfig> {
    let mut config = AppConfig::load()?;
    if let Some(path) = database {
        config.database.path = path.to_string_lossy().to_string();
    }
    Ok(config)
}

fn open_repository(config: &AppConfig) -> anyhow::Result<RaceRepository> {
    RaceRepository::new(Path::new(&config.database.path))
        .with_context(|| format!("Failed to open database {}", config.database.path))
}

/// Run a ranking pass from the command line.
pub fn run_predict(
    config: &AppConfig,
    date: Option<NaiveDate>,
    event: Option<String>,
    time: Option<String>,
    dry_run: bool,
    format: &str,
) -> anyhow::Result<()> {
    let date = date.unwrap_or_else(|| Local::now().date_naive());
    let mut repo = open_repository(config)?;
    let ranker = Ranker::from_config(&config.ranking, &config.simulation);

    let scope = Scope::new(event, time);
    let outcome = ranker.run(&mut repo, date, &scope, !dry_run)?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&outcome.predictions)?),
        "table" => print_predictions(date, &outcome, dry_run),
        _ => {
            eprintln!("Unknown format: {}. Using JSON.", format);
            println!("{}", serde_json::to_string_pretty(&outcome.predictions)?);
        }
    }

    Ok(())
}

fn print_predictions(date: NaiveDate, outcome: &RankingOutcome, dry_run: bool) {
    println!("Predictions for {}{}", date, if dry_run { " (dry run)" } else { "" });
    println!();
    println!(
        "  {:<6} {:<16} {:<24} {:>8} {:>8} {:>8} {:>8}",
        "Time", "Meeting", "Selection", "Score", "AvgPos", "Rating", "Odds"
    );
    for s in &outcome.selections {
        let r = &s.runner;
        println!(
            "  {:<6} {:<16} {:<24} {:>8.1} {:>8.2} {:>8.2} {:>8}",
            r.event_time,
            r.event_name,
            r.selection_name,
            s.total_score,
            s.average_position,
            s.average_rating,
            r.price.as_deref().unwrap_or("-")
        );
    }
    println!();

    let s = &outcome.stats;
    println!(
        "Collected {}, filtered {}, distance-checked {}, scored {}, selected {}",
        s.collected, s.filtered, s.distance_checked, s.scored, s.selected
    );
}

/// Simulate one race from the command line.
pub fn run_simulate(
    config: &AppConfig,
    event: &str,
    time: &str,
    date: Option<NaiveDate>,
    format: &str,
) -> anyhow::Result<()> {
    let date = date.unwrap_or_else(|| Local::now().date_naive());
    let repo = open_repository(config)?;
    let entries = analysis::monte_carlo(&repo, &config.simulation, date, event, time)?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        print_simulation(event, time, date, &entries);
    }
    Ok(())
}

fn print_simulation(event: &str, time: &str, date: NaiveDate, entries: &[SimulationEntry]) {
    println!("{} {} on {}", time, event, date);
    println!();
    for e in entries {
        println!(
            "  {:<24} {:>7.2}%  {}",
            e.selection_name,
            e.win_probability * 100.0,
            e.odds.as_deref().unwrap_or("-")
        );
    }
    println!();
}

/// Record results for a date from the command line.
pub async fn run_record_results(config: &AppConfig, date: NaiveDate) -> anyhow::Result<()> {
    let repo = Mutex::new(open_repository(config)?);
    let source = WebResultSource::new(&config.scraper)?;

    let summary = record_results(&repo, &source, date).await?;
    if summary.predictions == 0 {
        eprintln!("No predictions stored for {}", date);
        return Ok(());
    }

    println!(
        "{}: {} updated, {} pending",
        date, summary.updated, summary.pending
    );
    Ok(())
}

/// Import runners and form into the database.
pub fn run_import(config: &AppConfig, input: &Path) -> anyhow::Result<()> {
    let json = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let file: ImportFile = serde_json::from_str(&json)
        .with_context(|| format!("Failed to parse {}", input.display()))?;

    let repo = open_repository(config)?;
    import(&repo, &file)?;

    eprintln!(
        "Imported {} runners and {} form rows ({} runners, {} form rows stored)",
        file.runners.len(),
        file.form.len(),
        repo.runner_count()?,
        repo.form_count()?
    );
    Ok(())
}

fn import(repo: &RaceRepository, file: &ImportFile) -> anyhow::Result<()> {
    for runner in &file.runners {
        repo.insert_runner(runner)?;
    }
    for row in &file.form {
        repo.insert_form(row)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_predict_args() {
        let cli = Cli::parse_from([
            "racing-api",
            "--database",
            "/tmp/r.db",
            "predict",
            "--date",
            "2024-06-01",
            "--event",
            "Epsom",
            "--dry-run",
        ]);
        assert_eq!(cli.database, Some(PathBuf::from("/tmp/r.db")));
        match cli.command {
            Commands::Predict {
                date,
                event,
                time,
                dry_run,
                format,
            } => {
                assert_eq!(date, NaiveDate::from_ymd_opt(2024, 6, 1));
                assert_eq!(event.as_deref(), Some("Epsom"));
                assert!(time.is_none());
                assert!(dry_run);
                assert_eq!(format, "table");
            }
            _ => panic!("expected predict"),
        }
    }

    #[test]
    fn test_parse_record_results_args() {
        let cli = Cli::parse_from(["racing-api", "record-results", "--date", "2024-06-01"]);
        assert!(matches!(cli.command, Commands::RecordResults { .. }));
    }

    #[test]
    fn test_import_file() {
        let file: ImportFile = serde_json::from_str(
            r#"{
                "runners": [{
                    "selection_id": 1, "selection_name": "Horse 1", "event_name": "Epsom",
                    "event_date": "2024-06-01", "event_time": "14:30", "price": "5/1",
                    "distance": "1m 2f", "race_link": "/racecards/epsom/stakes"
                }],
                "form": [{
                    "selection_id": 1, "race_date": "2024-01-01", "position": "1/10",
                    "rating": 45, "distance": "1m 2f", "age": "5 years"
                }]
            }"#,
        )
        .unwrap();

        let repo = RaceRepository::in_memory().unwrap();
        import(&repo, &file).unwrap();
        assert_eq!(repo.runner_count().unwrap(), 1);
        assert_eq!(repo.form_count().unwrap(), 1);
    }
}
