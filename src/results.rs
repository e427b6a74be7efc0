//! Post-race winner recording.
//!
//! Looks up each stored prediction's published result and writes the
//! finishing position and price back onto the prediction row.

use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Mutex;
use tracing::{info, warn};

use crate::scraper::ResultSource;
use crate::storage::{self, RaceRepository};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecordSummary {
    /// Predictions stored for the date
    pub predictions: usize,
    pub updated: usize,
    /// Not yet published, or the fetch failed
    pub pending: usize,
}

/// Record results for every prediction on `date`.
///
/// The repository lock is never held across a fetch.
pub async fn record_results<S: ResultSource>(
    repo: &Mutex<RaceRepository>,
    source: &S,
    date: NaiveDate,
) -> Result<RecordSummary> {
    let predictions = storage::lock(repo)?.get_predictions(date)?;
    let mut summary = RecordSummary {
        predictions: predictions.len(),
        ..Default::default()
    };

    for p in &predictions {
        match source.fetch_result(p.selection_id, date).await {
            Ok(Some(result)) => {
                let recorded = storage::lock(repo)?.record_result(
                    date,
                    &p.event_time,
                    p.selection_id,
                    &result.position,
                    result.price.as_deref(),
                )?;
                if recorded {
                    summary.updated += 1;
                } else {
                    summary.pending += 1;
                }
            }
            Ok(None) => summary.pending += 1,
            Err(e) => {
                warn!(
                    "Result fetch failed for {} ({}): {:#}",
                    p.selection_name, p.selection_id, e
                );
                summary.pending += 1;
            }
        }
    }

    info!(
        "Results for {}: {} updated, {} pending",
        date, summary.updated, summary.pending
    );
    Ok(summary)
}


#[cfg(test)]
mod tests {
    use super::stub::StubResults;
    use super::*;
    use crate::storage::repository::fixtures::date;
    use crate::storage::Prediction;

    fn prediction(selection_id: i64, time: &str) -> Prediction {
        Prediction {
            event_date: date(2024, 6, 1),
            event_time: time.to_string(),
            event_name: "Epsom".to_string(),
            selection_id,
            selection_name: format!("Horse {}", selection_id),
            odds: Some("5/1".to_string()),
            clean_bet_score: 200.0,
            average_position: 2.0,
            average_rating: 45.0,
            trainer: None,
            selection_position: None,
            current_event_price: None,
        }
    }

    fn seeded() -> Mutex<RaceRepository> {
        let mut repo = RaceRepository::in_memory().unwrap();
        repo.replace_predictions(
            date(2024, 6, 1),
            None,
            None,
            &[prediction(1, "14:30"), prediction(2, "15:05"), prediction(3, "15:40")],
        )
        .unwrap();
        Mutex::new(repo)
    }

    #[tokio::test]
    async fn test_records_published_results() {
        let repo = seeded();
        let source = StubResults {
            failing: vec![3],
            ..Default::default()
        }
        .with(1, "1/9", "9/4");

        let summary = record_results(&repo, &source, date(2024, 6, 1)).await.unwrap();
        assert_eq!(
            summary,
            RecordSummary {
                predictions: 3,
                updated: 1,
                pending: 2
            }
        );

        let stored = repo.lock().unwrap().get_predictions(date(2024, 6, 1)).unwrap();
        let winner = stored.iter().find(|p| p.selection_id == 1).unwrap();
        assert_eq!(winner.selection_position.as_deref(), Some("1/9"));
        assert_eq!(winner.current_event_price.as_deref(), Some("9/4"));
        let other = stored.iter().find(|p| p.selection_id == 2).unwrap();
        assert_eq!(other.selection_position, None);
    }

    #[tokio::test]
    async fn test_no_predictions() {
        let repo = Mutex::new(RaceRepository::in_memory().unwrap());
        let summary = record_results(&repo, &StubResults::default(), date(2024, 6, 1))
            .await
            .unwrap();
        assert_eq!(summary.predictions, 0);
        assert_eq!(summary.updated, 0);
    }
}
