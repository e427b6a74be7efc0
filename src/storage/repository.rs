//! SQLite repository for runners, historical form and predictions

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, params_from_iter, Connection, Row};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use super::schema::create_tables;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// A horse entered in one race
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Runner {
    pub selection_id: i64,
    pub selection_name: String,
    pub event_name: String,
    pub event_date: NaiveDate,
    pub event_time: String,
    #[serde(default)]
    pub price: Option<String>,
    pub distance: String,
    #[serde(default)]
    pub race_category: Option<String>,
    #[serde(default)]
    pub track_condition: Option<String>,
    #[serde(default)]
    pub runner_count: Option<u32>,
    #[serde(default)]
    pub track: Option<String>,
    #[serde(default)]
    pub race_class: Option<String>,
    #[serde(default)]
    pub race_link: Option<String>,
}

/// One past race run by a selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormRecord {
    pub selection_id: i64,
    pub race_date: NaiveDate,
    pub position: String,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub race_type: Option<String>,
    #[serde(default)]
    pub course: Option<String>,
    pub distance: String,
    #[serde(default)]
    pub going: Option<String>,
    #[serde(default)]
    pub starting_price: Option<String>,
    #[serde(default)]
    pub age: Option<String>,
    #[serde(default)]
    pub trainer: Option<String>,
    #[serde(default)]
    pub sex: Option<String>,
    #[serde(default)]
    pub sire: Option<String>,
    #[serde(default)]
    pub dam: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
}

/// A persisted pick for one race slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub event_date: NaiveDate,
    pub event_time: String,
    pub event_name: String,
    pub selection_id: i64,
    pub selection_name: String,
    pub odds: Option<String>,
    pub clean_bet_score: f64,
    pub average_position: f64,
    pub average_rating: f64,
    pub trainer: Option<String>,
    pub selection_position: Option<String>,
    pub current_event_price: Option<String>,
}

fn parse_date(raw: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn runner_from_row(row: &Row<'_>) -> rusqlite::Result<Runner> {
    let date: String = row.get(3)?;
    Ok(Runner {
        selection_id: row.get(0)?,
        selection_name: row.get(1)?,
        event_name: row.get(2)?,
        event_date: parse_date(&date)?,
        event_time: row.get(4)?,
        price: row.get(5)?,
        distance: row.get(6)?,
        race_category: row.get(7)?,
        track_condition: row.get(8)?,
        runner_count: row.get(9)?,
        track: row.get(10)?,
        race_class: row.get(11)?,
        race_link: row.get(12)?,
    })
}

fn form_from_row(row: &Row<'_>) -> rusqlite::Result<FormRecord> {
    let date: String = row.get(1)?;
    Ok(FormRecord {
        selection_id: row.get(0)?,
        race_date: parse_date(&date)?,
        position: row.get(2)?,
        rating: row.get(3)?,
        race_type: row.get(4)?,
        course: row.get(5)?,
        distance: row.get(6)?,
        going: row.get(7)?,
        starting_price: row.get(8)?,
        age: row.get(9)?,
        trainer: row.get(10)?,
        sex: row.get(11)?,
        sire: row.get(12)?,
        dam: row.get(13)?,
        owner: row.get(14)?,
    })
}

fn prediction_from_row(row: &Row<'_>) -> rusqlite::Result<Prediction> {
    let date: String = row.get(0)?;
    Ok(Prediction {
        event_date: parse_date(&date)?,
        event_time: row.get(1)?,
        event_name: row.get(2)?,
        selection_id: row.get(3)?,
        selection_name: row.get(4)?,
        odds: row.get(5)?,
        clean_bet_score: row.get(6)?,
        average_position: row.get(7)?,
        average_rating: row.get(8)?,
        trainer: row.get(9)?,
        selection_position: row.get(10)?,
        current_event_price: row.get(11)?,
    })
}

/// Repository for runners, form and predictions
pub struct RaceRepository {
    conn: Connection,
}

impl RaceRepository {
    /// Create a new repository, initializing the database if needed
    pub fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create database directory")?;
        }

        let conn = Connection::open(db_path).context("Failed to open database")?;
        create_tables(&conn)?;

        Ok(Self { conn })
    }

    /// Create an in-memory repository (for testing)
    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        create_tables(&conn)?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }

    // ==================== Insert Operations ====================

    /// Insert a race-day runner (upsert)
    pub fn insert_runner(&self, runner: &Runner) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT OR REPLACE INTO event_runners
            (selection_id, selection_name, event_name, event_date, event_time, price,
             distance, race_category, track_condition, runner_count, track, race_class,
             race_link)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
            params![
                runner.selection_id,
                runner.selection_name,
                runner.event_name,
                runner.event_date.format(DATE_FORMAT).to_string(),
                runner.event_time,
                runner.price,
                runner.distance,
                runner.race_category,
                runner.track_condition,
                runner.runner_count,
                runner.track,
                runner.race_class,
                runner.race_link,
            ],
        )?;
        Ok(())
    }

    /// Insert a historical form row (upsert)
    pub fn insert_form(&self, form: &FormRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT OR REPLACE INTO selections_form
            (selection_id, race_date, position, rating, race_type, course, distance,
             going, starting_price, age, trainer, sex, sire, dam, owner)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            "#,
            params![
                form.selection_id,
                form.race_date.format(DATE_FORMAT).to_string(),
                form.position,
                form.rating,
                form.race_type,
                form.course,
                form.distance,
                form.going,
                form.starting_price,
                form.age,
                form.trainer,
                form.sex,
                form.sire,
                form.dam,
                form.owner,
            ],
        )?;
        Ok(())
    }

    // ==================== Query Operations ====================

    /// Get runners for a date, optionally scoped to one meeting and/or race time
    pub fn get_runners(
        &self,
        date: NaiveDate,
        event_name: Option<&str>,
        event_time: Option<&str>,
    ) -> Result<Vec<Runner>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT selection_id, selection_name, event_name, event_date, event_time, price,
                   distance, race_category, track_condition, runner_count, track,
                   race_class, race_link
            FROM event_runners
            WHERE event_date = ?1
              AND (?2 IS NULL OR event_name = ?2)
              AND (?3 IS NULL OR event_time = ?3)
            ORDER BY event_time, event_name, id
            "#,
        )?;

        let runners = stmt
            .query_map(
                params![date.format(DATE_FORMAT).to_string(), event_name, event_time],
                runner_from_row,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(runners)
    }

    /// Get historical form for many selections in one query.
    ///
    /// Rows are grouped per selection and ordered by race date, most recent first.
    /// Selections without form are absent from the map.
    pub fn get_form_for_selections(
        &self,
        selection_ids: &[i64],
    ) -> Result<HashMap<i64, Vec<FormRecord>>> {
        let mut grouped: HashMap<i64, Vec<FormRecord>> = HashMap::new();
        if selection_ids.is_empty() {
            return Ok(grouped);
        }

        let placeholders = vec!["?"; selection_ids.len()].join(", ");
        let sql = format!(
            r#"
            SELECT selection_id, race_date, position, rating, race_type, course, distance,
                   going, starting_price, age, trainer, sex, sire, dam, owner
            FROM selections_form
            WHERE selection_id IN ({})
            ORDER BY selection_id, race_date DESC
            "#,
            placeholders
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(selection_ids.iter()), form_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        for row in rows {
            grouped.entry(row.selection_id).or_default().push(row);
        }

        Ok(grouped)
    }

    /// Get stored predictions for a date
    pub fn get_predictions(&self, date: NaiveDate) -> Result<Vec<Prediction>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT event_date, event_time, event_name, selection_id, selection_name, odds,
                   clean_bet_score, average_position, average_rating, trainer,
                   selection_position, current_event_price
            FROM event_predictions
            WHERE event_date = ?1
            ORDER BY event_time, clean_bet_score DESC, selection_id
            "#,
        )?;

        let predictions = stmt
            .query_map([date.format(DATE_FORMAT).to_string()], prediction_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(predictions)
    }

    pub fn runner_count(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM event_runners", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn form_count(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM selections_form", [], |row| row.get(0))?;
        Ok(count)
    }

    // ==================== Prediction Writes ====================

    /// Replace the predictions for a date atomically.
    ///
    /// `event_name` and `event_time` narrow the rows deleted first; with
    /// neither set the whole day is replaced. Delete and insert share one
    /// transaction, so a failure leaves the previous predictions intact.
    pub fn replace_predictions(
        &mut self,
        date: NaiveDate,
        event_name: Option<&str>,
        event_time: Option<&str>,
        predictions: &[Prediction],
    ) -> Result<usize> {
        let date_str = date.format(DATE_FORMAT).to_string();
        let tx = self.conn.transaction()?;

        tx.execute(
            r#"
            DELETE FROM event_predictions
            WHERE event_date = ?1
              AND (?2 IS NULL OR event_name = ?2)
              AND (?3 IS NULL OR event_time = ?3)
            "#,
            params![date_str, event_name, event_time],
        )?;

        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO event_predictions
                (event_date, event_time, event_name, selection_id, selection_name, odds,
                 clean_bet_score, average_position, average_rating, trainer,
                 selection_position, current_event_price)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                "#,
            )?;

            for p in predictions {
                stmt.execute(params![
                    date_str,
                    p.event_time,
                    p.event_name,
                    p.selection_id,
                    p.selection_name,
                    p.odds,
                    p.clean_bet_score,
                    p.average_position,
                    p.average_rating,
                    p.trainer,
                    p.selection_position,
                    p.current_event_price,
                ])
                .with_context(|| {
                    format!(
                        "Failed to insert prediction for {} at {}",
                        p.selection_name, p.event_time
                    )
                })?;
            }
        }

        tx.commit()?;
        Ok(predictions.len())
    }

    /// Record a post-race result on an existing prediction (update in place).
    ///
    /// Returns false when no prediction matches.
    pub fn record_result(
        &self,
        date: NaiveDate,
        event_time: &str,
        selection_id: i64,
        position: &str,
        price: Option<&str>,
    ) -> Result<bool> {
        let updated = self.conn.execute(
            r#"
            UPDATE event_predictions
            SET selection_position = ?1,
                current_event_price = COALESCE(?2, current_event_price)
            WHERE event_date = ?3 AND event_time = ?4 AND selection_id = ?5
            "#,
            params![
                position,
                price,
                date.format(DATE_FORMAT).to_string(),
                event_time,
                selection_id,
            ],
        )?;
        Ok(updated > 0)
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    fn prediction(time: &str, selection_id: i64, score: f64) -> Prediction {
        Prediction {
            event_date: date(2024, 6, 1),
            event_time: time.to_string(),
            event_name: "Epsom".to_string(),
            selection_id,
            selection_name: format!("Horse {}", selection_id),
            odds: Some("5/1".to_string()),
            clean_bet_score: score,
            average_position: 2.0,
            average_rating: 45.0,
            trainer: None,
            selection_position: None,
            current_event_price: None,
        }
    }

    #[test]
    fn test_insert_and_get_runners() {
        let repo = RaceRepository::in_memory().unwrap();
        repo.insert_runner(&runner(1, "Epsom", "14:30")).unwrap();
        repo.insert_runner(&runner(2, "Epsom", "15:05")).unwrap();
        repo.insert_runner(&runner(3, "Ascot", "14:30")).unwrap();

        let all = repo.get_runners(date(2024, 6, 1), None, None).unwrap();
        assert_eq!(all.len(), 3);

        let epsom = repo.get_runners(date(2024, 6, 1), Some("Epsom"), None).unwrap();
        assert_eq!(epsom.len(), 2);

        let slot = repo
            .get_runners(date(2024, 6, 1), Some("Epsom"), Some("14:30"))
            .unwrap();
        assert_eq!(slot.len(), 1);
        assert_eq!(slot[0], runner(1, "Epsom", "14:30"));

        assert!(repo.get_runners(date(2024, 6, 2), None, None).unwrap().is_empty());
    }

    #[test]
    fn test_upsert_runner() {
        let repo = RaceRepository::in_memory().unwrap();
        let mut r = runner(1, "Epsom", "14:30");
        repo.insert_runner(&r).unwrap();
        r.price = Some("2/1".to_string());
        repo.insert_runner(&r).unwrap();
        assert_eq!(repo.runner_count().unwrap(), 1);
    }

    #[test]
    fn test_batched_form_query_groups_and_orders() {
        let repo = RaceRepository::in_memory().unwrap();
        repo.insert_form(&form(1, date(2024, 1, 10), "2/8", "1m")).unwrap();
        repo.insert_form(&form(1, date(2024, 3, 10), "1/8", "1m")).unwrap();
        repo.insert_form(&form(2, date(2023, 5, 1), "5/12", "6f")).unwrap();
        repo.insert_form(&form(9, date(2023, 5, 1), "5/12", "6f")).unwrap();

        let grouped = repo.get_form_for_selections(&[1, 2, 3]).unwrap();
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[&1].len(), 2);
        assert_eq!(grouped[&1][0].race_date, date(2024, 3, 10));
        assert_eq!(grouped[&2].len(), 1);
        assert!(!grouped.contains_key(&3));
        assert!(!grouped.contains_key(&9));
    }

    #[test]
    fn test_batched_form_query_empty_ids() {
        let repo = RaceRepository::in_memory().unwrap();
        assert!(repo.get_form_for_selections(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_replace_predictions() {
        let mut repo = RaceRepository::in_memory().unwrap();
        let day = date(2024, 6, 1);

        repo.replace_predictions(day, None, None, &[prediction("14:30", 1, 80.0), prediction("15:05", 2, 70.0)])
            .unwrap();
        assert_eq!(repo.get_predictions(day).unwrap().len(), 2);

        repo.replace_predictions(day, None, None, &[prediction("14:30", 3, 90.0)]).unwrap();
        let stored = repo.get_predictions(day).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].selection_id, 3);
    }

    #[test]
    fn test_replace_predictions_scoped_to_meeting() {
        let mut repo = RaceRepository::in_memory().unwrap();
        let day = date(2024, 6, 1);
        let mut ascot = prediction("15:05", 2, 70.0);
        ascot.event_name = "Ascot".to_string();
        repo.replace_predictions(day, None, None, &[prediction("14:30", 1, 80.0), ascot])
            .unwrap();

        repo.replace_predictions(day, Some("Epsom"), None, &[prediction("14:30", 3, 90.0)])
            .unwrap();

        let ids: Vec<i64> = repo
            .get_predictions(day)
            .unwrap()
            .iter()
            .map(|p| p.selection_id)
            .collect();
        assert_eq!(ids, vec![3, 2]);
    }

    #[test]
    fn test_replace_predictions_rolls_back_on_failure() {
        let mut repo = RaceRepository::in_memory().unwrap();
        let day = date(2024, 6, 1);
        repo.replace_predictions(day, None, None, &[prediction("14:30", 1, 80.0)]).unwrap();

        // Duplicate slot violates the unique constraint on the second insert
        let result = repo.replace_predictions(
            day,
            None,
            None,
            &[prediction("15:05", 2, 70.0), prediction("15:05", 2, 70.0)],
        );
        assert!(result.is_err());

        let stored = repo.get_predictions(day).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].selection_id, 1);
    }

    #[test]
    fn test_record_result() {
        let mut repo = RaceRepository::in_memory().unwrap();
        let day = date(2024, 6, 1);
        repo.replace_predictions(day, None, None, &[prediction("14:30", 1, 80.0)]).unwrap();

        assert!(repo.record_result(day, "14:30", 1, "1/9", Some("9/4")).unwrap());
        assert!(!repo.record_result(day, "14:30", 42, "1/9", None).unwrap());

        let stored = repo.get_predictions(day).unwrap();
        assert_eq!(stored[0].selection_position.as_deref(), Some("1/9"));
        assert_eq!(stored[0].current_event_price.as_deref(), Some("9/4"));
    }
}
