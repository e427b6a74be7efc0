//! SQLite schema definitions
//!
//! Tables:
//! - event_runners: Race-day entrants with race metadata
//! - selections_form: Historical per-runner race rows
//! - event_predictions: Ranking output plus post-race actuals

use rusqlite::{Connection, Result};

/// Create all tables in the database
pub fn create_tables(conn: &Connection) -> Result<()> {
    // Race-day entrants
    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS event_runners (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            selection_id INTEGER NOT NULL,
            selection_name TEXT NOT NULL,
            event_name TEXT NOT NULL,
            event_date TEXT NOT NULL,
            event_time TEXT NOT NULL,
            price TEXT,
            distance TEXT NOT NULL,
            race_category TEXT,
            track_condition TEXT,
            runner_count INTEGER,
            track TEXT,
            race_class TEXT,
            race_link TEXT,
            created_at TEXT DEFAULT (datetime('now')),
            UNIQUE(event_date, event_name, event_time, selection_id)
        )
        "#,
        [],
    )?;

    // Historical form, one row per past race
    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS selections_form (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            selection_id INTEGER NOT NULL,
            race_date TEXT NOT NULL,
            position TEXT NOT NULL,
            rating REAL,
            race_type TEXT,
            course TEXT,
            distance TEXT NOT NULL,
            going TEXT,
            starting_price TEXT,
            age TEXT,
            trainer TEXT,
            sex TEXT,
            sire TEXT,
            dam TEXT,
            owner TEXT,
            UNIQUE(selection_id, race_date)
        )
        "#,
        [],
    )?;

    // Ranking output
    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS event_predictions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_date TEXT NOT NULL,
            event_time TEXT NOT NULL,
            event_name TEXT NOT NULL,
            selection_id INTEGER NOT NULL,
            selection_name TEXT NOT NULL,
            odds TEXT,
            clean_bet_score REAL NOT NULL,
            average_position REAL NOT NULL,
            average_rating REAL NOT NULL,
            trainer TEXT,
            selection_position TEXT,
            current_event_price TEXT,
            UNIQUE(event_date, event_time, selection_id)
        )
        "#,
        [],
    )?;

    // Indexes for common queries
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_runners_date ON event_runners(event_date)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_form_selection ON selections_form(selection_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_predictions_slot ON event_predictions(event_date, event_time)",
        [],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_create_tables() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();

        let count: i32 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN
                 ('event_runners', 'selections_form', 'event_predictions')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 3);
    }

    #[test]
    fn test_create_tables_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        create_tables(&conn).unwrap();
    }
}
