//! SQLite storage module
//!
//! Persists race-day runners, scraped historical form and the
//! predictions produced by the ranking pipeline.

pub mod repository;
pub mod schema;

use std::sync::{Mutex, MutexGuard};

pub use repository::{FormRecord, Prediction, RaceRepository, Runner};

/// Lock a shared repository, surfacing poisoning as an error
pub fn lock(repo: &Mutex<RaceRepository>) -> anyhow::Result<MutexGuard<'_, RaceRepository>> {
    repo.lock()
        .map_err(|_| anyhow::anyhow!("Repository lock poisoned"))
}
