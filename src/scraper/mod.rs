//! Result scraping from the form site.
//!
//! Provides the HTTP client, rate limiting and form page parsing.

pub mod client;
pub mod form_page;
pub mod rate_limiter;

pub use client::{ResultSource, WebResultSource};
pub use form_page::{FormPageParser, RaceResult};
pub use rate_limiter::RateLimiter;

/// Build a selection's form page URL
pub fn form_url(base_url: &str, selection_id: i64) -> String {
    format!("{}/horse/{}/form", base_url, selection_id)
}
