//! HTTP client for published race results.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

use super::{form_url, FormPageParser, RaceResult, RateLimiter};
use crate::config::ScraperConfig;
use crate::retry::{retry_when, RetryConfig};

const USER_AGENT: &str = concat!("racing-api/", env!("CARGO_PKG_VERSION"));

/// Where post-race results come from
pub trait ResultSource {
    /// The selection's run on `race_date`, or `None` while unpublished
    fn fetch_result(
        &self,
        selection_id: i64,
        race_date: NaiveDate,
    ) -> impl Future<Output = Result<Option<RaceResult>>> + Send;
}

/// Fetches form pages over HTTP, rate limited and retried
pub struct WebResultSource {
    client: reqwest::Client,
    base_url: String,
    limiter: RateLimiter,
    retry: RetryConfig,
}

impl WebResultSource {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            limiter: RateLimiter::from_config(config),
            retry: RetryConfig::network(),
        })
    }

    /// Page body, or `None` on 404
    async fn fetch_page(&self, url: &str) -> Result<Option<String>> {
        self.limiter.acquire().await;

        let response = self.client.get(url).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let body = response.error_for_status()?.text().await?;
        Ok(Some(body))
    }
}

/// Client errors other than 404 will not fix themselves
fn is_transient(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<reqwest::Error>()
        .and_then(|e| e.status())
        .map_or(true, |status| !status.is_client_error())
}

impl ResultSource for WebResultSource {
    async fn fetch_result(
        &self,
        selection_id: i64,
        race_date: NaiveDate,
    ) -> Result<Option<RaceResult>> {
        let url = form_url(&self.base_url, selection_id);
        let name = format!("fetch form {}", selection_id);

        let page = retry_when(&self.retry, &name, || self.fetch_page(&url), is_transient)
            .await
            .with_context(|| format!("Failed to fetch {}", url))?;

        let Some(html) = page else {
            debug!("No form page for selection {}", selection_id);
            return Ok(None);
        };

        Ok(FormPageParser::find(&html, race_date))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors() {
        assert!(is_transient(&anyhow::anyhow!("connection reset")));
    }

    #[test]
    fn test_new_trims_base_url() {
        let config = ScraperConfig {
            base_url: "https://form.example.com/".to_string(),
            ..Default::default()
        };
        let source = WebResultSource::new(&config).unwrap();
        assert_eq!(source.base_url, "https://form.example.com");
    }
}
