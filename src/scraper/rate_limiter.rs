//! Token bucket rate limiter for the form site.

use rand::Rng;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

use crate::config::ScraperConfig;

/// Token bucket with a jittered pause after each acquire
pub struct RateLimiter {
    state: Mutex<BucketState>,
}

struct BucketState {
    tokens: f64,
    last_update: Instant,
    max_tokens: f64,
    /// Tokens per second
    refill_rate: f64,
    min_delay: Duration,
    max_delay: Duration,
}

impl BucketState {
    fn refill(&mut self, now: Instant) {
        let elapsed = now.duration_since(self.last_update).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.max_tokens);
        self.last_update = now;
    }

    /// Take a token and return how long the caller must wait
    fn take(&mut self, jitter: f64) -> Duration {
        self.refill(Instant::now());

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            let spread = self.max_delay.saturating_sub(self.min_delay);
            self.min_delay + spread.mul_f64(jitter)
        } else {
            // Borrow the next token; refill during the wait pays it back
            let wait = (1.0 - self.tokens) / self.refill_rate;
            self.tokens -= 1.0;
            Duration::from_secs_f64(wait) + self.min_delay
        }
    }
}

impl RateLimiter {
    pub fn new(requests_per_minute: u32, min_delay_secs: f64, max_delay_secs: f64) -> Self {
        let requests_per_minute = requests_per_minute.max(1);
        let max_tokens = requests_per_minute as f64;
        let min_delay = Duration::from_secs_f64(min_delay_secs.max(0.0));
        let max_delay = Duration::from_secs_f64(max_delay_secs.max(0.0)).max(min_delay);

        Self {
            state: Mutex::new(BucketState {
                tokens: max_tokens,
                last_update: Instant::now(),
                max_tokens,
                refill_rate: requests_per_minute as f64 / 60.0,
                min_delay,
                max_delay,
            }),
        }
    }

    pub fn from_config(config: &ScraperConfig) -> Self {
        Self::new(
            config.requests_per_minute,
            config.min_delay_secs,
            config.max_delay_secs,
        )
    }

    /// Acquire a token, waiting if necessary
    pub async fn acquire(&self) {
        let jitter = rand::thread_rng().gen::<f64>();
        let delay = self.state.lock().await.take(jitter);
        tokio::time::sleep(delay).await;
    }
}
