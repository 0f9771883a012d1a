//! Provider request throttling.
//!
//! Enforces two limits before each outbound request: a minimum interval
//! between consecutive requests and a request quota per rolling window
//! (e.g. 25 requests per 30 s).  On top of that sits an adaptive penalty
//! interval that doubles on reported failures and decays after consecutive
//! successes, so a provider that starts pushing back gets breathing room
//! without permanent slowdown.

use std::thread;
use std::time::{Duration, Instant};

pub struct RateLimiter {
    name: String,
    last_request: Option<Instant>,
    min_interval: Duration,

    window_size: Duration,
    window_limit: u32,
    window_start: Instant,
    window_count: u32,

    penalty: Duration,
    max_penalty: Duration,
    success_count: u32,
    successes_to_reduce: u32,
}

impl RateLimiter {
    /// * `name` — label for log messages (e.g. "Spotify")
    /// * `min_interval` — minimum time between any two requests
    /// * `window_limit` / `window_size` — quota per rolling window
    pub fn new(name: &str, min_interval: Duration, window_limit: u32, window_size: Duration) -> Self {
        RateLimiter {
            name: name.to_string(),
            last_request: None,
            min_interval,
            window_size,
            window_limit: window_limit.max(1),
            window_start: Instant::now(),
            window_count: 0,
            penalty: Duration::ZERO,
            max_penalty: min_interval.max(Duration::from_secs(1)) * 16,
            success_count: 0,
            successes_to_reduce: 10,
        }
    }

    /// Block until a request is allowed, then account for it.
    /// Must be called before each outbound request.
    pub fn wait_if_needed(&mut self) {
        // Roll the window forward once it has elapsed.
        if self.window_start.elapsed() > self.window_size {
            self.window_start = Instant::now();
            self.window_count = 0;
        }

        // Quota exhausted: sleep out the rest of the window.
        if self.window_count >= self.window_limit {
            let elapsed = self.window_start.elapsed();
            if elapsed < self.window_size {
                let wait = self.window_size - elapsed;
                log::debug!("[{}] window quota reached, waiting {:.1}s", self.name, wait.as_secs_f64());
                thread::sleep(wait);
            }
            self.window_start = Instant::now();
            self.window_count = 0;
        }

        // Minimum spacing plus any active penalty.
        let spacing = self.min_interval + self.penalty;
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < spacing {
                thread::sleep(spacing - elapsed);
            }
        }

        self.last_request = Some(Instant::now());
        self.window_count += 1;
    }

    /// Report a successful request.  After enough consecutive successes the
    /// penalty interval is halved.
    pub fn report_success(&mut self) {
        if self.penalty.is_zero() {
            return;
        }
        self.success_count += 1;
        if self.success_count >= self.successes_to_reduce {
            self.penalty /= 2;
            self.success_count = 0;
            log::debug!("[{}] penalty reduced to {:.1}s", self.name, self.penalty.as_secs_f64());
        }
    }

    /// Report a failed or rate-limited request.  Doubles the penalty
    /// interval up to the maximum.
    pub fn report_failure(&mut self) {
        self.penalty = if self.penalty.is_zero() {
            self.min_interval.max(Duration::from_millis(500))
        } else {
            (self.penalty * 2).min(self.max_penalty)
        };
        self.success_count = 0;
        log::warn!("[{}] backing off, penalty now {:.1}s", self.name, self.penalty.as_secs_f64());
    }

    #[cfg(test)]
    fn current_penalty(&self) -> Duration {
        self.penalty
    }
}
