//! Minimal request spacing shared by the HTTP clients.

use std::time::Duration;
use tokio::time::{Instant, sleep};

/// Ensures consecutive requests are at least `min_interval` apart.
#[derive(Debug)]
pub(crate) struct RateLimiter {
    last_request: Instant,
    min_interval: Duration,
}

impl RateLimiter {
    pub(crate) fn new(min_interval: Duration) -> Self {
        Self {
            last_request: Instant::now()
                .checked_sub(min_interval)
                .unwrap_or_else(Instant::now),
            min_interval,
        }
    }

    pub(crate) async fn wait(&mut self) {
        let elapsed = self.last_request.elapsed();
        if elapsed < self.min_interval {
            sleep(self.min_interval - elapsed).await;
        }
        self.last_request = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_request_is_not_delayed() {
        let mut limiter = RateLimiter::new(Duration::from_secs(5));
        let start = Instant::now();
        limiter.wait().await;
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_second_request_waits_for_interval() {
        let mut limiter = RateLimiter::new(Duration::from_millis(50));
        limiter.wait().await;
        let start = Instant::now();
        limiter.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(45));
    }
}
