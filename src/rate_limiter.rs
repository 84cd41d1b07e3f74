use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::debug;

/// Sliding-window limiter that keeps request rates under the workspace quota
#[derive(Clone)]
pub struct RateLimiter {
    requests: usize,
    window: Duration,
    sent: Arc<Mutex<VecDeque<Instant>>>,
}

impl RateLimiter {
    /// Creates a limiter allowing `requests_per_minute` calls
    pub fn new(requests_per_minute: usize) -> Self {
        Self::with_window(requests_per_minute, Duration::from_secs(60))
    }

    /// Creates a limiter allowing `requests` calls per `window`
    pub fn with_window(requests: usize, window: Duration) -> Self {
        Self {
            requests: requests.max(1),
            window,
            sent: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// Waits until a request fits in the window, then records it
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut sent = self.sent.lock().await;

                let now = Instant::now();
                while let Some(&oldest) = sent.front() {
                    if now.duration_since(oldest) >= self.window {
                        sent.pop_front();
                    } else {
                        break;
                    }
                }

                if sent.len() < self.requests {
                    sent.push_back(now);
                    return;
                }

                // Sleep until the oldest request leaves the window.
                sent.front()
                    .map(|&oldest| self.window.saturating_sub(now.duration_since(oldest)))
                    .unwrap_or_default()
            };

            debug!(wait_ms = wait.as_millis() as u64, "rate limit reached, waiting");
            sleep(wait.max(Duration::from_millis(10))).await;
        }
    }

    /// Number of requests counted in the current window
    pub async fn in_window(&self) -> usize {
        let mut sent = self.sent.lock().await;
        let now = Instant::now();
        sent.retain(|&at| now.duration_since(at) < self.window);
        sent.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_allows_requests_within_limit() {
        let limiter = RateLimiter::new(3);
        for _ in 0..3 {
            limiter.acquire().await;
        }
        assert_eq!(limiter.in_window().await, 3);
    }

    #[tokio::test]
    async fn test_waits_when_window_is_full() {
        let limiter = RateLimiter::with_window(2, Duration::from_millis(200));

        let start = Instant::now();
        for _ in 0..3 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() >= Duration::from_millis(150));
    }

    #[tokio::test]
    async fn test_window_slides() {
        let limiter = RateLimiter::with_window(5, Duration::from_millis(50));
        limiter.acquire().await;
        limiter.acquire().await;
        assert_eq!(limiter.in_window().await, 2);

        sleep(Duration::from_millis(80)).await;
        assert_eq!(limiter.in_window().await, 0);
    }
}
