use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Token bucket shared by all guide requests.
#[derive(Clone)]
pub struct RateLimiter {
    rps: u32,
    state: Arc<Mutex<Bucket>>,
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last: Instant,
}

impl RateLimiter {
    pub fn new(rps: u32) -> Self {
        let rps = rps.max(1);
        Self {
            rps,
            state: Arc::new(Mutex::new(Bucket {
                tokens: rps as f64,
                last: Instant::now(),
            })),
        }
    }

    pub fn rps(&self) -> u32 {
        self.rps
    }

    /// Take one token, or report how long until one is available.
    pub async fn check(&self) -> Result<(), Duration> {
        let mut bucket = self.state.lock().await;
        let now = Instant::now();
        let elapsed = now.duration_since(bucket.last);
        bucket.last = now;

        let capacity = self.rps as f64;
        bucket.tokens = (bucket.tokens + elapsed.as_secs_f64() * capacity).min(capacity);

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            return Ok(());
        }
        Err(Duration::from_secs_f64((1.0 - bucket.tokens) / capacity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn burst_is_bounded_by_rps() {
        let limiter = RateLimiter::new(2);
        assert!(limiter.check().await.is_ok());
        assert!(limiter.check().await.is_ok());
        let wait = limiter.check().await.unwrap_err();
        assert!(wait <= Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn tokens_refill_over_time() {
        let limiter = RateLimiter::new(1);
        assert!(limiter.check().await.is_ok());
        assert!(limiter.check().await.is_err());
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(limiter.check().await.is_ok());
    }
}
