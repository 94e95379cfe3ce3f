use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use crate::domain::models::RateLimitConfig;

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket rate limiter for backend request throttling
///
/// Tokens refill continuously at `refill_rate` per second up to `capacity`
/// (the burst size). Each request consumes one token.
pub struct TokenBucketRateLimiter {
    bucket: Mutex<Bucket>,
    capacity: f64,
    refill_rate: f64,
}

impl TokenBucketRateLimiter {
    /// Create a limiter that starts full.
    ///
    /// Non-positive rates fall back to one request per second and a burst of
    /// zero is treated as one, so a limiter can always make progress.
    pub fn new(requests_per_second: f64, burst_size: u32) -> Self {
        let refill_rate = if requests_per_second > 0.0 {
            requests_per_second
        } else {
            1.0
        };
        let capacity = f64::from(burst_size.max(1));

        Self {
            bucket: Mutex::new(Bucket {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
            capacity,
            refill_rate,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.requests_per_second, config.burst_size)
    }

    /// Acquire a token from the bucket, waiting if necessary
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut bucket = self.bucket.lock().await;

                let now = Instant::now();
                let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
                let available = (bucket.tokens + elapsed * self.refill_rate).min(self.capacity);
                bucket.last_refill = now;

                if available >= 1.0 {
                    bucket.tokens = available - 1.0;
                    return;
                }

                bucket.tokens = available;
                let tokens_needed = 1.0 - available;
                Duration::from_secs_f64((tokens_needed / self.refill_rate).max(0.001))
            };

            sleep(wait).await;
        }
    }

    #[cfg(test)]
    async fn available_tokens(&self) -> f64 {
        let bucket = self.bucket.lock().await;
        let elapsed = Instant::now()
            .duration_since(bucket.last_refill)
            .as_secs_f64();
        (bucket.tokens + elapsed * self.refill_rate).min(self.capacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_burst_is_immediate() {
        let limiter = TokenBucketRateLimiter::new(1.0, 3);
        let start = Instant::now();

        limiter.acquire().await;
        limiter.acquire().await;
        limiter.acquire().await;

        assert!(start.elapsed() < Duration::from_millis(10));
        assert!(limiter.available_tokens().await < 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_enforces_delay_after_burst() {
        let limiter = TokenBucketRateLimiter::new(2.0, 2);
        limiter.acquire().await;
        limiter.acquire().await;

        let start = Instant::now();
        limiter.acquire().await;

        assert!(
            start.elapsed() >= Duration::from_millis(490),
            "expected ~500ms delay, got {:?}",
            start.elapsed()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_respects_capacity() {
        let limiter = TokenBucketRateLimiter::new(5.0, 5);
        sleep(Duration::from_secs(10)).await;

        let tokens = limiter.available_tokens().await;
        assert!(tokens <= 5.0, "tokens ({tokens}) exceeded capacity");
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_acquire() {
        let limiter = Arc::new(TokenBucketRateLimiter::new(10.0, 10));
        let mut handles = vec![];

        for _ in 0..20 {
            let limiter = Arc::clone(&limiter);
            handles.push(tokio::spawn(async move { limiter.acquire().await }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert!(limiter.available_tokens().await >= 0.0);
    }
}
