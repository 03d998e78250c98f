use parking_lot::Mutex;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

/// Caps in-flight LLM calls and requests-per-minute. The semaphore bounds
/// concurrency directly; the token bucket enforces the RPM ceiling
/// independent of how many callers are waiting.
pub struct RateLimiter {
    concurrency: Semaphore,
    bucket: Mutex<TokenBucket>,
}

struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl RateLimiter {
    pub fn new(max_concurrent: usize, max_per_minute: u32) -> Self {
        Self {
            concurrency: Semaphore::new(max_concurrent),
            bucket: Mutex::new(TokenBucket {
                capacity: max_per_minute as f64,
                tokens: max_per_minute as f64,
                refill_per_sec: max_per_minute as f64 / 60.0,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Waits until both a concurrency slot and a rate-limit token are
    /// available, then returns a guard releasing the concurrency slot on
    /// drop.
    pub async fn acquire(&self) -> tokio::sync::SemaphorePermit<'_> {
        let permit = self
            .concurrency
            .acquire()
            .await
            .expect("rate limiter semaphore is never closed");
        loop {
            let wait = {
                let mut bucket = self.bucket.lock();
                bucket.refill();
                if bucket.tokens >= 1.0 {
                    bucket.tokens -= 1.0;
                    None
                } else {
                    Some(Duration::from_secs_f64(
                        (1.0 - bucket.tokens) / bucket.refill_per_sec,
                    ))
                }
            };
            match wait {
                None => return permit,
                Some(delay) => tokio::time::sleep(delay).await,
            }
        }
    }
}

impl TokenBucket {
    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.last_refill = now;
    }
}
