//! Per-(consumer, product) fixed-window rate limiting (§4.3, §5). Grounded on
//! this codebase's `RateLimitLayer`, simplified from its sliding-window-plus-burst
//! model to the spec's fixed window: the bucket resets wholesale once `periodSeconds`
//! elapses rather than decaying continuously.

use parking_lot::Mutex;
use std::collections::HashMap;

use crate::models::now_ms;

struct Bucket {
    window_start: i64,
    count: u32,
    exceeded_this_window: bool,
    exceeded_prior_window: bool,
}

pub enum RateLimitDecision {
    Allowed,
    /// `consecutive_violation` is true when this bucket also exceeded its
    /// immediately preceding window — the trigger for a `RATE_LIMIT_VIOLATION` event.
    Exceeded { retry_after_seconds: u64, consecutive_violation: bool },
}

#[derive(Default)]
pub struct RateLimiter {
    buckets: Mutex<HashMap<(String, String), Bucket>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mutates the bucket under a single lock so the count is never torn (§5).
    pub fn check_and_increment(&self, consumer_agent_id: &str, product_id: &str, limit_calls: u32, period_seconds: u64) -> RateLimitDecision {
        let key = (consumer_agent_id.to_string(), product_id.to_string());
        let now = now_ms();
        let period_ms = (period_seconds as i64) * 1000;

        let mut buckets = self.buckets.lock();
        let bucket = buckets.entry(key).or_insert(Bucket {
            window_start: now,
            count: 0,
            exceeded_this_window: false,
            exceeded_prior_window: false,
        });

        if now - bucket.window_start >= period_ms {
            bucket.exceeded_prior_window = bucket.exceeded_this_window;
            bucket.window_start = now;
            bucket.count = 0;
            bucket.exceeded_this_window = false;
        }

        bucket.count += 1;

        if bucket.count > limit_calls {
            bucket.exceeded_this_window = true;
            let retry_after_ms = (bucket.window_start + period_ms - now).max(0);
            RateLimitDecision::Exceeded {
                retry_after_seconds: (retry_after_ms as u64).div_ceil(1000),
                consecutive_violation: bucket.exceeded_prior_window,
            }
        } else {
            RateLimitDecision::Allowed
        }
    }
}
