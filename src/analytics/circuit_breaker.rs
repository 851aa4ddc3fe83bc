//! Closed -> Open -> HalfOpen circuit breaker around the analytics provider (§4.1).
//! Grounded on this codebase's `DataSourceKillSwitch`, generalized from a
//! latency/consecutive-failure trip into the spec's three-state machine with
//! an explicit recovery timer instead of a one-way kill switch.

use parking_lot::Mutex;
use std::time::{Duration, Instant};

const FAILURE_THRESHOLD: u32 = 5;
const OPEN_DURATION: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed,
    Open,
    HalfOpen,
}

struct Inner {
    state: State,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

pub struct CircuitBreaker {
    inner: Mutex<Inner>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner { state: State::Closed, consecutive_failures: 0, opened_at: None }),
        }
    }

    /// Returns true if a call should be allowed through. An Open breaker whose
    /// timer has elapsed transitions to HalfOpen and allows exactly the probe call.
    pub fn allow_call(&self) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            State::Closed | State::HalfOpen => true,
            State::Open => {
                let elapsed = inner.opened_at.map(|t| t.elapsed()).unwrap_or_default();
                if elapsed >= OPEN_DURATION {
                    inner.state = State::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        inner.state = State::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            State::HalfOpen => {
                inner.state = State::Open;
                inner.opened_at = Some(Instant::now());
            }
            State::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= FAILURE_THRESHOLD {
                    inner.state = State::Open;
                    inner.opened_at = Some(Instant::now());
                }
            }
            State::Open => {}
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self.inner.lock().state, State::Open)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_after_five_consecutive_failures() {
        let breaker = CircuitBreaker::new();
        for _ in 0..4 {
            breaker.record_failure();
            assert!(breaker.allow_call());
        }
        breaker.record_failure();
        assert!(!breaker.allow_call());
        assert!(breaker.is_open());
    }

    #[test]
    fn success_resets_failure_count() {
        let breaker = CircuitBreaker::new();
        for _ in 0..4 {
            breaker.record_failure();
        }
        breaker.record_success();
        for _ in 0..4 {
            breaker.record_failure();
            assert!(breaker.allow_call());
        }
    }

    #[test]
    fn half_open_failure_reopens_and_restarts_timer() {
        let breaker = CircuitBreaker::new();
        for _ in 0..5 {
            breaker.record_failure();
        }
        assert!(breaker.is_open());
        {
            let mut inner = breaker.inner.lock();
            inner.opened_at = Some(Instant::now() - Duration::from_secs(61));
        }
        assert!(breaker.allow_call()); // transitions to HalfOpen
        breaker.record_failure();
        assert!(breaker.is_open());
        assert!(!breaker.allow_call());
    }

    #[test]
    fn half_open_success_closes_breaker() {
        let breaker = CircuitBreaker::new();
        for _ in 0..5 {
            breaker.record_failure();
        }
        {
            let mut inner = breaker.inner.lock();
            inner.opened_at = Some(Instant::now() - Duration::from_secs(61));
        }
        assert!(breaker.allow_call());
        breaker.record_success();
        assert!(breaker.allow_call());
        assert!(!breaker.is_open());
    }
}
