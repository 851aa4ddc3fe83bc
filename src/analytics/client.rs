//! The retrying, caching, circuit-broken wrapper around any [`AnalyticsProvider`] (§4.1).
//! Grounded on this codebase's `execute_with_retry` exponential-backoff idiom
//! for upstream HTTP calls, generalized with a cache-fallback and circuit breaker.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

use super::cache::{CacheLookup, TtlCache};
use super::circuit_breaker::CircuitBreaker;
use super::provider::AnalyticsProvider;
use super::types::{AccountInfo, AnalyticsError, TokenBalance, TopicMessage, Transfer};

const MAX_ATTEMPTS: u32 = 3;
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const CACHE_TTL: Duration = Duration::from_secs(3600);

pub struct AnalyticsBundle {
    pub account_info: Option<AccountInfo>,
    pub transfers: Option<Vec<Transfer>>,
    pub balances: Option<Vec<TokenBalance>>,
    pub topics: Option<Vec<TopicMessage>>,
    /// Component-input names that could not be fetched at all (not even from cache).
    pub failed: Vec<&'static str>,
    pub stale: bool,
}

pub struct AnalyticsClient<P: AnalyticsProvider> {
    provider: P,
    account_cache: TtlCache<AccountInfo>,
    transfers_cache: TtlCache<Vec<Transfer>>,
    balances_cache: TtlCache<Vec<TokenBalance>>,
    topics_cache: TtlCache<Vec<TopicMessage>>,
    breaker: CircuitBreaker,
}

impl<P: AnalyticsProvider> AnalyticsClient<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            account_cache: TtlCache::new(CACHE_TTL),
            transfers_cache: TtlCache::new(CACHE_TTL),
            balances_cache: TtlCache::new(CACHE_TTL),
            topics_cache: TtlCache::new(CACHE_TTL),
            breaker: CircuitBreaker::new(),
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub async fn account_info(&self, account: &str) -> (Option<AccountInfo>, bool) {
        self.call_with_retry(&self.account_cache, account, || self.provider.account_info(account))
            .await
    }

    pub async fn transactions(&self, account: &str, limit: usize) -> (Option<Vec<Transfer>>, bool) {
        let key = format!("{account}:{limit}");
        self.call_with_retry(&self.transfers_cache, &key, || self.provider.transactions(account, limit))
            .await
    }

    pub async fn token_balances(&self, account: &str) -> (Option<Vec<TokenBalance>>, bool) {
        self.call_with_retry(&self.balances_cache, account, || self.provider.token_balances(account))
            .await
    }

    pub async fn topic_messages(&self, account: &str) -> (Option<Vec<TopicMessage>>, bool) {
        self.call_with_retry(&self.topics_cache, account, || self.provider.topic_messages(account))
            .await
    }

    /// Assembles everything the scoring engine needs for one account, degrading
    /// gracefully per input per §4.3 partial-score semantics.
    pub async fn bundle(&self, account: &str) -> AnalyticsBundle {
        let (account_info, account_stale) = self.account_info(account).await;
        let (transfers, transfers_stale) = self.transactions(account, 1000).await;
        let (balances, balances_stale) = self.token_balances(account).await;
        let (topics, topics_stale) = self.topic_messages(account).await;

        let mut failed = Vec::new();
        if account_info.is_none() {
            failed.push("accountAge");
        }
        if transfers.is_none() {
            failed.push("diversity");
            failed.push("volatility");
        }
        if balances.is_none() {
            failed.push("tokenHealth");
        }
        if topics.is_none() {
            failed.push("hcsQuality");
        }

        AnalyticsBundle {
            account_info,
            transfers,
            balances,
            topics,
            failed,
            stale: account_stale || transfers_stale || balances_stale || topics_stale,
        }
    }

    /// Exponential backoff retry (1s, 2s, 4s) with cache fallback and circuit breaking.
    /// Returns `(value, stale)` where `value` is `None` only when every retry was
    /// exhausted, the breaker was open, and there was no cache entry to fall back to.
    async fn call_with_retry<T, F, Fut>(&self, cache: &TtlCache<T>, key: &str, op: F) -> (Option<T>, bool)
    where
        T: Clone,
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, AnalyticsError>>,
    {
        if !self.breaker.allow_call() {
            warn!(key, "circuit breaker open, failing fast without contacting upstream");
            return self.fallback(cache, key);
        }

        let mut backoff = INITIAL_BACKOFF;
        let mut rate_limit_wait_used = false;

        for attempt in 0..MAX_ATTEMPTS {
            match op().await {
                Ok(value) => {
                    self.breaker.record_success();
                    cache.put(key, value.clone());
                    return (Some(value), false);
                }
                Err(AnalyticsError::RateLimited { retry_after_seconds }) if !rate_limit_wait_used => {
                    rate_limit_wait_used = true;
                    debug!(key, retry_after_seconds, "rate limited, honoring retry-after");
                    sleep(Duration::from_secs(retry_after_seconds)).await;
                    continue;
                }
                Err(err) if err.is_retryable() => {
                    warn!(key, attempt, %err, "retryable analytics failure");
                    self.breaker.record_failure();
                    if attempt + 1 < MAX_ATTEMPTS {
                        sleep(backoff).await;
                        backoff *= 2;
                    }
                }
                Err(err) => {
                    debug!(key, %err, "terminal analytics failure, not retrying");
                    return self.fallback(cache, key);
                }
            }
        }

        self.fallback(cache, key)
    }

    fn fallback<T: Clone>(&self, cache: &TtlCache<T>, key: &str) -> (Option<T>, bool) {
        match cache.get(key) {
            CacheLookup::Fresh(value) => (Some(value), false),
            CacheLookup::Stale(value) => (Some(value), true),
            CacheLookup::Miss => (None, false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::provider::{AnalyticsErrorKind, StubAnalyticsProvider};

    #[tokio::test]
    async fn fetches_fresh_data_on_success() {
        let provider = StubAnalyticsProvider::new();
        provider.seed_account("0.0.2", 1_000);
        let client = AnalyticsClient::new(provider);
        let (info, stale) = client.account_info("0.0.2").await;
        assert!(info.is_some());
        assert!(!stale);
    }

    #[tokio::test]
    async fn falls_back_to_cache_on_unavailable_after_retries() {
        let provider = StubAnalyticsProvider::new();
        provider.seed_account("0.0.2", 1_000);
        let client = AnalyticsClient::new(provider);

        // Warm the cache with a success.
        client.account_info("0.0.2").await;

        // Now make every call fail; the circuit breaker hasn't tripped yet
        // (only 1 failure so far), so the retries run and then fall back to cache, stale.
        client.provider.set_failing("0.0.2", AnalyticsErrorKind::Unavailable);
        let (info, stale) = client.account_info("0.0.2").await;
        assert!(info.is_some());
        assert!(stale);
    }

    #[tokio::test]
    async fn terminal_errors_are_not_retried() {
        let provider = StubAnalyticsProvider::new();
        provider.set_failing("0.0.404", AnalyticsErrorKind::NotFound);
        let client = AnalyticsClient::new(provider);
        let (info, stale) = client.account_info("0.0.404").await;
        assert!(info.is_none());
        assert!(!stale);
    }

    #[tokio::test]
    async fn bundle_marks_missing_components_as_failed() {
        let provider = StubAnalyticsProvider::new();
        provider.set_failing("0.0.404", AnalyticsErrorKind::NotFound);
        let client = AnalyticsClient::new(provider);
        let bundle = client.bundle("0.0.404").await;
        assert!(bundle.account_info.is_none());
        assert!(bundle.failed.contains(&"accountAge"));
    }
}
