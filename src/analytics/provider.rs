//! The upstream analytics provider boundary (§1, out of scope): account
//! metadata, transfer history, token holdings, topic messages. One `reqwest`
//! implementation for production, one in-memory stub for tests and local
//! runs without network access — mirrors this codebase's pattern of pairing
//! a live scraper with a fixture-backed twin.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use super::types::{AccountInfo, AnalyticsError, TokenBalance, TopicMessage, Transfer};

#[async_trait]
pub trait AnalyticsProvider: Send + Sync {
    async fn account_info(&self, account: &str) -> Result<AccountInfo, AnalyticsError>;
    async fn transactions(&self, account: &str, limit: usize) -> Result<Vec<Transfer>, AnalyticsError>;
    async fn token_balances(&self, account: &str) -> Result<Vec<TokenBalance>, AnalyticsError>;
    async fn topic_messages(&self, account: &str) -> Result<Vec<TopicMessage>, AnalyticsError>;
}

pub struct HttpAnalyticsProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpAnalyticsProvider {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self { client, base_url: base_url.into(), api_key: api_key.into() }
    }

    fn map_status(status: reqwest::StatusCode) -> AnalyticsError {
        match status.as_u16() {
            404 => AnalyticsError::NotFound,
            400..=499 => AnalyticsError::Invalid(status.to_string()),
            429 => AnalyticsError::RateLimited { retry_after_seconds: 1 },
            _ => AnalyticsError::Unavailable,
        }
    }
}

#[async_trait]
impl AnalyticsProvider for HttpAnalyticsProvider {
    async fn account_info(&self, account: &str) -> Result<AccountInfo, AnalyticsError> {
        let url = format!("{}/api/v1/accounts/{}", self.base_url, account);
        let response = self
            .client
            .get(&url)
            .header("x-api-key", &self.api_key)
            .send()
            .await
            .map_err(|_| AnalyticsError::Unavailable)?;
        if !response.status().is_success() {
            return Err(Self::map_status(response.status()));
        }
        response.json().await.map_err(|e| AnalyticsError::Internal(e.to_string()))
    }

    async fn transactions(&self, account: &str, limit: usize) -> Result<Vec<Transfer>, AnalyticsError> {
        let url = format!("{}/api/v1/accounts/{}/transactions?limit={}", self.base_url, account, limit);
        let response = self
            .client
            .get(&url)
            .header("x-api-key", &self.api_key)
            .send()
            .await
            .map_err(|_| AnalyticsError::Unavailable)?;
        if !response.status().is_success() {
            return Err(Self::map_status(response.status()));
        }
        response.json().await.map_err(|e| AnalyticsError::Internal(e.to_string()))
    }

    async fn token_balances(&self, account: &str) -> Result<Vec<TokenBalance>, AnalyticsError> {
        let url = format!("{}/api/v1/accounts/{}/tokens", self.base_url, account);
        let response = self
            .client
            .get(&url)
            .header("x-api-key", &self.api_key)
            .send()
            .await
            .map_err(|_| AnalyticsError::Unavailable)?;
        if !response.status().is_success() {
            return Err(Self::map_status(response.status()));
        }
        response.json().await.map_err(|e| AnalyticsError::Internal(e.to_string()))
    }

    async fn topic_messages(&self, account: &str) -> Result<Vec<TopicMessage>, AnalyticsError> {
        let url = format!("{}/api/v1/accounts/{}/topic-messages", self.base_url, account);
        let response = self
            .client
            .get(&url)
            .header("x-api-key", &self.api_key)
            .send()
            .await
            .map_err(|_| AnalyticsError::Unavailable)?;
        if !response.status().is_success() {
            return Err(Self::map_status(response.status()));
        }
        response.json().await.map_err(|e| AnalyticsError::Internal(e.to_string()))
    }
}

/// Deterministic in-memory provider for tests: pre-seed per-account fixtures,
/// or configure accounts to fail in a specific way to exercise retry/circuit-breaker paths.
#[derive(Default)]
pub struct StubAnalyticsProvider {
    pub accounts: Mutex<HashMap<String, AccountInfo>>,
    pub transfers: Mutex<HashMap<String, Vec<Transfer>>>,
    pub balances: Mutex<HashMap<String, Vec<TokenBalance>>>,
    pub topics: Mutex<HashMap<String, Vec<TopicMessage>>>,
    /// When set, every call for this account fails with this error instead of succeeding.
    pub failing_accounts: Mutex<HashMap<String, AnalyticsErrorKind>>,
}

#[derive(Debug, Clone, Copy)]
pub enum AnalyticsErrorKind {
    Unavailable,
    NotFound,
    Invalid,
}

impl StubAnalyticsProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_account(&self, account: &str, created_at: i64) {
        self.accounts.lock().unwrap().insert(
            account.to_string(),
            AccountInfo { account: account.to_string(), created_at },
        );
    }

    pub fn seed_transfers(&self, account: &str, transfers: Vec<Transfer>) {
        self.transfers.lock().unwrap().insert(account.to_string(), transfers);
    }

    pub fn seed_balances(&self, account: &str, balances: Vec<TokenBalance>) {
        self.balances.lock().unwrap().insert(account.to_string(), balances);
    }

    pub fn seed_topics(&self, account: &str, topics: Vec<TopicMessage>) {
        self.topics.lock().unwrap().insert(account.to_string(), topics);
    }

    pub fn set_failing(&self, account: &str, kind: AnalyticsErrorKind) {
        self.failing_accounts.lock().unwrap().insert(account.to_string(), kind);
    }

    fn check_failure(&self, account: &str) -> Result<(), AnalyticsError> {
        match self.failing_accounts.lock().unwrap().get(account) {
            Some(AnalyticsErrorKind::Unavailable) => Err(AnalyticsError::Unavailable),
            Some(AnalyticsErrorKind::NotFound) => Err(AnalyticsError::NotFound),
            Some(AnalyticsErrorKind::Invalid) => Err(AnalyticsError::Invalid("stubbed".to_string())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl AnalyticsProvider for StubAnalyticsProvider {
    async fn account_info(&self, account: &str) -> Result<AccountInfo, AnalyticsError> {
        self.check_failure(account)?;
        self.accounts
            .lock()
            .unwrap()
            .get(account)
            .cloned()
            .ok_or(AnalyticsError::NotFound)
    }

    async fn transactions(&self, account: &str, limit: usize) -> Result<Vec<Transfer>, AnalyticsError> {
        self.check_failure(account)?;
        Ok(self
            .transfers
            .lock()
            .unwrap()
            .get(account)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .take(limit)
            .collect())
    }

    async fn token_balances(&self, account: &str) -> Result<Vec<TokenBalance>, AnalyticsError> {
        self.check_failure(account)?;
        Ok(self.balances.lock().unwrap().get(account).cloned().unwrap_or_default())
    }

    async fn topic_messages(&self, account: &str) -> Result<Vec<TopicMessage>, AnalyticsError> {
        self.check_failure(account)?;
        Ok(self.topics.lock().unwrap().get(account).cloned().unwrap_or_default())
    }
}
