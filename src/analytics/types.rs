//! Typed records returned by the upstream analytics provider (§4.1) and the
//! failure taxonomy its calls can produce.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountInfo {
    pub account: String,
    /// Epoch-ms account creation time.
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferDirection {
    In,
    Out,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transfer {
    pub counterparty: String,
    pub direction: TransferDirection,
    /// Absolute magnitude of the transfer, in the ledger's native display units.
    pub amount: f64,
    /// Epoch-ms transfer time.
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenBalance {
    pub token_id: String,
    pub balance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicMessage {
    pub topic_id: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone)]
pub enum AnalyticsError {
    Unavailable,
    RateLimited { retry_after_seconds: u64 },
    NotFound,
    Invalid(String),
    Internal(String),
}

impl std::fmt::Display for AnalyticsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalyticsError::Unavailable => write!(f, "analytics provider unavailable"),
            AnalyticsError::RateLimited { retry_after_seconds } => {
                write!(f, "analytics provider rate limited, retry after {retry_after_seconds}s")
            }
            AnalyticsError::NotFound => write!(f, "account not found"),
            AnalyticsError::Invalid(msg) => write!(f, "invalid analytics request: {msg}"),
            AnalyticsError::Internal(msg) => write!(f, "internal analytics error: {msg}"),
        }
    }
}

impl std::error::Error for AnalyticsError {}

impl AnalyticsError {
    /// §4.1: only `Unavailable`/5xx-equivalent failures count toward retry and
    /// the circuit breaker; `NotFound`/`Invalid` are terminal.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AnalyticsError::Unavailable | AnalyticsError::Internal(_))
    }
}
