//! Core data model shared across every process in the mesh.
//! Mission: one validated, serializable definition per entity in the spec's data model.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque dotted-integer ledger account identifier, e.g. `0.0.7304745`.
///
/// The only way to get one is [`AccountId::parse`] — there is no `From<String>`
/// impl, so a caller can never smuggle an unvalidated string past the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountId(String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidAccountId(pub String);

impl fmt::Display for InvalidAccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' is not a valid account id (expected ^0\\.0\\.[0-9]+$)", self.0)
    }
}

impl std::error::Error for InvalidAccountId {}

impl AccountId {
    /// Validates `s` against `^0\.0\.[0-9]+$` and wraps it.
    pub fn parse(s: &str) -> Result<Self, InvalidAccountId> {
        if is_valid_account_id(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(InvalidAccountId(s.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for AccountId {
    type Error = InvalidAccountId;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<AccountId> for String {
    fn from(value: AccountId) -> Self {
        value.0
    }
}

/// Validates the shape without allocating an [`AccountId`].
///
/// `^0\.0\.[0-9]+$`: literal "0.0." followed by one or more ASCII digits, whole string.
pub fn is_valid_account_id(s: &str) -> bool {
    match s.strip_prefix("0.0.") {
        Some(rest) => !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()),
        None => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Native,
    Stable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitTerms {
    pub calls: u32,
    pub period_seconds: u64,
}

impl Default for RateLimitTerms {
    /// §4.3 default: 100 calls per 86400s when nothing was negotiated.
    fn default() -> Self {
        Self {
            calls: 100,
            period_seconds: 86_400,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sla {
    pub uptime: String,
    pub response_time: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub product_id: String,
    pub version: String,
    pub human_name: String,
    pub description: String,
    pub producer_agent_id: String,
    pub endpoint_path: String,
    /// Nonnegative decimal amount in smallest units, stored as a string — never a float.
    pub default_price: String,
    pub currency: Currency,
    pub network: String,
    pub rate_limit: RateLimitTerms,
    pub sla: Sla,
    pub created_at: i64,
    pub updated_at: i64,
    pub deprecated: bool,
}

impl Product {
    pub fn touch(&mut self) {
        self.updated_at = now_ms();
    }
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreComponents {
    pub account_age: i64,
    pub diversity: i64,
    pub volatility: i64,
    pub token_health: i64,
    pub hcs_quality: i64,
    pub risk_penalty: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskSeverity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskFlag {
    #[serde(rename = "type")]
    pub kind: String,
    pub severity: RiskSeverity,
    pub description: String,
    pub detected_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustScore {
    pub account: AccountId,
    pub score: i64,
    pub components: ScoreComponents,
    pub risk_flags: Vec<RiskFlag>,
    pub timestamp: i64,
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub stale: bool,
    /// Components that degraded to 0 because their upstream input failed.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub partial: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    Producer,
    Consumer,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRegistration {
    pub agent_id: String,
    pub role: AgentRole,
    pub capabilities: Vec<String>,
    pub registered_at: i64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub a2a_channel: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Pending,
    InProgress,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub task_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub consumer_agent_id: String,
    pub account_id: AccountId,
    pub state: TaskState,
    pub created_at: i64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub completed_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEventType {
    NegotiationStarted,
    NegotiationAgreed,
    ComputationRequested,
    ScoreDelivered,
    PaymentVerified,
    RateLimitViolation,
    ConnectionTerminated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    #[serde(rename = "type")]
    pub kind: AuditEventType,
    pub event_id: String,
    pub timestamp: i64,
    pub data: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub orchestrator_id: Option<String>,
}

impl AuditEvent {
    pub fn new(kind: AuditEventType, data: serde_json::Value) -> Self {
        Self {
            kind,
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: now_ms(),
            data,
            orchestrator_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_id_accepts_canonical_shape() {
        assert!(AccountId::parse("0.0.7304745").is_ok());
        assert!(AccountId::parse("0.0.0").is_ok());
    }

    #[test]
    fn account_id_rejects_malformed_input() {
        for bad in ["abc", "0.0.", "0.1.5", "0.0.5a", " 0.0.5", "0.0.5 ", ""] {
            assert!(AccountId::parse(bad).is_err(), "expected {bad:?} to be rejected");
        }
    }

    #[test]
    fn default_rate_limit_matches_spec() {
        let terms = RateLimitTerms::default();
        assert_eq!(terms.calls, 100);
        assert_eq!(terms.period_seconds, 86_400);
    }

    proptest::proptest! {
        #[test]
        fn account_id_validator_matches_regex_shape(s in "\\PC*") {
            let expected = {
                let bytes = s.as_bytes();
                if let Some(rest) = s.strip_prefix("0.0.") {
                    !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit())
                } else {
                    let _ = bytes;
                    false
                }
            };
            proptest::prop_assert_eq!(is_valid_account_id(&s), expected);
        }
    }
}
