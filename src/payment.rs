//! 402-challenge payment types and the integer-string amount comparisons the
//! whole mesh relies on. Mission: never parse a ledger amount as a float.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};

use crate::models::Currency;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    pub scheme: String,
    pub network: String,
    pub asset: String,
    pub pay_to: String,
    /// Integer smallest-unit amount, stored as a string.
    pub max_amount_required: String,
    pub resource: String,
    pub description: String,
    pub mime_type: String,
    pub max_timeout_seconds: u64,
}

impl PaymentRequirements {
    pub fn exact(
        network: impl Into<String>,
        currency: Currency,
        pay_to: impl Into<String>,
        amount: impl Into<String>,
        resource: impl Into<String>,
        max_timeout_seconds: u64,
    ) -> Self {
        let asset = match currency {
            Currency::Native => "HBAR".to_string(),
            Currency::Stable => "USDC".to_string(),
        };
        Self {
            scheme: "exact".to_string(),
            network: network.into(),
            asset,
            pay_to: pay_to.into(),
            max_amount_required: amount.into(),
            resource: resource.into(),
            description: "trust score computation".to_string(),
            mime_type: "application/json".to_string(),
            max_timeout_seconds,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationPayload {
    pub from: String,
    pub to: String,
    /// Integer smallest-unit amount, stored as a string.
    pub value: String,
    /// Absolute epoch-ms deadline.
    pub valid_before: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentAuthorization {
    pub version: u32,
    pub scheme: String,
    pub network: String,
    pub authorization: AuthorizationPayload,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub signature: Option<String>,
}

impl PaymentAuthorization {
    pub fn encode_header(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_vec(self)?;
        Ok(BASE64.encode(json))
    }

    pub fn decode_header(header: &str) -> anyhow::Result<Self> {
        let bytes = BASE64
            .decode(header)
            .map_err(|e| anyhow::anyhow!("invalid base64 payment header: {e}"))?;
        let auth: Self = serde_json::from_slice(&bytes)
            .map_err(|e| anyhow::anyhow!("invalid payment authorization json: {e}"))?;
        Ok(auth)
    }
}

/// What actually travels in `X-PAYMENT` on the retry (§6): the authorization
/// the consumer signed, plus the settlement transaction id the facilitator
/// returned, so the producer can hand both to the orchestrator's on-chain
/// receipt verification in one round trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptHeader {
    pub authorization: PaymentAuthorization,
    pub transaction_id: String,
}

impl ReceiptHeader {
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_vec(self)?;
        Ok(BASE64.encode(json))
    }

    pub fn decode(header: &str) -> anyhow::Result<Self> {
        let bytes = BASE64
            .decode(header)
            .map_err(|e| anyhow::anyhow!("invalid base64 payment header: {e}"))?;
        let receipt: Self = serde_json::from_slice(&bytes)
            .map_err(|e| anyhow::anyhow!("invalid receipt header json: {e}"))?;
        Ok(receipt)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReceipt {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub transaction_id: Option<String>,
    pub network: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

/// Exact string equality on integer smallest-unit amounts — never a float parse (§9).
pub fn amounts_equal(a: &str, b: &str) -> bool {
    normalize_integer_string(a) == normalize_integer_string(b)
}

fn normalize_integer_string(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let stripped = trimmed.trim_start_matches('0');
    Some(if stripped.is_empty() { "0".to_string() } else { stripped.to_string() })
}
