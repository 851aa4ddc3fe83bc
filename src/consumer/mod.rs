//! Consumer (C4): discovers products, negotiates terms, and drives the
//! 402-challenge -> authorize -> facilitator verify -> settle -> retry loop.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use parking_lot::RwLock;

use crate::ap2::{NegotiationRequest, Offer};
use crate::mesh_client::OrchestratorClient;
use crate::models::{now_ms, AccountId, AgentRole, AuditEvent, AuditEventType, Currency, Product, RateLimitTerms, TrustScore};
use crate::payment::{AuthorizationPayload, PaymentAuthorization, PaymentRequirements, ReceiptHeader};

const DEFAULT_MAX_TIMEOUT_SECONDS: u64 = 30;

pub struct Consumer {
    client: reqwest::Client,
    facilitator_endpoint: String,
    orchestrator: Arc<OrchestratorClient>,
    agent_id: String,
    offers: RwLock<HashMap<String, Offer>>,
}

#[derive(Debug)]
pub struct ConsumerError {
    pub code: String,
    pub message: String,
}

impl std::fmt::Display for ConsumerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ConsumerError {}

impl ConsumerError {
    fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self { code: code.into(), message: message.into() }
    }
}

impl Consumer {
    pub fn new(client: reqwest::Client, facilitator_endpoint: impl Into<String>, orchestrator: Arc<OrchestratorClient>, agent_id: impl Into<String>) -> Self {
        Self { client, facilitator_endpoint: facilitator_endpoint.into(), orchestrator, agent_id: agent_id.into(), offers: RwLock::new(HashMap::new()) }
    }

    pub async fn register(&self) {
        let _ = self.orchestrator.register(&self.agent_id, AgentRole::Consumer, vec!["trustscore.basic.v1".to_string()]).await;
    }

    pub async fn discover_products(&self, producer_endpoint: &str) -> anyhow::Result<Vec<Product>> {
        let url = format!("{producer_endpoint}/products");
        let products = self.client.get(&url).send().await?.json::<Vec<Product>>().await?;
        Ok(products)
    }

    pub async fn negotiate(&self, producer_endpoint: &str, product_id: &str, max_price: Option<&str>) -> Result<Offer, ConsumerError> {
        let request = NegotiationRequest::new(
            product_id,
            max_price.unwrap_or("999999999999"),
            Currency::Native,
            RateLimitTerms::default(),
            &self.agent_id,
        );

        let url = format!("{producer_endpoint}/ap2/negotiate");
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ConsumerError::new("NEGOTIATION_TRANSPORT_ERROR", e.to_string()))?;

        if !response.status().is_success() {
            let body: serde_json::Value = response.json().await.unwrap_or_default();
            return Err(ConsumerError::new(
                body["error"]["code"].as_str().unwrap_or("NEGOTIATION_FAILED").to_string(),
                body["error"]["message"].as_str().unwrap_or("negotiation failed").to_string(),
            ));
        }

        let offer: Offer = response.json().await.map_err(|e| ConsumerError::new("INVALID_OFFER", e.to_string()))?;
        if offer.product_id != product_id {
            return Err(ConsumerError::new("OFFER_PRODUCT_MISMATCH", "offer product id does not match the request"));
        }
        if offer.is_expired_at(now_ms()) {
            return Err(ConsumerError::new("OFFER_EXPIRED", "producer returned an already-expired offer"));
        }

        self.offers.write().insert(product_id.to_string(), offer.clone());
        Ok(offer)
    }

    fn live_offer(&self, product_id: &str) -> Option<Offer> {
        let offer = self.offers.read().get(product_id).cloned()?;
        if offer.is_expired_at(now_ms()) {
            self.offers.write().remove(product_id);
            return None;
        }
        Some(offer)
    }

    pub async fn request_score(&self, account_id: &AccountId, producer_endpoint: &str, product_id: &str) -> Result<TrustScore, ConsumerError> {
        if self.live_offer(product_id).is_none() {
            self.negotiate(producer_endpoint, product_id, None).await?;
        }

        let url = format!("{producer_endpoint}/trustscore/{}", account_id.as_str());
        let response = self
            .client
            .get(&url)
            .header("X-Agent-Id", &self.agent_id)
            .send()
            .await
            .map_err(|e| ConsumerError::new("TRANSPORT_ERROR", e.to_string()))?;

        match response.status().as_u16() {
            200 => response.json::<TrustScore>().await.map_err(|e| ConsumerError::new("INVALID_RESPONSE", e.to_string())),
            402 => {
                let body: serde_json::Value = response.json().await.unwrap_or_default();
                let requirements: PaymentRequirements =
                    serde_json::from_value(body["error"]["details"]["payment"].clone()).map_err(|_| ConsumerError::new("MISSING_PAYMENT_REQUIREMENTS", "402 response carried no payment requirements"))?;

                let header = self.pay_for_access(&requirements).await?;

                let retried = self
                    .client
                    .get(&url)
                    .header("X-Agent-Id", &self.agent_id)
                    .header("X-PAYMENT", header)
                    .send()
                    .await
                    .map_err(|e| ConsumerError::new("TRANSPORT_ERROR", e.to_string()))?;

                if retried.status().as_u16() != 200 {
                    let body: serde_json::Value = retried.json().await.unwrap_or_default();
                    return Err(ConsumerError::new(
                        body["error"]["code"].as_str().unwrap_or("REQUEST_FAILED").to_string(),
                        body["error"]["message"].as_str().unwrap_or("request failed after payment").to_string(),
                    ));
                }
                retried.json::<TrustScore>().await.map_err(|e| ConsumerError::new("INVALID_RESPONSE", e.to_string()))
            }
            other => {
                let body: serde_json::Value = response.json().await.unwrap_or_default();
                Err(ConsumerError::new(
                    body["error"]["code"].as_str().unwrap_or("REQUEST_FAILED").to_string(),
                    format!("unexpected status {other}: {}", body["error"]["message"].as_str().unwrap_or("")),
                ))
            }
        }
    }

    /// §4.4 payForAccess contract: authorize, verify, settle, encode the receipt header.
    pub async fn pay_for_access(&self, requirements: &PaymentRequirements) -> Result<String, ConsumerError> {
        let authorization = AuthorizationPayload {
            from: self.agent_id.clone(),
            to: requirements.pay_to.clone(),
            value: requirements.max_amount_required.clone(),
            valid_before: now_ms() + (requirements.max_timeout_seconds.max(DEFAULT_MAX_TIMEOUT_SECONDS) as i64) * 1000,
        };

        let verify_url = format!("{}/facilitator/verify", self.facilitator_endpoint);
        let body = serde_json::json!({ "authorization": authorization, "requirements": requirements });
        let verify_response: serde_json::Value = self
            .client
            .post(&verify_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ConsumerError::new("FACILITATOR_TRANSPORT_ERROR", e.to_string()))?
            .json()
            .await
            .map_err(|e| ConsumerError::new("FACILITATOR_TRANSPORT_ERROR", e.to_string()))?;

        if !verify_response["isValid"].as_bool().unwrap_or(false) {
            return Err(ConsumerError::new(
                "PAYMENT_AUTHORIZATION_INVALID",
                verify_response["reason"].as_str().unwrap_or("authorization rejected by facilitator").to_string(),
            ));
        }

        let settle_url = format!("{}/facilitator/settle", self.facilitator_endpoint);
        let receipt: crate::payment::PaymentReceipt = self
            .client
            .post(&settle_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ConsumerError::new("FACILITATOR_TRANSPORT_ERROR", e.to_string()))?
            .json()
            .await
            .map_err(|e| ConsumerError::new("FACILITATOR_TRANSPORT_ERROR", e.to_string()))?;

        if !receipt.success {
            return Err(ConsumerError::new("SETTLEMENT_FAILED", receipt.error.unwrap_or_else(|| "settlement failed".to_string())));
        }
        let transaction_id = receipt.transaction_id.ok_or_else(|| ConsumerError::new("SETTLEMENT_FAILED", "settlement succeeded without a transaction id"))?;

        let header = ReceiptHeader {
            authorization: PaymentAuthorization { version: 1, scheme: requirements.scheme.clone(), network: requirements.network.clone(), authorization, signature: None },
            transaction_id: transaction_id.clone(),
        }
        .encode()
        .map_err(|e| ConsumerError::new("INTERNAL_ERROR", e.to_string()))?;

        self.orchestrator
            .log_event(&AuditEvent::new(
                AuditEventType::PaymentVerified,
                serde_json::json!({ "consumerAgentId": self.agent_id, "transactionId": transaction_id, "amount": requirements.max_amount_required }),
            ))
            .await;

        Ok(header)
    }
}

/// Resolves a CLI argument that may already be an AccountId, or a natural-language
/// string containing one (e.g. "check reputation of 0.0.7304745 please").
pub fn resolve_account_id(input: &str) -> anyhow::Result<AccountId> {
    if let Ok(id) = AccountId::parse(input.trim()) {
        return Ok(id);
    }

    for token in input.split(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | ':' | '(' | ')')) {
        if let Ok(id) = AccountId::parse(token) {
            return Ok(id);
        }
    }

    Err(anyhow!("could not find an account id matching ^0.0.[0-9]+$ in {input:?}")).context("resolving account id from input")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_bare_account_id() {
        assert_eq!(resolve_account_id("0.0.7304745").unwrap().as_str(), "0.0.7304745");
    }

    #[test]
    fn resolves_account_id_embedded_in_natural_language() {
        assert_eq!(resolve_account_id("please check reputation of 0.0.7304745 for me").unwrap().as_str(), "0.0.7304745");
    }

    #[test]
    fn rejects_input_with_no_account_id() {
        assert!(resolve_account_id("there is no id here").is_err());
    }

    fn sample_offer(product_id: &str) -> Offer {
        Offer::new(
            product_id,
            "30000",
            Currency::Native,
            RateLimitTerms::default(),
            crate::models::Sla { uptime: "99.9%".to_string(), response_time: "500ms".to_string() },
            "0.0.999",
        )
    }

    fn test_consumer() -> Consumer {
        let client = reqwest::Client::new();
        let orchestrator = Arc::new(OrchestratorClient::new(client.clone(), "http://127.0.0.1:1"));
        Consumer::new(client, "http://127.0.0.1:1", orchestrator, CONSUMER_AGENT_FOR_TESTS)
    }

    const CONSUMER_AGENT_FOR_TESTS: &str = "0.0.7304746";

    #[test]
    fn live_offer_returns_none_once_it_is_missing() {
        let consumer = test_consumer();
        assert!(consumer.live_offer("trustscore.basic.v1").is_none());
    }

    #[test]
    fn live_offer_evicts_an_expired_offer_instead_of_returning_it() {
        let consumer = test_consumer();
        let mut offer = sample_offer("trustscore.basic.v1");
        offer.valid_until = now_ms() - 1;
        consumer.offers.write().insert("trustscore.basic.v1".to_string(), offer);

        assert!(consumer.live_offer("trustscore.basic.v1").is_none());
        assert!(consumer.offers.read().get("trustscore.basic.v1").is_none());
    }

    #[test]
    fn live_offer_returns_an_unexpired_offer() {
        let consumer = test_consumer();
        let offer = sample_offer("trustscore.basic.v1");
        consumer.offers.write().insert("trustscore.basic.v1".to_string(), offer);
        assert!(consumer.live_offer("trustscore.basic.v1").is_some());
    }
}
