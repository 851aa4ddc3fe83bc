//! HTTP client from the producer to the orchestrator process. Publishing an
//! event or verifying a receipt never raises to the caller on transport
//! failure (§4.5) — it logs and degrades instead.

use tracing::warn;

use crate::models::{AgentRegistration, AgentRole, AuditEvent};

pub struct OrchestratorClient {
    client: reqwest::Client,
    base_url: String,
}

impl OrchestratorClient {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self { client, base_url: base_url.into() }
    }

    pub async fn register(&self, agent_id: &str, role: AgentRole, capabilities: Vec<String>) -> anyhow::Result<AgentRegistration> {
        let url = format!("{}/registry/agents", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "agentId": agent_id, "role": role, "capabilities": capabilities }))
            .send()
            .await?;
        Ok(response.json().await?)
    }

    pub async fn log_event(&self, event: &AuditEvent) {
        let url = format!("{}/audit/events", self.base_url);
        if let Err(err) = self.client.post(&url).json(event).send().await {
            warn!(%err, event_id = %event.event_id, "failed to reach orchestrator for audit event");
        }
    }

    pub async fn verify_receipt(&self, transaction_id: &str, expected_amount: &str, expected_recipient: &str) -> bool {
        let url = format!("{}/receipts/verify", self.base_url);
        let body = serde_json::json!({
            "transactionId": transaction_id,
            "expectedAmount": expected_amount,
            "expectedRecipient": expected_recipient,
        });
        let response = match self.client.post(&url).json(&body).send().await {
            Ok(r) => r,
            Err(err) => {
                warn!(%err, "failed to reach orchestrator for receipt verification");
                return false;
            }
        };
        #[derive(serde::Deserialize)]
        struct Verified {
            verified: bool,
        }
        response.json::<Verified>().await.map(|v| v.verified).unwrap_or(false)
    }
}
