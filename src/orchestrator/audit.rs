//! Append-only audit log (§4.5, §6 "Audit-log wire format"). A failed publish
//! is retried once, then dropped to a local dead-letter list — it must never
//! raise to the caller. A `tokio::Mutex` serializes publishes so that events
//! submitted from the same call site reach the topic in submission order.

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{error, warn};

use crate::models::AuditEvent;

#[async_trait]
pub trait AuditTransport: Send + Sync {
    async fn publish(&self, topic: &str, event: &AuditEvent) -> anyhow::Result<()>;
}

/// Submits one consensus-topic message per event via the ledger's HTTP submit API.
pub struct HttpAuditTransport {
    client: reqwest::Client,
    submit_url: String,
}

impl HttpAuditTransport {
    pub fn new(client: reqwest::Client, submit_base_url: impl Into<String>) -> Self {
        Self { client, submit_url: submit_base_url.into() }
    }
}

#[async_trait]
impl AuditTransport for HttpAuditTransport {
    async fn publish(&self, topic: &str, event: &AuditEvent) -> anyhow::Result<()> {
        let url = format!("{}/api/v1/topics/{}/messages", self.submit_url, topic);
        let response = self.client.post(&url).json(event).send().await?;
        if !response.status().is_success() {
            anyhow::bail!("topic submit returned {}", response.status());
        }
        Ok(())
    }
}

/// In-memory transport for tests and local runs; records every message it sees.
#[derive(Default)]
pub struct RecordingAuditTransport {
    published: Mutex<Vec<AuditEvent>>,
}

impl RecordingAuditTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<AuditEvent> {
        self.published.lock().await.clone()
    }
}

#[async_trait]
impl AuditTransport for RecordingAuditTransport {
    async fn publish(&self, _topic: &str, event: &AuditEvent) -> anyhow::Result<()> {
        self.published.lock().await.push(event.clone());
        Ok(())
    }
}

pub struct AuditLog<T: AuditTransport> {
    transport: T,
    topic: String,
    order_lock: Mutex<()>,
    dead_letter: Mutex<Vec<AuditEvent>>,
}

impl<T: AuditTransport> AuditLog<T> {
    pub fn new(transport: T, topic: impl Into<String>) -> Self {
        Self {
            transport,
            topic: topic.into(),
            order_lock: Mutex::new(()),
            dead_letter: Mutex::new(Vec::new()),
        }
    }

    pub async fn log_event(&self, event: AuditEvent) {
        let _order = self.order_lock.lock().await;
        if self.transport.publish(&self.topic, &event).await.is_ok() {
            return;
        }
        warn!(event_id = %event.event_id, "audit publish failed, retrying once");
        if self.transport.publish(&self.topic, &event).await.is_ok() {
            return;
        }
        error!(event_id = %event.event_id, "audit publish failed twice, moving to dead letter");
        self.dead_letter.lock().await.push(event);
    }

    pub async fn dead_letter_count(&self) -> usize {
        self.dead_letter.lock().await.len()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AuditEventType;

    #[tokio::test]
    async fn events_from_one_call_site_preserve_submission_order() {
        let transport = RecordingAuditTransport::new();
        let log = AuditLog::new(transport, "0.0.900000");

        for i in 0..5 {
            log.log_event(AuditEvent::new(AuditEventType::ScoreDelivered, serde_json::json!({"seq": i}))).await;
        }

        let published = log.transport.events().await;
        let seqs: Vec<i64> = published.iter().map(|e| e.data["seq"].as_i64().unwrap()).collect();
        assert_eq!(seqs, vec![0, 1, 2, 3, 4]);
    }

    struct FailingTransport;

    #[async_trait]
    impl AuditTransport for FailingTransport {
        async fn publish(&self, _topic: &str, _event: &AuditEvent) -> anyhow::Result<()> {
            anyhow::bail!("topic unreachable")
        }
    }

    #[tokio::test]
    async fn persistent_failure_lands_in_dead_letter_without_raising() {
        let log = AuditLog::new(FailingTransport, "0.0.900000");
        log.log_event(AuditEvent::new(AuditEventType::NegotiationStarted, serde_json::json!({}))).await;
        assert_eq!(log.dead_letter_count().await, 1);
    }
}
